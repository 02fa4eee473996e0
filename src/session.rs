//! Client-tier session resolution.
//!
//! [`AuthClient`] holds the login of a single client and announces every change
//! on a broadcast channel. [`SessionProvider`] listens to those announcements and
//! keeps a `{session, role, loading}` view current for any number of readers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    sync::{RwLock, broadcast, watch},
    task::{JoinHandle, JoinSet},
};

use crate::{
    error::AuthError,
    guard::{self, Decision},
    models::{Profile, Role, Session},
    repository::RepositoryState,
    supabase::AuthState,
};

const EVENT_CAPACITY: usize = 16;

/// Auth-state change, carrying the session that is current afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(Session),
    PasswordRecovery(Session),
}

impl AuthEvent {
    pub fn into_session(self) -> Option<Session> {
        match self {
            AuthEvent::SignedOut => None,
            AuthEvent::SignedIn(session)
            | AuthEvent::TokenRefreshed(session)
            | AuthEvent::UserUpdated(session)
            | AuthEvent::PasswordRecovery(session) => Some(session),
        }
    }
}

/// SessionSource
///
/// Where a `SessionProvider` learns about the client's login. Dropping the
/// receiver returned by `on_auth_state_change` unsubscribes.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn get_session(&self) -> Option<Session>;

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}

/// AuthClient
///
/// Stateful wrapper over [`AuthApi`](crate::supabase::AuthApi) for one user.
pub struct AuthClient {
    api: AuthState,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthClient {
    pub fn new(api: AuthState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            session: RwLock::new(None),
            events,
        }
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.api.sign_in_with_password(email, password).await?;
        *self.session.write().await = Some(session.clone());
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Drops the local session even when the auth service cannot be reached.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.session.write().await.take();
        let Some(previous) = previous else {
            return Ok(());
        };
        self.emit(AuthEvent::SignedOut);
        self.api.sign_out(&previous.access_token).await
    }

    /// Adopts the tokens of a confirmation link.
    pub async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, AuthError> {
        let session = self.api.set_session(access_token, refresh_token).await?;
        *self.session.write().await = Some(session.clone());
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Adopts the tokens of a password recovery link.
    pub async fn set_recovery_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, AuthError> {
        let session = self.api.set_session(access_token, refresh_token).await?;
        *self.session.write().await = Some(session.clone());
        self.emit(AuthEvent::PasswordRecovery(session.clone()));
        Ok(session)
    }

    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let refresh_token = match self.session.read().await.as_ref() {
            Some(session) => session.refresh_token.clone(),
            None => return Err(AuthError::MissingSession),
        };
        let session = self.api.refresh(&refresh_token).await?;
        *self.session.write().await = Some(session.clone());
        self.emit(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    /// Changes the password, then re-reads the user so the session reflects it.
    pub async fn update_user(&self, password: &str) -> Result<Session, AuthError> {
        let access_token = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => return Err(AuthError::MissingSession),
        };
        self.api.update_user(&access_token, password).await?;
        let user = self.api.get_user(&access_token).await?;

        let updated = {
            let mut guard = self.session.write().await;
            let Some(session) = guard.as_mut() else {
                return Err(AuthError::MissingSession);
            };
            session.user = user;
            session.clone()
        };
        self.emit(AuthEvent::UserUpdated(updated.clone()));
        Ok(updated)
    }
}

#[async_trait]
impl SessionSource for AuthClient {
    /// The stored session, refreshed first when its access token has expired.
    async fn get_session(&self) -> Option<Session> {
        let current = self.session.read().await.clone()?;
        if current.expires_at > chrono::Utc::now().timestamp() {
            return Some(current);
        }
        match self.refresh_session().await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(error = %e, "could not refresh expired session");
                None
            }
        }
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// SessionView
///
/// Snapshot published by a `SessionProvider`. `role` stays `None` while the
/// profile read is in flight and when it finds nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session: Option<Session>,
    pub role: Option<Role>,
    pub profile: Option<Profile>,
    pub loading: bool,
    generation: u64,
}

impl SessionView {
    fn initial() -> Self {
        Self {
            session: None,
            role: None,
            profile: None,
            loading: true,
            generation: 0,
        }
    }

    /// Bumped on every session change.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// SessionProvider
///
/// Long-lived resolver for one client. A background task is the only writer;
/// readers take snapshots or subscribe to changes. Dropping the provider stops
/// the task and any profile reads it has in flight.
pub struct SessionProvider {
    state: watch::Receiver<SessionView>,
    task: JoinHandle<()>,
}

impl SessionProvider {
    pub fn start(source: Arc<dyn SessionSource>, repo: RepositoryState) -> Self {
        let (tx, rx) = watch::channel(SessionView::initial());
        let task = tokio::spawn(run(source, repo, Arc::new(tx)));
        Self { state: rx, task }
    }

    pub fn current(&self) -> SessionView {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.state.clone()
    }

    /// Waits until the current session's role is settled.
    pub async fn ready(&self) -> SessionView {
        let mut rx = self.state.clone();
        let settled = rx.wait_for(|view| !view.loading).await.map(|view| view.clone());
        match settled {
            Ok(view) => view,
            // Task gone: the last published view is final.
            Err(_) => rx.borrow().clone(),
        }
    }

    /// Edge policy applied to a client-side navigation.
    pub async fn navigate(&self, path: &str) -> Decision {
        let view = self.ready().await;
        let user = view.session.as_ref().map(|s| &s.user);
        guard::evaluate(path, user, view.role)
    }

    /// Page-tier check for a page that needs a signed-in visitor, optionally of `required` role.
    pub async fn require(&self, required: Option<Role>) -> Decision {
        let view = self.ready().await;
        let user = view.session.as_ref().map(|s| &s.user);
        guard::require(required, user, view.role)
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(source: Arc<dyn SessionSource>, repo: RepositoryState, state: Arc<watch::Sender<SessionView>>) {
    // Subscribe before reading so no change between the two is missed.
    let mut events = source.on_auth_state_change();
    let mut fetches = JoinSet::new();

    let initial = source.get_session().await;
    apply(&state, &repo, &mut fetches, initial);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    tracing::debug!(?event, "auth state changed");
                    apply(&state, &repo, &mut fetches, event.into_session());
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth events lagged, re-reading session");
                    let session = source.get_session().await;
                    apply(&state, &repo, &mut fetches, session);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "profile fetch task failed");
                }
            }
        }
    }

    // Source gone: let outstanding reads settle the last state.
    while fetches.join_next().await.is_some() {}
}

/// Publishes `session` under a new generation and starts the matching profile read.
fn apply(
    state: &Arc<watch::Sender<SessionView>>,
    repo: &RepositoryState,
    fetches: &mut JoinSet<()>,
    session: Option<Session>,
) {
    let mut generation = 0;
    state.send_modify(|view| {
        view.generation += 1;
        generation = view.generation;
        view.session = session.clone();
        view.role = None;
        view.profile = None;
        view.loading = session.is_some();
    });

    if let Some(session) = session {
        fetches.spawn(resolve_role(state.clone(), repo.clone(), session, generation));
    }
}

async fn resolve_role(
    state: Arc<watch::Sender<SessionView>>,
    repo: RepositoryState,
    session: Session,
    generation: u64,
) {
    let user = &session.user;
    let profile = repo.get_profile(user.id).await;

    if let Some(profile) = &profile {
        if profile.role() != user.role {
            tracing::warn!(
                user_id = %user.id,
                cached = %profile.role,
                metadata = user.role.as_str(),
                "profile role out of date, syncing"
            );
            if let Err(e) = repo.sync_profile_role(user.id, user.role).await {
                tracing::error!(error = %e, "failed to sync profile role");
            }
        }
    }

    state.send_if_modified(|view| {
        if view.generation != generation {
            tracing::debug!(generation, current = view.generation, "discarding stale profile");
            return false;
        }
        view.role = profile.as_ref().map(|_| user.role);
        view.profile = profile.map(|mut p| {
            p.role = user.role.as_str().to_string();
            p
        });
        view.loading = false;
        true
    });
}

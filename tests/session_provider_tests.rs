mod common;

use std::{sync::Arc, time::Duration};

use common::{MockAuth, MockRepo, admin, member, profile_for, session_for};
use trektrail::{
    error::AuthError,
    guard::Decision,
    models::Role,
    repository::RepositoryState,
    session::{AuthClient, AuthEvent, SessionProvider, SessionSource, SessionView},
};

const PASSWORD: &str = "correct-horse";

struct Harness {
    repo: Arc<MockRepo>,
    auth: Arc<MockAuth>,
    client: Arc<AuthClient>,
}

impl Harness {
    fn new(repo: MockRepo) -> Self {
        let auth = MockAuth::with_account("hiker@trektrail.com", PASSWORD, member());
        auth.accounts.lock().unwrap().insert(
            "admin@trektrail.com".to_string(),
            (PASSWORD.to_string(), admin()),
        );
        let auth = Arc::new(auth);
        Self {
            repo: Arc::new(repo),
            client: Arc::new(AuthClient::new(auth.clone())),
            auth,
        }
    }

    /// Starts a provider and waits until it has subscribed and published its first view.
    async fn start(&self) -> SessionProvider {
        let source = self.client.clone() as Arc<dyn SessionSource>;
        let provider = SessionProvider::start(source, self.repo.clone() as RepositoryState);
        settle(&provider, |view| view.generation() >= 1 && !view.loading).await;
        provider
    }
}

async fn settle(
    provider: &SessionProvider,
    predicate: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    let mut rx = provider.subscribe();
    tokio::time::timeout(Duration::from_secs(2), async move {
        rx.wait_for(predicate).await.map(|view| (*view).clone())
    })
    .await
    .expect("provider did not settle in time")
    .expect("provider stopped")
}

fn signed_in_as(view: &SessionView, id: uuid::Uuid) -> bool {
    view.session.as_ref().map(|s| s.user.id) == Some(id) && !view.loading
}

#[test]
fn test_signed_out_event_carries_no_session() {
    assert_eq!(AuthEvent::SignedOut.into_session(), None);
    let session = session_for(&member());
    assert_eq!(
        AuthEvent::TokenRefreshed(session.clone()).into_session(),
        Some(session)
    );
}

#[tokio::test]
async fn test_no_session_settles_signed_out() {
    let harness = Harness::new(MockRepo::default());
    let provider = harness.start().await;

    let view = provider.current();
    assert!(view.session.is_none());
    assert_eq!(view.role, None);
    assert!(!view.loading);
}

#[tokio::test]
async fn test_existing_session_resolves_role_on_start() {
    let harness = Harness::new(MockRepo::with_profiles(vec![profile_for(&admin())]));
    harness
        .client
        .sign_in_with_password("admin@trektrail.com", PASSWORD)
        .await
        .unwrap();

    let provider = harness.start().await;
    let view = provider.current();

    assert_eq!(view.session.map(|s| s.user.id), Some(admin().id));
    assert_eq!(view.role, Some(Role::Admin));
    assert_eq!(view.profile.map(|p| p.id), Some(admin().id));
}

#[tokio::test]
async fn test_sign_in_and_out_update_the_view() {
    let harness = Harness::new(MockRepo::with_profiles(vec![profile_for(&member())]));
    let provider = harness.start().await;

    harness
        .client
        .sign_in_with_password("hiker@trektrail.com", PASSWORD)
        .await
        .unwrap();
    let view = settle(&provider, |v| signed_in_as(v, member().id)).await;
    assert_eq!(view.role, Some(Role::User));

    harness.client.sign_out().await.unwrap();
    let view = settle(&provider, |v| v.session.is_none()).await;
    assert_eq!(view.role, None);
    assert!(view.profile.is_none());
    assert!(!view.loading);
    assert!(harness.auth.calls().contains(&"sign_out".to_string()));
}

#[tokio::test]
async fn test_missing_profile_leaves_role_unset() {
    let harness = Harness::new(MockRepo::default());
    let provider = harness.start().await;

    harness
        .client
        .sign_in_with_password("hiker@trektrail.com", PASSWORD)
        .await
        .unwrap();
    let view = settle(&provider, |v| signed_in_as(v, member().id)).await;

    assert!(view.session.is_some());
    assert_eq!(view.role, None);
    assert!(view.profile.is_none());
}

#[tokio::test]
async fn test_stale_profile_result_is_discarded() {
    // The admin's cached role is stale, so its late profile read also writes a sync.
    let mut stale_admin = profile_for(&admin());
    stale_admin.role = "user".to_string();
    let harness = Harness::new(MockRepo::with_profiles(vec![
        stale_admin,
        profile_for(&member()),
    ]));
    let gate = harness.repo.gate_profile(admin().id);
    let provider = harness.start().await;

    harness
        .client
        .sign_in_with_password("admin@trektrail.com", PASSWORD)
        .await
        .unwrap();
    let view = settle(&provider, |v| {
        v.session.as_ref().map(|s| s.user.id) == Some(admin().id)
    })
    .await;
    assert!(view.loading);
    assert_eq!(view.role, None);

    harness
        .client
        .sign_in_with_password("hiker@trektrail.com", PASSWORD)
        .await
        .unwrap();
    let settled = settle(&provider, |v| signed_in_as(v, member().id)).await;
    assert_eq!(settled.role, Some(Role::User));

    gate.notify_one();
    tokio::time::timeout(Duration::from_secs(2), async {
        while harness.repo.write_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("admin profile read never finished");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let view = provider.current();
    assert_eq!(view.session.as_ref().map(|s| s.user.id), Some(member().id));
    assert_eq!(view.role, Some(Role::User));
    assert_eq!(view.profile.as_ref().map(|p| p.id), Some(member().id));
    assert_eq!(view.generation(), settled.generation());
}

#[tokio::test]
async fn test_role_cache_is_synced_to_metadata() {
    let mut stale = profile_for(&member());
    stale.role = "admin".to_string();
    let harness = Harness::new(MockRepo::with_profiles(vec![stale]));
    let provider = harness.start().await;

    harness
        .client
        .sign_in_with_password("hiker@trektrail.com", PASSWORD)
        .await
        .unwrap();
    let view = settle(&provider, |v| signed_in_as(v, member().id)).await;

    assert_eq!(view.role, Some(Role::User));
    assert_eq!(view.profile.map(|p| p.role), Some("user".to_string()));
    assert_eq!(harness.repo.profiles.lock().unwrap()[0].role(), Role::User);
}

#[tokio::test]
async fn test_token_refresh_starts_new_generation() {
    let harness = Harness::new(MockRepo::with_profiles(vec![profile_for(&member())]));
    let provider = harness.start().await;

    harness
        .client
        .sign_in_with_password("hiker@trektrail.com", PASSWORD)
        .await
        .unwrap();
    let before = settle(&provider, |v| signed_in_as(v, member().id)).await;

    *harness.auth.link_session.lock().unwrap() = Some(session_for(&member()));
    harness.client.refresh_session().await.unwrap();
    let after = settle(&provider, |v| {
        v.generation() > before.generation() && !v.loading
    })
    .await;

    assert_eq!(after.role, Some(Role::User));
    assert!(harness.auth.calls().contains(&"refresh".to_string()));
}

#[tokio::test]
async fn test_refresh_without_session_fails() {
    let harness = Harness::new(MockRepo::default());
    assert!(matches!(
        harness.client.refresh_session().await,
        Err(AuthError::MissingSession)
    ));
}

#[tokio::test]
async fn test_recovery_session_is_announced() {
    let harness = Harness::new(MockRepo::with_profiles(vec![profile_for(&member())]));
    let mut events = harness.client.on_auth_state_change();
    let session = session_for(&member());
    *harness.auth.link_session.lock().unwrap() = Some(session.clone());

    harness
        .client
        .set_recovery_session(&session.access_token, &session.refresh_token)
        .await
        .unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        AuthEvent::PasswordRecovery(session)
    );
}

#[tokio::test]
async fn test_navigation_uses_edge_policy() {
    let harness = Harness::new(MockRepo::with_profiles(vec![profile_for(&member())]));
    let provider = harness.start().await;

    assert_eq!(
        provider.navigate("/admin/treks").await,
        Decision::Redirect("/auth/login?redirectTo=/admin/treks".to_string())
    );

    harness
        .client
        .sign_in_with_password("hiker@trektrail.com", PASSWORD)
        .await
        .unwrap();
    settle(&provider, |v| signed_in_as(v, member().id)).await;

    assert_eq!(
        provider.navigate("/admin/treks").await,
        Decision::Redirect("/users/dashboard".to_string())
    );
    assert_eq!(provider.navigate("/treks").await, Decision::Allow);
    assert_eq!(
        provider.require(Some(Role::Admin)).await,
        Decision::Redirect("/profile".to_string())
    );
    assert_eq!(provider.require(None).await, Decision::Allow);
}

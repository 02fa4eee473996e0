/// Router Module Index
///
/// One router per area of the site. Access control is not wired here: the edge
/// guard in `guard::enforce` wraps the merged router, and the `Member`/`Admin`
/// extractors guard individual pages.

/// Catalogue, blog, contact forms and the caller's own profile.
pub mod public;

/// Sign-in, registration and recovery; signed-out visitors only.
pub mod auth;

/// The signed-in user's area.
pub mod users;

/// Back-office, admins only.
pub mod admin;

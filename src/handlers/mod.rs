// Handlers grouped the same way as the routers in `routes`.
pub mod admin;
pub mod auth;
pub mod public;
pub mod users;

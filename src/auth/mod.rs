//! Password authentication
//!
//! Handles:
//! - Registration, login and logout
//! - Password hashing and validation
//! - Session management
//! - Authentication middleware

mod middleware;
mod password;
mod routes;
pub mod session;

pub use middleware::{CurrentUser, require_auth};
pub use password::{
    hash_password, validate_new_password, validate_password, validate_username, verify_password,
};
pub use routes::{auth_router, redirect_target};
pub(crate) use routes::clear_session_cookie;
pub use session::{SESSION_COOKIE, Session, create_session_token, verify_session_token};

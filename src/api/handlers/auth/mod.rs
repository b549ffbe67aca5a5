//! Authentication, verification, and federated-login endpoints.
//!
//! Flow Overview:
//! 1) Signup and password reset issue an emailed OTP and park the payload in
//!    the in-process pending table under an opaque session token.
//! 2) The client returns token + email + OTP; a valid triple commits the
//!    payload to the database and the session becomes a bearer JWT.
//! 3) Password and federated sign-in issue the same bearer JWT directly.

pub mod google;
pub mod login;
pub mod password_reset;
pub(crate) mod pending;
pub mod session;
pub mod signup;
mod state;
pub(crate) mod storage;
pub mod types;
pub(crate) mod utils;

pub use session::Principal;
pub use state::{AuthConfig, AuthState};

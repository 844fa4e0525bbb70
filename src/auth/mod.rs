//! Access-token authentication.
//!
//! Dual-token system: short-lived access tokens authorize requests without
//! touching storage; the long-lived refresh token is tracked server-side as
//! the single active session value and only exchanged at the refresh
//! endpoint.

mod cookie;
mod errors;
mod extractors;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, session_cookie,
};
pub use errors::AuthError;
pub use extractors::{Auth, AuthenticatedUser};
pub use state::HasAuthBackend;

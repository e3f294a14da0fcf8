//! Request-parsing stages of the chain.
//!
//! The security stages live in [`crate::security`]; these only observe and
//! decode what the client sent.

pub mod body;
pub mod cookies;
pub mod observe;

pub use body::BodyStage;
pub use cookies::{parse_cookies, CookieStage};
pub use observe::ObserveStage;

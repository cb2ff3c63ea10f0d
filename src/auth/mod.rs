//! Bearer authentication for API routes.
//!
//! A request is authorized once its access token parses (signature, expiry,
//! claims) and the principal's account is still enabled.

mod bearer;
mod errors;
mod extractors;
mod ip;
mod state;
mod validator;

pub use bearer::{BEARER_PREFIX, get_bearer_token};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::BearerAuth;
pub use ip::{FORWARDED_FOR_HEADER, HasHeadersAndExtensions, extract_client_ip};
pub use state::HasAuthBackend;
pub use validator::{PrincipalValidator, USER_DISABLED};

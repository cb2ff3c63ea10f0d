//! Authentication state traits and macro.

use super::validator::PrincipalValidator;
use crate::jwt::TokenCodec;

/// Trait for state types that can authenticate bearer requests.
pub trait HasAuthBackend {
    fn codec(&self) -> &TokenCodec;
    fn validator(&self) -> &PrincipalValidator;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `codec: Arc<TokenCodec>`
/// - `validator: PrincipalValidator`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub codec: Arc<TokenCodec>,
///     pub validator: PrincipalValidator,
///     // ... other fields
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn codec(&self) -> &$crate::jwt::TokenCodec {
                &self.codec
            }
            fn validator(&self) -> &$crate::auth::PrincipalValidator {
                &self.validator
            }
        }
    };
}

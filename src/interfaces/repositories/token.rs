use jsonwebtoken::TokenData;

use crate::{
    entities::{
        token::{Claims, RefreshClaims},
        user::User,
    },
    errors::AuthError,
};

#[cfg_attr(test, mockall::automock)]
pub trait TokenServiceRepository: Send + Sync {
    /// Creates a short-lived access JWT for the user
    fn create_jwt(&self, user: &User, admin: bool) -> Result<String, AuthError>;

    /// Creates a refresh JWT for the user id
    fn create_refresh_jwt(&self, user_id: &str) -> Result<String, AuthError>;

    /// Decodes an access JWT and returns the claims
    fn decode_jwt(&self, token: &str) -> Result<TokenData<Claims>, AuthError>;

    /// Decodes a refresh JWT and returns the claims
    fn decode_refresh_jwt(&self, token: &str) -> Result<TokenData<RefreshClaims>, AuthError>;
}

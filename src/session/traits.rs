use std::future::Future;

use super::error::StoreError;
use crate::error::Error;
use crate::types::User;

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Persistent key/value store for credentials.
///
/// Browser-style local storage and OS-backed secure stores both fit behind
/// this one interface. Deleting an absent key is not an error.
pub trait TokenStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Server-side identity check ("who am I") for a bearer token.
///
/// Any error, including a network failure, means the token is not accepted.
pub trait IdentityVerifier: Send + Sync + 'static {
    fn verify(&self, token: &str) -> impl Future<Output = Result<User, Error>> + Send;
}

//! Admin key authentication middleware

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Hash an API key for storage/comparison
fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 digest of the configured admin key; the plain key is not retained
#[derive(Clone)]
pub struct AdminKey {
    hash: String,
}

impl AdminKey {
    pub fn new(plain: &str) -> Self {
        Self {
            hash: hash_api_key(plain),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        hash_api_key(candidate) == self.hash
    }
}

/// Extract the API key from the Authorization header
fn extract_api_key(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Authentication middleware
///
/// Rejects the request unless it carries the admin key.
pub async fn require_admin(
    State(key): State<AdminKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = extract_api_key(&request).ok_or(AppError::Unauthorized)?;

    if !key.verify(api_key.trim()) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with wrong admin key");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::handler::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Accepts only a present, non-empty token equal to a non-empty secret.
pub fn authorize(supplied: Option<&str>, secret: &str) -> Result<(), AppError> {
    match supplied {
        Some(token) if !token.is_empty() && !secret.is_empty() && tokens_match(token, secret) => {
            Ok(())
        }
        _ => Err(AppError::NotAuthorized),
    }
}

// Digests have a fixed length, so the comparison time does not depend on
// where the inputs differ or how long they are.
fn tokens_match(supplied: &str, secret: &str) -> bool {
    let supplied = Sha256::digest(supplied.as_bytes());
    let secret = Sha256::digest(secret.as_bytes());
    supplied
        .iter()
        .zip(secret.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Extractor guarding admin handlers. Put it first so a rejected request
/// never reaches body parsing or the store.
#[derive(Debug)]
pub struct AdminToken;

#[async_trait]
impl FromRequestParts<AppState> for AdminToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());

        authorize(supplied, &state.admin_token).inspect_err(|_| {
            tracing::warn!(
                method = %parts.method,
                path = %parts.uri.path(),
                "rejected admin request"
            );
        })?;

        Ok(AdminToken)
    }
}

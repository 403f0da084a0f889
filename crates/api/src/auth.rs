//! `X-API-Key` auth — spec.md §6.1 / grounded on
//! `examples/original_source/src/omnibrain/interfaces/api_server.py`'s
//! `verify_api_key`: enforcement is entirely skipped when the daemon
//! wasn't started with a configured token.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

use crate::state::ApiState;

const HEADER: &str = "x-api-key";

/// Mirrors `secrets.compare_digest`: always walks the full length of the
/// longer operand so a mismatch's position never leaks through timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut diff = (a.len() ^ b.len()) as u8;
    for i in 0..a.len().max(b.len()) {
        diff |= a.get(i).copied().unwrap_or(0) ^ b.get(i).copied().unwrap_or(0);
    }
    diff == 0
}

pub async fn require_api_key(State(state): State<ApiState>, request: Request, next: Next) -> Result<Response, StatusCode> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };
    let provided = request.headers().get(HEADER).and_then(|v| v.to_str().ok());
    match provided {
        Some(key) if constant_time_eq(key, expected) => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_match() {
        assert!(constant_time_eq("secret-token", "secret-token"));
    }

    #[test]
    fn different_lengths_do_not_match() {
        assert!(!constant_time_eq("short", "much-longer-token"));
    }

    #[test]
    fn same_length_different_content_does_not_match() {
        assert!(!constant_time_eq("aaaaaaaa", "aaaaaaab"));
    }
}

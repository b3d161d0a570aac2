//! Response classification for the refresh-and-retry path.
//!
//! The 400 heuristic matches on the human-readable failure message
//! until the servers grow a structured error code; everything that
//! looks at message text lives here so the gateway and coordinator
//! never string-match themselves.

use crate::types::Envelope;

/// Message fragments that mark a token as invalid or expired.
/// Matched case- and accent-insensitively.
const INVALID_TOKEN_PATTERNS: &[&str] = &[
    "token expirado",
    "token invalido",
    "token vencido",
    "invalid token",
    "expired token",
    "token expired",
];

/// Message fragments that mark the user as unknown to the auth backend.
const UNKNOWN_USER_PATTERNS: &[&str] = &[
    "usuario no encontrado",
    "usuario desconocido",
    "unknown user",
    "user not found",
];

/// Whether this status always qualifies for refresh-and-retry.
#[inline]
pub fn is_auth_status(status: u16) -> bool {
    matches!(status, 401 | 403)
}

fn normalize(message: &str) -> String {
    message
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' => 'u',
            _ => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Whether a failure message indicates an invalid or expired token.
pub fn is_invalid_token_message(message: &str) -> bool {
    let normalized = normalize(message);
    INVALID_TOKEN_PATTERNS
        .iter()
        .any(|p| normalized.contains(p))
}

/// Whether a failure message indicates an unknown user.
pub fn is_unknown_user_message(message: &str) -> bool {
    let normalized = normalize(message);
    UNKNOWN_USER_PATTERNS.iter().any(|p| normalized.contains(p))
}

/// Whether a response is eligible for the refresh-and-retry path.
///
/// 401/403 always are. 400 only when the body carries the envelope
/// with an explicit failure flag and an invalid/expired-token message;
/// any other 400 is an ordinary client error.
pub fn is_refresh_eligible(status: u16, body: &[u8]) -> bool {
    if is_auth_status(status) {
        return true;
    }
    if status != 400 {
        return false;
    }
    match Envelope::parse(body) {
        Some(env) if !env.is_ok() => is_invalid_token_message(env.message()),
        _ => false,
    }
}

/// Whether a failed refresh response is unrecoverable: an explicit
/// structured failure whose message names an invalid/expired token or
/// an unknown user. Everything else is treated as transient.
pub fn is_unrecoverable_refresh(body: &[u8]) -> bool {
    match Envelope::parse(body) {
        Some(env) if !env.is_ok() => {
            is_invalid_token_message(env.message()) || is_unknown_user_message(env.message())
        }
        _ => false,
    }
}

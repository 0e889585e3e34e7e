use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;

/// The size of a session handle in bytes.
const SESSION_HANDLE_SIZE: usize = 32;

/// Generates a new random session handle.
///
/// # Returns
///
/// A URL-safe base64-encoded handle, suitable as a cookie value.
pub fn generate_session_handle() -> String {
    let mut handle = [0u8; SESSION_HANDLE_SIZE];
    OsRng.fill_bytes(&mut handle);

    general_purpose::URL_SAFE_NO_PAD.encode(handle)
}

/// A shortened form of a handle that is safe to log.
pub fn redact(handle: &str) -> &str {
    &handle[..8.min(handle.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_cookie_safe_and_distinct() {
        let a = generate_session_handle();
        let b = generate_session_handle();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(redact(&a).len(), 8);
    }
}

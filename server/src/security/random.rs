use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

/// Fill `n` bytes from the operating system's CSPRNG.
///
/// There is no fallback source: if the OS cannot provide entropy the caller
/// gets the error and must abort what it was doing.
pub fn random_bytes(n: usize) -> Result<Vec<u8>, rand::Error> {
    let mut buf = vec![0u8; n];
    OsRng.try_fill_bytes(&mut buf)?;
    Ok(buf)
}

/// `n` random bytes encoded as URL-safe base64 without padding.
pub fn random_token(n: usize) -> Result<String, rand::Error> {
    random_bytes(n).map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
}

/// Compare two strings without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_have_requested_length() {
        for n in [0, 5, 30, 99] {
            assert_eq!(random_bytes(n).unwrap().len(), n);
        }
    }

    #[test]
    fn tokens_differ() {
        let a = random_token(30).unwrap();
        let b = random_token(30).unwrap();
        assert_ne!(a, b);
        // 30 bytes -> 40 base64 chars, no padding
        assert_eq!(a.len(), 40);
        assert!(!a.contains('='));
    }

    #[test]
    fn constant_time_eq_matches_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }
}

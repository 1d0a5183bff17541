//! Password hashing: PBKDF2-HMAC-SHA256 with a random per-password salt.
//!
//! Stored format: `pbkdf2-sha256$<iterations>$<salt>$<hash>` with salt and
//! hash in unpadded standard base64.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::CryptoError;

pub const HASH_SCHEME: &str = "pbkdf2-sha256";
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

#[cfg(not(test))]
pub const PBKDF2_ITERATIONS: u32 = 210_000;
// Keeps unit tests fast; stored hashes carry their own iteration count.
#[cfg(test)]
pub const PBKDF2_ITERATIONS: u32 = 1_000;

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> String {
    let salt = generate_salt();
    let mut derived = derive(password, &salt, PBKDF2_ITERATIONS);
    let encoded = format!(
        "{HASH_SCHEME}${PBKDF2_ITERATIONS}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(derived)
    );
    derived.zeroize();
    encoded
}

/// Check a password against a stored hash in constant time.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CryptoError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CryptoError::MalformedHash);
    };
    if scheme != HASH_SCHEME {
        return Err(CryptoError::UnsupportedScheme(scheme.to_string()));
    }
    let iterations: u32 = iterations.parse().map_err(|_| CryptoError::MalformedHash)?;
    if iterations == 0 {
        return Err(CryptoError::MalformedHash);
    }
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| CryptoError::MalformedHash)?;
    let expected = STANDARD_NO_PAD
        .decode(expected)
        .map_err(|_| CryptoError::MalformedHash)?;
    if expected.len() != HASH_LENGTH {
        return Err(CryptoError::MalformedHash);
    }

    let mut derived = derive(password, &salt, iterations);
    let matches: bool = derived[..].ct_eq(&expected[..]).into();
    derived.zeroize();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_accepts_correct_password() {
        let stored = hash_password("admin123");
        assert!(verify_password("admin123", &stored).unwrap());
    }

    #[test]
    fn wrong_password_rejected() {
        let stored = hash_password("admin123");
        assert!(!verify_password("admin124", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash_password("secret"), hash_password("secret"));
    }

    #[test]
    fn stored_hash_records_scheme_and_iterations() {
        let stored = hash_password("secret");
        assert!(stored.starts_with(&format!("{HASH_SCHEME}${PBKDF2_ITERATIONS}$")));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(CryptoError::MalformedHash)
        ));
        assert!(matches!(
            verify_password("x", "bcrypt$10$abc$def"),
            Err(CryptoError::UnsupportedScheme(_))
        ));
    }
}

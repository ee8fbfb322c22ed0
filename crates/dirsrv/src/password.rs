//! Password storage scheme used by the file-backed host.
//!
//! Stored passwords carry a `{SCHEME}` prefix like the ones a directory
//! server writes. Plain values are hashed with BLAKE3 before they are stored.

/// Scheme tag of hashed values.
pub const SCHEME: &str = "{BLAKE3}";

/// Whether a value is already in `{SCHEME}hash` form.
pub fn is_hashed(value: &str) -> bool {
    value.starts_with('{') && value[1..].contains('}')
}

/// Hash a plain password; hashed values are returned unchanged.
pub fn hash(password: &str) -> String {
    if is_hashed(password) {
        return password.to_string();
    }
    format!("{SCHEME}{}", blake3::hash(password.as_bytes()).to_hex())
}

/// Whether `password` matches the stored value.
///
/// Values without a scheme are compared as clear text.
pub fn verify(password: &str, stored: &str) -> bool {
    if stored.starts_with(SCHEME) {
        return hash(password) == stored;
    }
    if is_hashed(stored) {
        // Unknown scheme: cannot be checked
        return false;
    }
    password == stored
}

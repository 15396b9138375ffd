use sha2::{Digest, Sha256};

/// Separator placed between canonical configuration entries.
pub const SEPARATOR: &str = "_";

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    let out = h.finalize();
    let mut s = String::with_capacity(64);
    for b in out {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Fingerprint of an ordered list of canonical `key=value` entries.
///
/// Entries are joined with [`SEPARATOR`] in the order given; callers must
/// list fields in a fixed order.
pub fn fingerprint<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(SEPARATOR);
    sha256_hex(joined.as_bytes())
}

/// Canonical `key=value` entry. Floats use Rust's shortest round-trip `Debug`
/// form, nested vectors render with brackets.
pub fn entry<T: std::fmt::Debug + ?Sized>(key: &str, value: &T) -> String {
    format!("{key}={value:?}")
}

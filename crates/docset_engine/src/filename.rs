use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

/// `{sha256(bytes)}{extension}`, e.g. `9f86d0...a08.png`.
pub fn content_addressed_filename(bytes: &[u8], extension: &str) -> String {
    format!("{}{extension}", content_hash(bytes))
}

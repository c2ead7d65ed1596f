// Password digests and login nonces
//
// Flow:
//
//   userid + "-" + password -> |SHA256| -> digest (stored in the password file)
//   digest + "-" + seconds  -> |SHA256| -> nonce  (sent by the client at login)
//
// The browser recomputes the digest from the typed password, so the password
// itself never crosses the wire. There is no salt or stretching here; the
// digest is only as strong as a single SHA256 pass.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use ring::digest;
use std::fmt::Write;

const TOKEN_KEY_BYTES: usize = 32;

// SHA256 of the UTF-8 bytes, lower-case hex encoded
pub fn sha256sum(input: &str) -> String {
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    let mut hex = String::with_capacity(hash.as_ref().len() * 2);
    for byte in hash.as_ref() {
        // writing into a String cannot fail
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Derives the digest stored for `userid` from a plaintext password.
pub fn derive_digest(userid: &str, password: &str) -> String {
    sha256sum(&format!("{}-{}", userid, password))
}

/// Derives the login nonce for a stored digest at a one-second time bucket.
///
/// `userid` does not enter the hash; clients compute the nonce from the
/// digest and the time alone.
pub fn derive_nonce(_userid: &str, digest: &str, seconds: i64) -> String {
    sha256sum(&format!("{}-{}", digest, seconds))
}

// Compares two hex strings without short-circuiting on the first mismatch.
// Only the length is allowed to leak.
pub fn verify_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

// Opaque bearer token key, URL-safe so it can travel in a cookie unescaped
pub fn generate_token_key() -> String {
    let mut key = [0u8; TOKEN_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut key);
    URL_SAFE_NO_PAD.encode(key)
}

//! Password hashing for IPBX credentials
//!
//! Stored hashes are `salt || hex(pbkdf2_sha512(password, salt))` where the
//! salt is 64 hex characters used verbatim (as ASCII) by the KDF. The HA1
//! digest is kept only for proxies doing legacy SIP digest authentication.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha512;
use subtle::ConstantTimeEq;

/// PBKDF2 iteration count
pub const PBKDF2_ROUNDS: u32 = 100_000;

/// Width of the hex salt prefix of a stored hash
pub const SALT_LEN: usize = 64;

const DIGEST_LEN: usize = 64;

fn derive(password: &str, salt: &str) -> String {
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut digest);
    hex::encode(digest)
}

/// Hash a password with a fresh random salt; `None` stays `None`.
pub fn hash(password: Option<&str>) -> Option<String> {
    let password = password?;
    let mut raw_salt = [0u8; SALT_LEN / 2];
    rand::thread_rng().fill_bytes(&mut raw_salt);
    let salt = hex::encode(raw_salt);
    let digest = derive(password, &salt);
    Some(format!("{}{}", salt, digest))
}

/// Check a provided password against a stored hash.
///
/// Malformed stored values never verify.
pub fn verify(stored: &str, provided: &str) -> bool {
    if stored.len() <= SALT_LEN || !stored.is_char_boundary(SALT_LEN) {
        return false;
    }
    let (salt, expected) = stored.split_at(SALT_LEN);
    let actual = derive(provided, salt);
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// MD5 of `username:realm:password`, or `None` when any part is missing
pub fn hash_ha1(username: Option<&str>, realm: Option<&str>, password: Option<&str>) -> Option<String> {
    let (username, realm, password) = (username?, realm?, password?);
    let digest = md5::compute(format!("{}:{}:{}", username, realm, password));
    Some(format!("{:x}", digest))
}

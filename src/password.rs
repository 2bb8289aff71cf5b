use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use std::sync::LazyLock;

/// Hashes `plain` with argon2id and a fresh random salt.
///
/// The returned PHC string embeds algorithm, parameters and salt, so it is all
/// `verify_password` needs. Hashing the same input twice yields different strings.
pub fn hash_password(plain: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(plain.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Checks `plain` against a stored digest. A digest that does not parse is a
/// mismatch, not an error.
pub fn verify_password(plain: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password digest is malformed");
            false
        }
    }
}

// Stand-in digest for names with no account. Hashed once, on first use.
static DUMMY_DIGEST: LazyLock<String> =
    LazyLock::new(|| hash_password("no such account").unwrap_or_default());

/// Like [`verify_password`], but a missing digest still costs one full verify
/// against a dummy, so a miss takes as long as a wrong password.
pub fn verify_password_or_dummy(plain: &str, digest: Option<&str>) -> bool {
    match digest {
        Some(digest) => verify_password(plain, digest),
        None => {
            verify_password(plain, &DUMMY_DIGEST);
            false
        }
    }
}

use crate::config::AuthConfig;
use bcrypt::{hash, verify};

pub fn hash_password(password: &str, cost: u32) -> Result<String, anyhow::Error> {
    let hashed =
        hash(password, cost).map_err(|e| anyhow::anyhow!("Password hashing error: {:?}", e))?;
    Ok(hashed)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

/// Returns every policy violation; an empty list means the password is acceptable.
pub fn password_problems(password: &str, username: &str, config: &AuthConfig) -> Vec<String> {
    let mut problems = Vec::new();

    if password.chars().count() < config.password_min_length {
        problems.push(format!(
            "This password is too short. It must contain at least {} characters.",
            config.password_min_length
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        problems.push("The password is too similar to the username.".to_string());
    }

    problems
}

use anyhow::Context;

use crate::errors::AppError;

const BCRYPT_COST: u32 = 10;

/// Hashes a password with bcrypt. Runs on the blocking pool; bcrypt is
/// deliberately slow.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .context("Password hashing task panicked")?
        .context("Password hashing failed")?;
    Ok(hash)
}

/// Returns `false` for a wrong password or a malformed stored hash.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .context("Password verification task panicked")?;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password("correct horse".to_string()).await.unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("correct horse".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password("wrong horse".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash_is_a_mismatch() {
        assert!(!verify_password("pw".to_string(), "plaintext".to_string())
            .await
            .unwrap());
    }
}

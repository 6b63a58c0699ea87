//! bcrypt password hashing.
//!
//! Both stores keep bcrypt hashes: the external system of record writes them
//! and locally registered users get the same format. Hashing and verification
//! are CPU-bound, so they run on Tokio's blocking pool.
//!
//! # Invariants
//! - Production cost is never below [`PasswordHasher::MIN_COST`].
//! - Verification fails closed: a hash that cannot be parsed never matches.

/// Error returned when hashing fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// The configured cost is outside the accepted range.
    InvalidCost(u32),
    /// bcrypt rejected the input.
    Hash(String),
    /// The blocking task panicked or was cancelled.
    Task(String),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCost(cost) => write!(
                f,
                "bcrypt cost {cost} is outside {}..={}",
                PasswordHasher::MIN_COST,
                PasswordHasher::MAX_COST
            ),
            Self::Hash(reason) => write!(f, "failed to hash password: {reason}"),
            Self::Task(reason) => write!(f, "password task failed: {reason}"),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Salted bcrypt hashing at a fixed cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub const MIN_COST: u32 = 10;
    pub const MAX_COST: u32 = 31;
    pub const DEFAULT_COST: u32 = 10;

    /// # Errors
    /// Returns `PasswordError::InvalidCost` if `cost` is outside
    /// `MIN_COST..=MAX_COST`.
    pub const fn new(cost: u32) -> Result<Self, PasswordError> {
        if cost < Self::MIN_COST || cost > Self::MAX_COST {
            return Err(PasswordError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    /// bcrypt's minimum cost, for tests only.
    #[cfg(test)]
    pub(crate) const fn fast_for_tests() -> Self {
        Self { cost: 4 }
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password with a fresh salt.
    pub async fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// The comparison inside bcrypt is constant-time. A malformed hash or a
    /// failed blocking task yields `false`.
    pub async fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let plaintext = plaintext.to_owned();
        let hash = hash.to_owned();
        match tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::warn!("stored password hash could not be verified: {e}");
                false
            }
            Err(e) => {
                tracing::error!("password verification task failed: {e}");
                false
            }
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: Self::DEFAULT_COST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_bounds() {
        assert!(PasswordHasher::new(10).is_ok());
        assert!(PasswordHasher::new(31).is_ok());
        assert_eq!(PasswordHasher::new(9), Err(PasswordError::InvalidCost(9)));
        assert_eq!(PasswordHasher::new(32), Err(PasswordError::InvalidCost(32)));
        assert_eq!(PasswordHasher::default().cost(), 10);
    }

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hasher = PasswordHasher::fast_for_tests();
        let hash = hasher.hash("correct horse").await.expect("hash");
        assert!(hash.starts_with("$2"));
        assert!(hasher.verify("correct horse", &hash).await);
        assert!(!hasher.verify("battery staple", &hash).await);
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let hasher = PasswordHasher::fast_for_tests();
        let first = hasher.hash("same").await.expect("hash");
        let second = hasher.hash("same").await.expect("hash");
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_default_cost_hash_verifies() {
        let hasher = PasswordHasher::default();
        let hash = hasher.hash("pw").await.expect("hash");
        assert!(hash.starts_with("$2b$10$"));
        assert!(hasher.verify("pw", &hash).await);
    }

    #[tokio::test]
    async fn test_malformed_hash_fails_closed() {
        let hasher = PasswordHasher::fast_for_tests();
        assert!(!hasher.verify("anything", "not-a-bcrypt-hash").await);
        assert!(!hasher.verify("anything", "").await);
    }

    #[test]
    fn test_password_error_display() {
        assert_eq!(
            PasswordError::InvalidCost(3).to_string(),
            "bcrypt cost 3 is outside 10..=31"
        );
    }
}

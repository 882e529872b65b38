//! bcrypt password hashing.

use anyhow::{anyhow, bail, Result};

/// bcrypt only looks at the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Salted one-way password hashing.
///
/// The salt is embedded in the produced hash string, so hashing the same
/// password twice yields different strings that both verify.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with an explicit bcrypt cost (4..=31).
    pub fn new(cost: u32) -> Result<Self> {
        if !(4..=31).contains(&cost) {
            bail!("bcrypt cost must be between 4 and 31, got {cost}");
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost).map_err(|e| anyhow!("Failed to hash password: {e}"))
    }

    /// Check `password` against a stored hash.
    ///
    /// A malformed hash verifies as `false`; callers never see why. Inputs
    /// longer than [`MAX_PASSWORD_BYTES`] never match: bcrypt would compare
    /// only their prefix. The hash is still computed so the cost is the same.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let matched = match bcrypt::verify(password, hash) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::debug!("password hash could not be parsed: {e}");
                false
            }
        };
        matched && password.len() <= MAX_PASSWORD_BYTES
    }
}

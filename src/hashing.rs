use crate::error::AppError;

/// bcrypt password hashing with a configurable work factor.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    cost: u32,
}

impl Hasher {
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, plain: &str) -> Result<String, AppError> {
        Ok(bcrypt::hash(plain, self.cost)?)
    }

    /// Malformed hashes never verify.
    pub fn verify(plain: &str, hashed: &str) -> bool {
        bcrypt::verify(plain, hashed).unwrap_or(false)
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

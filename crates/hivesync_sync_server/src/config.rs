//! Server configuration.

/// Configuration for the reference server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of changes returned by one pull.
    pub max_pull_batch: usize,
    /// Answer a repeated idempotency key with an error instead of an
    /// acknowledgement that applies nothing.
    pub reject_duplicate_keys: bool,
}

impl ServerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            max_pull_batch: 500,
            reject_duplicate_keys: false,
        }
    }

    /// Sets the maximum pull batch size.
    pub fn with_max_pull_batch(mut self, size: usize) -> Self {
        self.max_pull_batch = size.max(1);
        self
    }

    /// Rejects repeated idempotency keys with [`crate::ServerError::DuplicateKey`].
    pub fn rejecting_duplicate_keys(mut self) -> Self {
        self.reject_duplicate_keys = true;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

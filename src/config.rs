//! Registry configuration

/// Default expected number of singletons
pub const DEFAULT_CAPACITY: usize = 256;

/// Configuration for a [`SingletonRegistry`](crate::SingletonRegistry).
///
/// # Examples
///
/// ```rust
/// use singleton_registry::{RegistryConfig, SingletonRegistry};
///
/// let registry = SingletonRegistry::with_config(
///     RegistryConfig::new()
///         .allow_alias_overriding(false)
///         .capacity(32),
/// );
/// assert_eq!(registry.count_finished(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub(crate) allow_alias_overriding: bool,
    pub(crate) capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            allow_alias_overriding: true,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether re-pointing an existing alias at a different name is allowed
    pub fn allow_alias_overriding(mut self, allow: bool) -> Self {
        self.allow_alias_overriding = allow;
        self
    }

    /// Expected number of singletons, used to pre-size the caches
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Shard count for the concurrent finished map.
    ///
    /// Scales with the expected capacity; the default DashMap shard count
    /// (num_cpus * 4) is far more than a registry of a few hundred names needs.
    pub(crate) fn shard_amount(&self) -> usize {
        if self.capacity <= 16 {
            8
        } else if self.capacity <= 64 {
            16
        } else {
            32
        }
    }
}

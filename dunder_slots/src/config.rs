//! Slot cache configuration.
//!
//! Defaults enable every consistency check in debug builds and none in
//! release builds. Environment variables can override each flag:
//!
//! | Variable                   | Field                   |
//! |----------------------------|-------------------------|
//! | `DUNDER_SLOTS_VALIDATE`    | `validate_on_bootstrap` |
//! | `DUNDER_SLOTS_TRACK_INIT`  | `track_initializing`    |
//! | `DUNDER_SLOTS_SHARED_TIER` | `shared_tier`           |
//! | `DUNDER_SLOTS_FAST_PATH`   | `fast_path`             |
//!
//! A variable is truthy when it is non-empty and not `0`.

/// Configuration for one context's slot cache.
///
/// # Example
///
/// ```ignore
/// use dunder_slots::SlotCacheConfig;
///
/// // Always validate, but skip the shared tier.
/// let config = SlotCacheConfig {
///     shared_tier: false,
///     validate_on_bootstrap: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCacheConfig {
    /// Consult the process-wide descriptor tier before the class's own table.
    ///
    /// Default: true
    pub shared_tier: bool,

    /// Keep a stack of classes under construction so propagation into a
    /// class without a table can be checked.
    ///
    /// Default: true in debug builds
    pub track_initializing: bool,

    /// Run the shared-tier and class-table validators after bootstrap.
    ///
    /// Default: true in debug builds
    pub validate_on_bootstrap: bool,

    /// Reuse the base's table for single-inheritance classes.
    ///
    /// Disabling forces the general construction path everywhere.
    ///
    /// Default: true
    pub fast_path: bool,
}

impl Default for SlotCacheConfig {
    fn default() -> Self {
        Self {
            shared_tier: true,
            track_initializing: cfg!(debug_assertions),
            validate_on_bootstrap: cfg!(debug_assertions),
            fast_path: true,
        }
    }
}

impl SlotCacheConfig {
    /// Every check on.
    pub fn debug() -> Self {
        Self {
            shared_tier: true,
            track_initializing: true,
            validate_on_bootstrap: true,
            fast_path: true,
        }
    }

    /// No checks.
    pub fn release() -> Self {
        Self {
            shared_tier: true,
            track_initializing: false,
            validate_on_bootstrap: false,
            fast_path: true,
        }
    }

    /// Defaults overridden by `DUNDER_SLOTS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |var: &str, default: bool| lookup(var).map_or(default, |v| truthy(&v));
        let defaults = Self::default();
        Self {
            shared_tier: flag("DUNDER_SLOTS_SHARED_TIER", defaults.shared_tier),
            track_initializing: flag("DUNDER_SLOTS_TRACK_INIT", defaults.track_initializing),
            validate_on_bootstrap: flag("DUNDER_SLOTS_VALIDATE", defaults.validate_on_bootstrap),
            fast_path: flag("DUNDER_SLOTS_FAST_PATH", defaults.fast_path),
        }
    }
}

fn truthy(value: &str) -> bool {
    !value.is_empty() && value != "0"
}

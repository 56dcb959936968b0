//! Arena configuration.

use crate::error::ArenaError;
use crate::types::{BufferUsage, COPY_ALIGNMENT};

/// Default initial arena capacity (1 MiB).
pub const DEFAULT_INITIAL_CAPACITY: u64 = 1 << 20;

/// Configuration for an [`ArenaBuffer`](super::ArenaBuffer).
///
/// ```
/// use meshpool_graphics::{ArenaConfig, BufferUsage};
///
/// let config = ArenaConfig::new(4096)
///     .with_growth_threshold(0.75)
///     .with_growth_factor(2.0)
///     .with_usage(BufferUsage::VERTEX)
///     .with_label("terrain_vertices");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArenaConfig {
    /// Capacity of the first device buffer, in bytes. Rounded up to 4.
    pub initial_capacity: u64,
    /// Grow before an insert would push `used / capacity` above this ratio.
    pub growth_threshold: f64,
    /// Capacity multiplier applied on each growth step.
    pub growth_factor: f64,
    /// When `false`, inserts that do not fit fail with `OutOfArenaSpace`.
    pub allow_growth: bool,
    /// Offset alignment of every region. Must be a non-zero multiple of 4.
    pub alignment: u64,
    /// Usage flags of the device buffer. Copy usages are always added.
    pub usage: BufferUsage,
    /// Debug label of the device buffer.
    pub label: Option<String>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            growth_threshold: 0.8,
            growth_factor: 1.5,
            allow_growth: true,
            alignment: COPY_ALIGNMENT,
            usage: BufferUsage::empty(),
            label: None,
        }
    }
}

impl ArenaConfig {
    /// Create a config with the given initial capacity and default policy.
    pub fn new(initial_capacity: u64) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    /// Default config for vertex arenas.
    pub fn vertex() -> Self {
        Self::default()
            .with_usage(BufferUsage::VERTEX)
            .with_label("vertex_arena")
    }

    /// Default config for index arenas.
    pub fn index() -> Self {
        Self::default()
            .with_usage(BufferUsage::INDEX)
            .with_label("index_arena")
    }

    /// Set the initial capacity.
    pub fn with_initial_capacity(mut self, initial_capacity: u64) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Set the load ratio that triggers growth.
    pub fn with_growth_threshold(mut self, growth_threshold: f64) -> Self {
        self.growth_threshold = growth_threshold;
        self
    }

    /// Set the growth multiplier.
    pub fn with_growth_factor(mut self, growth_factor: f64) -> Self {
        self.growth_factor = growth_factor;
        self
    }

    /// Allow or forbid growth.
    pub fn with_growth(mut self, allow_growth: bool) -> Self {
        self.allow_growth = allow_growth;
        self
    }

    /// Set the region alignment.
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set the buffer usage flags.
    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check the policy values.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.initial_capacity == 0 {
            return Err(ArenaError::InvalidConfig(
                "initial capacity cannot be zero".to_string(),
            ));
        }
        if !(self.growth_threshold > 0.0 && self.growth_threshold <= 1.0) {
            return Err(ArenaError::InvalidConfig(format!(
                "growth threshold {} must be in (0, 1]",
                self.growth_threshold
            )));
        }
        if !(self.growth_factor > 1.0 && self.growth_factor.is_finite()) {
            return Err(ArenaError::InvalidConfig(format!(
                "growth factor {} must be greater than 1",
                self.growth_factor
            )));
        }
        if self.alignment == 0 || self.alignment % COPY_ALIGNMENT != 0 {
            return Err(ArenaError::InvalidConfig(format!(
                "alignment {} must be a non-zero multiple of {COPY_ALIGNMENT}",
                self.alignment
            )));
        }
        Ok(())
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Least common multiple. Used to fold an element size into an alignment.
pub(crate) fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return a.max(b);
    }
    a / gcd(a, b) * b
}

//! GPIO pin abstractions
//!
//! Provides traits for digital inputs that can be implemented by
//! chip-specific adapters.

/// Digital input pin
///
/// Implementations should handle the actual hardware register reading
/// for the specific chip.
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

/// Electrical level that means "asserted" for an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveLevel {
    /// Asserted when the pin reads high
    #[default]
    High,
    /// Asserted when the pin reads low
    Low,
}

impl ActiveLevel {
    /// Whether a pin reading of `high` counts as asserted
    pub fn is_asserted(self, high: bool) -> bool {
        match self {
            ActiveLevel::High => high,
            ActiveLevel::Low => !high,
        }
    }
}

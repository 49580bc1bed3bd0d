//! Emergency stop input

use keycycle_hal::{ActiveLevel, InputPin};

/// Emergency stop button on a digital input
#[derive(Debug)]
pub struct EmergencyStop<P: InputPin> {
    pin: P,
    level: ActiveLevel,
}

impl<P: InputPin> EmergencyStop<P> {
    /// Wrap a pin; `level` is the reading that means "pressed"
    pub fn new(pin: P, level: ActiveLevel) -> Self {
        Self { pin, level }
    }

    /// Active-high button with a pull-down (pressed reads high)
    pub fn active_high(pin: P) -> Self {
        Self::new(pin, ActiveLevel::High)
    }

    /// Whether the button is currently pressed
    pub fn is_pressed(&self) -> bool {
        self.level.is_asserted(self.pin.is_high())
    }

    pub fn level(&self) -> ActiveLevel {
        self.level
    }
}

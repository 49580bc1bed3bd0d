//! Station actuators

/// Errors from the actuator bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorError {
    /// Transport failed while sending the command
    Bus,
    /// Station has no actuator on this bus
    InvalidStation,
}

/// One actuator per station, commanded by station index
///
/// Commands are fire-and-forget: `Ok` means the command was sent, not
/// that the actuator reached the goal.
pub trait ActuatorBus {
    /// Command a station's actuator to an absolute angle
    fn set_goal_position(&mut self, station: u8, degrees: f32) -> Result<(), ActuatorError>;

    /// Limit a station's actuator current, as a percentage of its maximum
    fn set_goal_current(&mut self, station: u8, percent: f32) -> Result<(), ActuatorError>;

    /// Put a station's actuator into torque-limited position mode
    ///
    /// The default only applies the current limit; buses that need a mode
    /// switch or torque enable override this.
    fn prepare(&mut self, station: u8, current_percent: f32) -> Result<(), ActuatorError> {
        self.set_goal_current(station, current_percent)
    }
}

impl<T: ActuatorBus + ?Sized> ActuatorBus for &mut T {
    fn set_goal_position(&mut self, station: u8, degrees: f32) -> Result<(), ActuatorError> {
        (**self).set_goal_position(station, degrees)
    }

    fn set_goal_current(&mut self, station: u8, percent: f32) -> Result<(), ActuatorError> {
        (**self).set_goal_current(station, percent)
    }

    fn prepare(&mut self, station: u8, current_percent: f32) -> Result<(), ActuatorError> {
        (**self).prepare(station, current_percent)
    }
}

//! Analog current-sense inputs

/// Current-sense channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Current through the keyswitch contacts
    Keyswitch,
    /// Current drawn by the starter circuit
    Starter,
}

impl Channel {
    /// Both channels in sampling order
    pub const ALL: [Channel; 2] = [Channel::Keyswitch, Channel::Starter];
}

/// Errors from reading a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalError {
    /// ADC conversion failed
    Conversion,
    /// Channel not wired on this board
    Unavailable,
}

/// Source of raw analog readings
///
/// Takes `&mut self` because ADC reads require mutable access.
pub trait SignalSource {
    /// Read one raw sample from `channel`
    fn read_raw(&mut self, channel: Channel) -> Result<u16, SignalError>;
}

impl<T: SignalSource + ?Sized> SignalSource for &mut T {
    fn read_raw(&mut self, channel: Channel) -> Result<u16, SignalError> {
        (**self).read_raw(channel)
    }
}

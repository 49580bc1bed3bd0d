//! Non-volatile memory abstractions
//!
//! Provides a flat, byte-addressable view of a persistent memory device
//! (SPI FRAM, EEPROM, a reserved flash window). Unlike a key-value store,
//! the caller owns the layout: every read and write names an absolute
//! address.

/// Errors from non-volatile memory operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NvmError {
    /// Bus transaction failed (SPI/I2C error)
    Bus,
    /// Address range falls outside the device
    OutOfBounds,
    /// Device did not respond or reported an unexpected identity
    NotPresent,
    /// Device is write-protected
    WriteProtected,
}

/// Byte-addressable non-volatile memory
///
/// Implementations must treat multi-byte writes as non-atomic: a power loss
/// in the middle of a write may leave any prefix of the data committed.
/// Callers that need integrity read the data back after writing.
pub trait NvMemory {
    /// Total addressable size in bytes
    fn capacity(&self) -> u32;

    /// Read `buffer.len()` bytes starting at `address`
    fn read(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), NvmError>;

    /// Write `data` starting at `address`
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), NvmError>;

    /// Check that `len` bytes starting at `address` fit in the device
    fn check_range(&self, address: u32, len: usize) -> Result<(), NvmError> {
        let end = (address as u64) + (len as u64);
        if end > self.capacity() as u64 {
            Err(NvmError::OutOfBounds)
        } else {
            Ok(())
        }
    }
}

impl<T: NvMemory + ?Sized> NvMemory for &mut T {
    fn capacity(&self) -> u32 {
        (**self).capacity()
    }

    fn read(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), NvmError> {
        (**self).read(address, buffer)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), NvmError> {
        (**self).write(address, data)
    }
}

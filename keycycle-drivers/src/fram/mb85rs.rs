//! Fujitsu MB85RS SPI FRAM
//!
//! Serial FRAM with SRAM-like semantics: no erase, no page boundaries and
//! no write delay. Every write must be preceded by WREN; the write enable
//! latch clears itself when the write completes.
//!
//! # SPI Protocol
//!
//! Mode 0, MSB first. Parts of 1 Mbit and above take 3-byte addresses:
//! - READ:  `03 A2 A1 A0` then clock out data
//! - WRITE: `02 A2 A1 A0 D0 D1 ...`
//! - RDID:  `9F` then 4 bytes (manufacturer, continuation, product id)

use embedded_hal::spi::{Operation, SpiDevice};
use keycycle_hal::{NvMemory, NvmError};

/// Command opcodes
pub mod opcode {
    /// Set write enable latch
    pub const WREN: u8 = 0x06;
    /// Reset write enable latch
    pub const WRDI: u8 = 0x04;
    /// Read status register
    pub const RDSR: u8 = 0x05;
    /// Read memory
    pub const READ: u8 = 0x03;
    /// Write memory
    pub const WRITE: u8 = 0x02;
    /// Read device id
    pub const RDID: u8 = 0x9F;
}

/// JEDEC manufacturer id of Fujitsu
pub const FUJITSU_ID: u8 = 0x04;

/// Continuation code reported in the second id byte
pub const CONTINUATION_CODE: u8 = 0x7F;

/// Status register block-protect bits (BP1, BP0)
const STATUS_BP_MASK: u8 = 0x0C;

/// FRAM errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramError {
    /// SPI transaction failed
    Spi,
    /// Device id did not match a Fujitsu FRAM
    NotDetected { manufacturer: u8 },
    /// Block-protect bits are set
    WriteProtected,
    /// Access outside the device
    OutOfBounds,
}

impl From<FramError> for NvmError {
    fn from(e: FramError) -> Self {
        match e {
            FramError::Spi => NvmError::Bus,
            FramError::NotDetected { .. } => NvmError::NotPresent,
            FramError::WriteProtected => NvmError::WriteProtected,
            FramError::OutOfBounds => NvmError::OutOfBounds,
        }
    }
}

/// Identity reported by RDID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId {
    pub manufacturer: u8,
    pub continuation: u8,
    /// Density and variant, big-endian as transmitted
    pub product: u16,
}

impl DeviceId {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            manufacturer: bytes[0],
            continuation: bytes[1],
            product: u16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }

    pub fn is_fujitsu(&self) -> bool {
        self.manufacturer == FUJITSU_ID && self.continuation == CONTINUATION_CODE
    }
}

/// MB85RS FRAM on an SPI device
///
/// The device handle owns chip select, so every transaction here is one
/// complete command frame.
pub struct Mb85rs<SPI> {
    spi: SPI,
    capacity: u32,
}

impl<SPI: SpiDevice> Mb85rs<SPI> {
    /// Wrap a device of `capacity` bytes
    ///
    /// Capacities above 16 MiB cannot be addressed with 3 bytes and are
    /// clamped.
    pub fn new(spi: SPI, capacity: u32) -> Self {
        Self {
            spi,
            capacity: capacity.min(1 << 24),
        }
    }

    /// Give the SPI device back
    pub fn release(self) -> SPI {
        self.spi
    }

    /// Read the device id
    pub fn read_id(&mut self) -> Result<DeviceId, FramError> {
        let mut id = [0u8; 4];
        self.spi
            .transaction(&mut [Operation::Write(&[opcode::RDID]), Operation::Read(&mut id)])
            .map_err(|_| FramError::Spi)?;
        Ok(DeviceId::from_bytes(id))
    }

    /// Check that a Fujitsu FRAM answers and is writable
    pub fn probe(&mut self) -> Result<DeviceId, FramError> {
        let id = self.read_id()?;
        if !id.is_fujitsu() {
            return Err(FramError::NotDetected {
                manufacturer: id.manufacturer,
            });
        }
        if self.read_status()? & STATUS_BP_MASK != 0 {
            return Err(FramError::WriteProtected);
        }
        Ok(id)
    }

    /// Read the status register
    pub fn read_status(&mut self) -> Result<u8, FramError> {
        let mut status = [0u8; 1];
        self.spi
            .transaction(&mut [Operation::Write(&[opcode::RDSR]), Operation::Read(&mut status)])
            .map_err(|_| FramError::Spi)?;
        Ok(status[0])
    }

    fn command(&mut self, op: u8) -> Result<(), FramError> {
        self.spi.write(&[op]).map_err(|_| FramError::Spi)
    }

    fn check(&self, address: u32, len: usize) -> Result<(), FramError> {
        let end = address as u64 + len as u64;
        if end > self.capacity as u64 {
            Err(FramError::OutOfBounds)
        } else {
            Ok(())
        }
    }

    /// Read `buffer.len()` bytes from `address`
    pub fn read_bytes(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), FramError> {
        self.check(address, buffer.len())?;
        if buffer.is_empty() {
            return Ok(());
        }
        let header = frame_header(opcode::READ, address);
        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Read(buffer)])
            .map_err(|_| FramError::Spi)
    }

    /// Write `data` at `address`
    pub fn write_bytes(&mut self, address: u32, data: &[u8]) -> Result<(), FramError> {
        self.check(address, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        let header = frame_header(opcode::WRITE, address);
        self.command(opcode::WREN)?;
        let written = self
            .spi
            .transaction(&mut [Operation::Write(&header), Operation::Write(data)])
            .map_err(|_| FramError::Spi);
        // Leave the latch cleared even if the write frame failed
        self.command(opcode::WRDI)?;
        written
    }
}

fn frame_header(op: u8, address: u32) -> [u8; 4] {
    let a = address.to_be_bytes();
    [op, a[1], a[2], a[3]]
}

impl<SPI: SpiDevice> NvMemory for Mb85rs<SPI> {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn read(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), NvmError> {
        Ok(self.read_bytes(address, buffer)?)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), NvmError> {
        Ok(self.write_bytes(address, data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::spi::{ErrorKind, ErrorType};
    use heapless::Vec;

    const SIZE: usize = 512;

    /// Emulated MB85RS4MT behind a chip select
    struct FakeFram {
        memory: [u8; SIZE],
        id: [u8; 4],
        status: u8,
        write_enabled: bool,
        fail: bool,
        frames: usize,
    }

    impl FakeFram {
        fn new() -> Self {
            Self {
                memory: [0; SIZE],
                id: [FUJITSU_ID, CONTINUATION_CODE, 0x49, 0x09],
                status: 0,
                write_enabled: false,
                fail: false,
                frames: 0,
            }
        }

        fn address(tx: &[u8]) -> usize {
            (u32::from_be_bytes([0, tx[1], tx[2], tx[3]]) as usize) % SIZE
        }

        fn respond(&self, tx: &[u8], buf: &mut [u8]) {
            match tx.first() {
                Some(&opcode::READ) => {
                    let start = Self::address(tx);
                    for (i, b) in buf.iter_mut().enumerate() {
                        *b = self.memory[(start + i) % SIZE];
                    }
                }
                Some(&opcode::RDID) => buf.copy_from_slice(&self.id[..buf.len()]),
                Some(&opcode::RDSR) => buf[0] = self.status,
                _ => buf.fill(0xFF),
            }
        }

        fn execute(&mut self, tx: &[u8]) {
            match tx.first() {
                Some(&opcode::WREN) => self.write_enabled = true,
                Some(&opcode::WRDI) => self.write_enabled = false,
                Some(&opcode::WRITE) if self.write_enabled => {
                    let start = Self::address(tx);
                    for (i, b) in tx[4..].iter().enumerate() {
                        self.memory[(start + i) % SIZE] = *b;
                    }
                    self.write_enabled = false;
                }
                _ => {}
            }
        }
    }

    impl ErrorType for FakeFram {
        type Error = ErrorKind;
    }

    impl SpiDevice for FakeFram {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            self.frames += 1;
            let mut tx: Vec<u8, 64> = Vec::new();
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        tx.extend_from_slice(bytes).map_err(|_| ErrorKind::Other)?
                    }
                    Operation::Read(buf) => self.respond(&tx, buf),
                    _ => return Err(ErrorKind::Other),
                }
            }
            self.execute(&tx);
            Ok(())
        }
    }

    fn fram() -> Mb85rs<FakeFram> {
        Mb85rs::new(FakeFram::new(), SIZE as u32)
    }

    #[test]
    fn test_frame_header() {
        assert_eq!(frame_header(opcode::READ, 0x01_2345), [0x03, 0x01, 0x23, 0x45]);
        assert_eq!(frame_header(opcode::WRITE, 16), [0x02, 0x00, 0x00, 0x10]);
    }

    #[test]
    fn test_probe() {
        let mut fram = fram();
        let id = fram.probe().unwrap();
        assert_eq!(id.manufacturer, FUJITSU_ID);
        assert_eq!(id.product, 0x4909);
    }

    #[test]
    fn test_probe_rejects_other_device() {
        let mut spi = FakeFram::new();
        spi.id = [0xFF; 4];
        let mut fram = Mb85rs::new(spi, SIZE as u32);
        assert_eq!(
            fram.probe(),
            Err(FramError::NotDetected { manufacturer: 0xFF })
        );
    }

    #[test]
    fn test_probe_rejects_protected_device() {
        let mut spi = FakeFram::new();
        spi.status = 0x0C;
        let mut fram = Mb85rs::new(spi, SIZE as u32);
        assert_eq!(fram.probe(), Err(FramError::WriteProtected));
    }

    #[test]
    fn test_write_then_read() {
        let mut fram = fram();
        fram.write(100, &[1, 2, 3, 4, 5]).unwrap();
        let mut out = [0u8; 5];
        fram.read(100, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_write_sets_and_clears_latch() {
        let mut fram = fram();
        fram.write(0, &[0xAB]).unwrap();
        let spi = fram.release();
        // WREN, WRITE, WRDI
        assert_eq!(spi.frames, 3);
        assert!(!spi.write_enabled);
        assert_eq!(spi.memory[0], 0xAB);
    }

    #[test]
    fn test_bounds() {
        let mut fram = fram();
        let mut buf = [0u8; 4];
        assert_eq!(fram.read(SIZE as u32 - 2, &mut buf), Err(NvmError::OutOfBounds));
        assert_eq!(fram.write(SIZE as u32, &[1]), Err(NvmError::OutOfBounds));
        assert_eq!(fram.write(SIZE as u32 - 1, &[1]), Ok(()));
    }

    #[test]
    fn test_empty_access_skips_bus() {
        let mut fram = fram();
        fram.write(0, &[]).unwrap();
        fram.read(0, &mut []).unwrap();
        assert_eq!(fram.release().frames, 0);
    }

    #[test]
    fn test_bus_failure_maps_to_nvm_error() {
        let mut spi = FakeFram::new();
        spi.fail = true;
        let mut fram = Mb85rs::new(spi, SIZE as u32);
        let mut buf = [0u8; 1];
        assert_eq!(fram.read(0, &mut buf), Err(NvmError::Bus));
        assert_eq!(fram.write(0, &[1]), Err(NvmError::Bus));
        assert_eq!(fram.read_id(), Err(FramError::Spi));
    }

    #[test]
    fn test_capacity_clamped_to_address_width() {
        let fram = Mb85rs::new(FakeFram::new(), u32::MAX);
        assert_eq!(fram.capacity(), 1 << 24);
    }
}

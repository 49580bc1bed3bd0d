//! Durable station state
//!
//! Station counters and enable flags live in a flat record table on
//! byte-addressable non-volatile memory:
//!
//! ```text
//! 0x00  magic    u32  "KYC1"
//! 0x04  version  u16
//! 0x06  reserved
//! 0x10  station 0: cycles u32 | failures u16 | enabled u8 | reserved u8
//! 0x18  station 1
//! ...
//!       scratch  u32  (self-test)
//! ```
//!
//! All fields are little-endian. Every write is read back and compared.

pub mod layout;
pub mod state_store;

pub use layout::{
    validate_record, RecordField, RecordVerdict, StationRecord, RECORD_SIZE, STORE_MAGIC,
    STORE_VERSION, TABLE_BASE,
};
pub use state_store::{InitOutcome, LoadReport, StateStore, StoreError};

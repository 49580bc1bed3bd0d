//! Configuration types
//!
//! Board-agnostic tester configuration. The firmware fills these from its
//! embedded TOML file; the defaults match the reference build.

pub mod tester;

pub use tester::*;

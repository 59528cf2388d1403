//! Acoustic data modem: one 256-byte payload per frame over mono audio
//!
//! OFDM with 64 subcarriers on a 256-point transform, Schmidl-Cox
//! synchronisation, differential QPSK, and a CRC-aided polar code behind a
//! whitener and interleaver. The encoder and decoder are streaming: both
//! work on caller-sized sample chunks and never touch an audio device.

pub mod error;

pub mod buffer;
pub mod crc;
pub mod dsp;
pub mod interleave;
pub mod mls;
pub mod polar;
pub mod polar_list;
pub mod psk;
pub mod scramble;
pub mod simplex;
pub mod sync;

pub mod decoder;
pub mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{ModemError, Result};

// OFDM frame geometry
pub const SYMBOL_LENGTH: usize = 256;
pub const GUARD_LENGTH: usize = SYMBOL_LENGTH / 8;
pub const EXTENDED_LENGTH: usize = SYMBOL_LENGTH + GUARD_LENGTH;
pub const SUBCARRIER_COUNT: usize = 64;
pub const FIRST_SUBCARRIER: i32 = 16;
pub const BASE_SUBCARRIER: i32 = -(SUBCARRIER_COUNT as i32) / 2;
pub const PAYLOAD_SYMBOLS: usize = 32;
pub const NOISE_SYMBOLS: usize = 14;

// Code dimensions
pub const CODE_ORDER: usize = 12;
pub const CODE_LENGTH: usize = 1 << CODE_ORDER;
pub const DATA_BITS: usize = 2048;
pub const MESG_BYTES: usize = DATA_BITS / 8;

// Receive path
pub const FILTER_LENGTH: usize = 33;
pub const BUFFER_LENGTH: usize = 5 * EXTENDED_LENGTH;
pub const SEARCH_POSITION: usize = 2 * EXTENDED_LENGTH;

// Deterministic sequences shared by both ends of the link
pub const PILOT_SEQUENCE_POLY: u32 = 0b1100111;
pub const META_SEQUENCE_POLY: u32 = 0b1000011;
pub const NOISE_SEQUENCE_POLY: u32 = 0b100101010001;
pub const PAYLOAD_CRC_POLY: u32 = 0x8F6E37A0;

//! CRC-aided systematic polar coding over the 4096-bit frame word.
//!
//! The frozen set is rebuilt at construction from the Bhattacharyya
//! recursion, so encoder and decoder always agree on the same mask. Code
//! bits travel in NRZ form (+1 = bit 0) between here and the mapper.

use crate::crc::Crc32;
use crate::mls::nrz;
use crate::polar_list::{frozen_bit, PolarListDecoder};
use crate::{CODE_LENGTH, CODE_ORDER, DATA_BITS, PAYLOAD_CRC_POLY};
use std::cmp::Ordering;

pub const MESG_BITS: usize = DATA_BITS + 32;

fn get_le_bit(bytes: &[u8], index: usize) -> bool {
    (bytes[index / 8] >> (index % 8)) & 1 != 0
}

fn set_le_bit(bytes: &mut [u8], index: usize, bit: bool) {
    let mask = 1 << (index % 8);
    if bit {
        bytes[index / 8] |= mask;
    } else {
        bytes[index / 8] &= !mask;
    }
}

/// Frozen-position bitmap: 2080 information positions kept, 2016 frozen.
pub fn frozen_mask() -> Vec<u32> {
    let mut z = vec![0.5f64];
    for _ in 0..CODE_ORDER {
        let mut split = Vec::with_capacity(2 * z.len());
        for &p in &z {
            split.push(2.0 * p - p * p);
            split.push(p * p);
        }
        z = split;
    }
    let mut order: Vec<usize> = (0..CODE_LENGTH).collect();
    order.sort_by(|&a, &b| {
        z[a].partial_cmp(&z[b])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut mask = vec![0u32; CODE_LENGTH / 32];
    for &index in &order[MESG_BITS..] {
        mask[index / 32] |= 1 << (index % 32);
    }
    mask
}

fn transform_nrz(code: &mut [i8]) {
    let len = code.len();
    let mut h = 1;
    while h < len {
        for i in (0..len).step_by(2 * h) {
            for j in i..i + h {
                code[j] *= code[j + h];
            }
        }
        h *= 2;
    }
}

fn transform_bits(bits: &mut [u8]) {
    let len = bits.len();
    let mut h = 1;
    while h < len {
        for i in (0..len).step_by(2 * h) {
            for j in i..i + h {
                bits[j] ^= bits[j + h];
            }
        }
        h *= 2;
    }
}

pub struct PolarEncoder {
    frozen: Vec<u32>,
    crc: Crc32,
    mesg: Vec<i8>,
}

impl PolarEncoder {
    pub fn new() -> Self {
        Self {
            frozen: frozen_mask(),
            crc: Crc32::new(PAYLOAD_CRC_POLY),
            mesg: vec![0; MESG_BITS],
        }
    }

    /// Systematically encode 256 whitened bytes into 4096 NRZ code bits.
    pub fn encode(&mut self, code: &mut [i8], message: &[u8]) {
        for i in 0..DATA_BITS {
            self.mesg[i] = nrz(get_le_bit(message, i)) as i8;
        }
        self.crc.reset();
        for &byte in message {
            self.crc.put_byte(byte);
        }
        let checksum = self.crc.value();
        for i in 0..32 {
            self.mesg[DATA_BITS + i] = nrz((checksum >> i) & 1 != 0) as i8;
        }

        let mut next = 0;
        for (i, value) in code.iter_mut().enumerate() {
            *value = if frozen_bit(&self.frozen, i) {
                1
            } else {
                next += 1;
                self.mesg[next - 1]
            };
        }
        transform_nrz(code);
        for (i, value) in code.iter_mut().enumerate() {
            if frozen_bit(&self.frozen, i) {
                *value = 1;
            }
        }
        transform_nrz(code);
    }
}

impl Default for PolarEncoder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PolarDecoder {
    frozen: Vec<u32>,
    crc: Crc32,
    list: PolarListDecoder,
}

impl PolarDecoder {
    pub fn new() -> Self {
        Self {
            frozen: frozen_mask(),
            crc: Crc32::new(PAYLOAD_CRC_POLY),
            list: PolarListDecoder::new(CODE_ORDER),
        }
    }

    /// List-decode soft bits, gate candidates on the CRC, count flips.
    ///
    /// Writes the still-whitened message on success. `None` means no list
    /// entry produced a zero CRC.
    pub fn decode(&mut self, message: &mut [u8], code: &[i8]) -> Option<u32> {
        let candidates = self.list.decode(code, &self.frozen);
        for candidate in &candidates {
            let mut word = candidate.hard.clone();
            transform_bits(&mut word);

            self.crc.reset();
            for (i, &bit) in word.iter().enumerate() {
                if !frozen_bit(&self.frozen, i) {
                    self.crc.put_bit(bit != 0);
                }
            }
            if self.crc.value() != 0 {
                continue;
            }

            let mut flips = 0;
            let mut data_index = 0;
            for (i, &bit) in word.iter().enumerate() {
                if frozen_bit(&self.frozen, i) {
                    continue;
                }
                if data_index == DATA_BITS {
                    break;
                }
                let decoded = bit != 0;
                let received = code[i] < 0;
                flips += (decoded != received) as u32;
                set_le_bit(message, data_index, decoded);
                data_index += 1;
            }
            return Some(flips);
        }
        None
    }
}

impl Default for PolarDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MESG_BYTES;

    fn soft_from_code(code: &[i8]) -> Vec<i8> {
        code.iter().map(|&bit| bit * 96).collect()
    }

    #[test]
    fn test_frozen_mask_counts() {
        let mask = frozen_mask();
        let frozen: u32 = mask.iter().map(|word| word.count_ones()).sum();
        assert_eq!(frozen as usize, CODE_LENGTH - MESG_BITS);
        // the recursion is deterministic
        assert_eq!(mask, frozen_mask());
    }

    #[test]
    fn test_systematic_positions_carry_message() {
        let mut encoder = PolarEncoder::new();
        let message: Vec<u8> = (0..MESG_BYTES).map(|i| (i * 13 + 7) as u8).collect();
        let mut code = vec![0i8; CODE_LENGTH];
        encoder.encode(&mut code, &message);

        let frozen = frozen_mask();
        let mut data_index = 0;
        for (i, &value) in code.iter().enumerate() {
            if frozen_bit(&frozen, i) || data_index >= DATA_BITS {
                continue;
            }
            let bit = get_le_bit(&message, data_index);
            assert_eq!(value, nrz(bit) as i8, "position {i}");
            data_index += 1;
        }
    }

    #[test]
    fn test_round_trip_clean() {
        let mut encoder = PolarEncoder::new();
        let mut decoder = PolarDecoder::new();
        let message: Vec<u8> = (0..MESG_BYTES).map(|i| (i * 31 + 5) as u8).collect();
        let mut code = vec![0i8; CODE_LENGTH];
        encoder.encode(&mut code, &message);

        let mut recovered = vec![0u8; MESG_BYTES];
        let flips = decoder.decode(&mut recovered, &soft_from_code(&code));
        assert_eq!(flips, Some(0));
        assert_eq!(recovered, message);
    }

    #[test]
    fn test_round_trip_with_flips() {
        let mut encoder = PolarEncoder::new();
        let mut decoder = PolarDecoder::new();
        let message: Vec<u8> = (0..MESG_BYTES).map(|i| (i ^ 0x5A) as u8).collect();
        let mut code = vec![0i8; CODE_LENGTH];
        encoder.encode(&mut code, &message);

        let mut soft = soft_from_code(&code);
        for i in (0..CODE_LENGTH).step_by(311) {
            soft[i] = -soft[i] / 8;
        }
        let mut recovered = vec![0u8; MESG_BYTES];
        let flips = decoder.decode(&mut recovered, &soft).expect("decode failed");
        assert!(flips <= 14, "flips {flips}");
        assert_eq!(recovered, message);
    }

    #[test]
    fn test_garbage_fails_crc() {
        let mut decoder = PolarDecoder::new();
        let soft: Vec<i8> = (0..CODE_LENGTH)
            .map(|i| ((i * 97 + 13) % 255) as i8)
            .collect();
        let mut recovered = vec![0u8; MESG_BYTES];
        assert_eq!(decoder.decode(&mut recovered, &soft), None);
    }
}

//! (63, 6) Simplex code for the frame-start marker.
//!
//! Codeword bit `i` is the parity of `data & (i + 1)`, emitted NRZ. Decoding
//! correlates the received soft word against all 64 codewords and takes the
//! strongest, so a handful of corrupted positions cannot forge the marker.

use crate::mls::nrz;

pub const META_LENGTH: usize = 63;

pub fn simplex_encode(data: u32, code: &mut [i8]) {
    debug_assert_eq!(code.len(), META_LENGTH);
    for (i, value) in code.iter_mut().enumerate() {
        let bit = (data & (i as u32 + 1)).count_ones() & 1 != 0;
        *value = nrz(bit) as i8;
    }
}

pub fn simplex_decode(code: &[i8]) -> u32 {
    debug_assert_eq!(code.len(), META_LENGTH);
    let mut best_data = 0;
    let mut best_sum = i32::MIN;
    for data in 0..64u32 {
        let mut sum = 0;
        for (i, &value) in code.iter().enumerate() {
            let bit = (data & (i as u32 + 1)).count_ones() & 1 != 0;
            sum += nrz(bit) * value as i32;
        }
        if sum > best_sum {
            best_sum = sum;
            best_data = data;
        }
    }
    best_data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_words_round_trip() {
        let mut code = [0i8; META_LENGTH];
        for data in 0..64 {
            simplex_encode(data, &mut code);
            assert_eq!(simplex_decode(&code), data);
        }
    }

    #[test]
    fn test_corrupted_word_still_decodes() {
        let mut code = [0i8; META_LENGTH];
        simplex_encode(1, &mut code);
        // Simplex minimum distance is 32: flipping 12 positions is harmless
        for i in (0..24).step_by(2) {
            code[i] = -code[i];
        }
        assert_eq!(simplex_decode(&code), 1);
    }

    #[test]
    fn test_erased_word_rejects_marker() {
        let code = [0i8; META_LENGTH];
        assert_ne!(simplex_decode(&code), 1);
    }

    #[test]
    fn test_soft_magnitudes() {
        let mut code = [0i8; META_LENGTH];
        simplex_encode(37, &mut code);
        for value in code.iter_mut() {
            *value *= 8;
        }
        assert_eq!(simplex_decode(&code), 37);
    }
}

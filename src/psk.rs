//! BPSK/QPSK mapping and int8 soft demapping.
//!
//! Code bits are NRZ valued (+1 = bit 0, −1 = bit 1) on both sides of the
//! mapper. Soft outputs are saturated to ±127 so the polar decoder can run
//! entirely on int8 LLRs.

use rustfft::num_complex::Complex;

const SQRT_2: f32 = std::f32::consts::SQRT_2;

fn quantize(value: f32) -> i8 {
    let clamped = value.clamp(-127.0, 127.0);
    clamped.round() as i8
}

/// Two NRZ code bits to a unit-magnitude QPSK point.
pub fn qpsk_map(bits: &[i8]) -> Complex<f32> {
    Complex::new(bits[0] as f32, bits[1] as f32) / SQRT_2
}

pub fn qpsk_hard(bits: &mut [i8], point: Complex<f32>) {
    bits[0] = if point.re < 0.0 { -1 } else { 1 };
    bits[1] = if point.im < 0.0 { -1 } else { 1 };
}

pub fn qpsk_soft(bits: &mut [i8], point: Complex<f32>, precision: f32) {
    bits[0] = quantize(SQRT_2 * precision * point.re);
    bits[1] = quantize(SQRT_2 * precision * point.im);
}

pub fn bpsk_soft(bit: &mut i8, point: Complex<f32>, precision: f32) {
    *bit = quantize(2.0 * precision * point.re);
}

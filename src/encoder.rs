//! Frame producer: payload bytes to baseband audio samples.
//!
//! `init` whitens, polar-encodes and interleaves the payload, then a small
//! state machine emits the frame one OFDM symbol at a time into a bounded
//! output queue that `read` drains at the caller's pace.

use crate::error::{ModemError, Result};
use crate::interleave::Interleaver;
use crate::mls::{nrz, Mls};
use crate::polar::PolarEncoder;
use crate::psk::qpsk_map;
use crate::scramble::whiten;
use crate::simplex::{simplex_encode, META_LENGTH};
use crate::{
    CODE_LENGTH, EXTENDED_LENGTH, FIRST_SUBCARRIER, GUARD_LENGTH, MESG_BYTES, NOISE_SEQUENCE_POLY,
    NOISE_SYMBOLS, PAYLOAD_SYMBOLS, PILOT_SEQUENCE_POLY, META_SEQUENCE_POLY, SUBCARRIER_COUNT,
    SYMBOL_LENGTH,
};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

const QUEUE_LENGTH: usize = 3 * EXTENDED_LENGTH;

fn tx_bin(carrier: usize) -> usize {
    FIRST_SUBCARRIER as usize + carrier
}

pub struct Encoder {
    ifft: Arc<dyn Fft<f32>>,
    queue: VecDeque<f32>,
    noise_seq: Mls,
    interleaver: Interleaver,
    polar: PolarEncoder,
    freq: Vec<Complex<f32>>,
    temp: Vec<Complex<f32>>,
    guard: [f32; GUARD_LENGTH],
    code: Vec<i8>,
    meta: [i8; META_LENGTH],
    symbol_number: usize,
    count_down: u8,
    noise_count: usize,
}

impl Encoder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ifft: FftPlanner::new().plan_fft_inverse(SYMBOL_LENGTH),
            queue: VecDeque::with_capacity(QUEUE_LENGTH),
            noise_seq: Mls::new(NOISE_SEQUENCE_POLY),
            interleaver: Interleaver::new(CODE_LENGTH),
            polar: PolarEncoder::new(),
            freq: vec![Complex::new(0.0, 0.0); SYMBOL_LENGTH],
            temp: vec![Complex::new(0.0, 0.0); SYMBOL_LENGTH],
            guard: [0.0; GUARD_LENGTH],
            code: vec![0; CODE_LENGTH],
            meta: [0; META_LENGTH],
            symbol_number: PAYLOAD_SYMBOLS,
            count_down: 0,
            noise_count: 0,
        })
    }

    /// Arm the producer with a fresh 256-byte payload.
    pub fn init(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() != MESG_BYTES {
            return Err(ModemError::InvalidInputSize);
        }
        self.symbol_number = 0;
        self.count_down = 5;
        self.noise_count = NOISE_SYMBOLS;
        self.guard = [0.0; GUARD_LENGTH];
        let mut mesg = [0u8; MESG_BYTES];
        mesg.copy_from_slice(payload);
        whiten(&mut mesg);
        self.polar.encode(&mut self.code, &mesg);
        self.interleaver.shuffle(&mut self.code);
        Ok(())
    }

    /// Fill `audio`; returns true once the whole frame has been emitted.
    pub fn read(&mut self, audio: &mut [f32]) -> bool {
        for sample in audio.iter_mut() {
            self.produce();
            *sample = self.queue.pop_front().unwrap_or(0.0);
        }
        self.queue.is_empty()
    }

    /// Samples currently queued but not yet read.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn produce(&mut self) {
        if self.queue.len() + 2 * EXTENDED_LENGTH > QUEUE_LENGTH {
            return;
        }
        match self.count_down {
            5 | 4 => {
                if self.count_down == 5 && self.noise_count > 0 {
                    self.noise_count -= 1;
                    self.noise_symbol();
                } else {
                    // no noise symbols left: the training pair goes out in
                    // the same step, never a silent gap
                    self.schmidl_cox();
                    self.count_down = 3;
                }
            }
            3 => {
                self.preamble(1);
                self.count_down = 2;
            }
            2 => {
                self.payload_symbol();
                self.symbol_number += 1;
                if self.symbol_number == PAYLOAD_SYMBOLS {
                    self.count_down = 1;
                }
            }
            1 => {
                self.silence();
                self.count_down = 0;
            }
            _ => {}
        }
    }

    fn noise_symbol(&mut self) {
        let factor = (SYMBOL_LENGTH as f32 / SUBCARRIER_COUNT as f32).sqrt();
        for i in 0..SUBCARRIER_COUNT {
            let re = nrz(self.noise_seq.next()) as f32;
            let im = nrz(self.noise_seq.next()) as f32;
            self.freq[tx_bin(i)] = factor * Complex::new(re, im);
        }
        self.symbol(true);
    }

    fn schmidl_cox(&mut self) {
        let mut seq = Mls::new(PILOT_SEQUENCE_POLY);
        self.freq[tx_bin(0)] =
            Complex::new((2.0 * SYMBOL_LENGTH as f32 / SUBCARRIER_COUNT as f32).sqrt(), 0.0);
        for i in 1..SUBCARRIER_COUNT {
            self.freq[tx_bin(i)] = self.freq[tx_bin(i - 1)] * nrz(seq.next()) as f32;
        }
        self.symbol(true);
        self.symbol(false);
    }

    fn preamble(&mut self, data: u32) {
        simplex_encode(data, &mut self.meta);
        let mut seq = Mls::new(META_SEQUENCE_POLY);
        self.freq[tx_bin(0)] =
            Complex::new((SYMBOL_LENGTH as f32 / SUBCARRIER_COUNT as f32).sqrt(), 0.0);
        for i in 0..META_LENGTH {
            self.freq[tx_bin(i + 1)] =
                self.freq[tx_bin(i)] * (self.meta[i] as i32 * nrz(seq.next())) as f32;
        }
        self.symbol(true);
    }

    fn payload_symbol(&mut self) {
        for i in 0..SUBCARRIER_COUNT {
            let offset = 2 * (SUBCARRIER_COUNT * self.symbol_number + i);
            self.freq[tx_bin(i)] *= qpsk_map(&self.code[offset..offset + 2]);
        }
        self.symbol(true);
    }

    fn silence(&mut self) {
        self.freq.fill(Complex::new(0.0, 0.0));
        self.symbol(true);
    }

    fn symbol(&mut self, output_guard: bool) {
        self.temp.copy_from_slice(&self.freq);
        self.ifft.process(&mut self.temp);
        let scale = 1.0 / (8.0 * SYMBOL_LENGTH as f32).sqrt();
        for value in self.temp.iter_mut() {
            *value *= scale;
        }
        if output_guard {
            // half-cosine fade from the previous symbol head into this
            // symbol's cyclic tail; second half of the guard is a plain copy
            for i in 0..GUARD_LENGTH {
                let x = (i as f32 / (GUARD_LENGTH - 1) as f32).min(0.5) / 0.5;
                let y = 0.5 * (1.0 - (PI * x).cos());
                let tail = self.temp[SYMBOL_LENGTH - GUARD_LENGTH + i].re;
                self.queue.push_back(self.guard[i] * (1.0 - y) + tail * y);
            }
        }
        for i in 0..GUARD_LENGTH {
            self.guard[i] = self.temp[i].re;
        }
        for i in 0..SYMBOL_LENGTH {
            self.queue.push_back(self.temp[i].re);
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new().unwrap()
    }
}

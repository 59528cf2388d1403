//! Frame consumer: baseband audio samples back to payload bytes.
//!
//! Each incoming sample is DC-filtered, converted to its analytic form,
//! mixed down so the transmit band straddles DC, and pushed through the
//! Schmidl–Cox correlator. Correlator hits land in a `stored` slot that is
//! promoted to `staged` once per symbol window, so a sync decision can never
//! race the symbol demodulation that follows it.

use crate::buffer::SampleRing;
use crate::dsp::{BlockDc, Hilbert, Phasor};
use crate::error::{ModemError, Result};
use crate::interleave::Interleaver;
use crate::mls::{nrz, Mls};
use crate::polar::PolarDecoder;
use crate::psk::{bpsk_soft, qpsk_hard, qpsk_map, qpsk_soft};
use crate::scramble::whiten;
use crate::simplex::{simplex_decode, META_LENGTH};
use crate::sync::SchmidlCox;
use crate::{
    BASE_SUBCARRIER, BUFFER_LENGTH, CODE_LENGTH, EXTENDED_LENGTH, FILTER_LENGTH, FIRST_SUBCARRIER,
    MESG_BYTES, META_SEQUENCE_POLY, PAYLOAD_SYMBOLS, PILOT_SEQUENCE_POLY, SUBCARRIER_COUNT,
    SYMBOL_LENGTH,
};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::TAU;
use std::sync::Arc;

const FRAME_MARK: u32 = 1;

fn rx_bin(carrier: i32) -> usize {
    ((carrier + BASE_SUBCARRIER + SYMBOL_LENGTH as i32) % SYMBOL_LENGTH as i32) as usize
}

fn demod_or_erase(curr: Complex<f32>, prev: Complex<f32>) -> Complex<f32> {
    if prev.norm_sqr() <= 0.0 {
        return Complex::new(0.0, 0.0);
    }
    let cons = curr / prev;
    if cons.norm_sqr() > 4.0 {
        return Complex::new(0.0, 0.0);
    }
    cons
}

#[derive(Clone, Copy, Default)]
struct SyncEvent {
    cfo_rad: f32,
    position: i32,
    valid: bool,
}

pub struct Decoder {
    fft: Arc<dyn Fft<f32>>,
    correlator: SchmidlCox,
    block_dc: BlockDc,
    hilbert: Hilbert,
    ring: SampleRing,
    band_shift: Phasor,
    osc: Phasor,
    interleaver: Interleaver,
    polar: PolarDecoder,
    buf: Vec<Complex<f32>>,
    temp: Vec<Complex<f32>>,
    prev: [Complex<f32>; SUBCARRIER_COUNT],
    cons: [Complex<f32>; SUBCARRIER_COUNT],
    code: Vec<i8>,
    meta: [i8; META_LENGTH],
    symbol_number: i32,
    symbol_position: i32,
    stored: SyncEvent,
    staged: SyncEvent,
    accumulated: usize,
}

impl Decoder {
    pub fn new() -> Result<Self> {
        let mut pilot = vec![Complex::new(0.0, 0.0); SYMBOL_LENGTH];
        let mut seq = Mls::new(PILOT_SEQUENCE_POLY);
        pilot[rx_bin(0)] = Complex::new(1.0, 0.0);
        for i in 1..SUBCARRIER_COUNT as i32 {
            pilot[rx_bin(i)] = pilot[rx_bin(i - 1)] * nrz(seq.next()) as f32;
        }

        let mut band_shift = Phasor::new();
        let center = FIRST_SUBCARRIER + SUBCARRIER_COUNT as i32 / 2;
        band_shift.omega(-TAU * center as f32 / SYMBOL_LENGTH as f32);

        Ok(Self {
            fft: FftPlanner::new().plan_fft_forward(SYMBOL_LENGTH),
            correlator: SchmidlCox::new(&pilot),
            block_dc: BlockDc::new(FILTER_LENGTH),
            hilbert: Hilbert::new(FILTER_LENGTH),
            ring: SampleRing::new(BUFFER_LENGTH),
            band_shift,
            osc: Phasor::new(),
            interleaver: Interleaver::new(CODE_LENGTH),
            polar: PolarDecoder::new(),
            buf: vec![Complex::new(0.0, 0.0); BUFFER_LENGTH],
            temp: vec![Complex::new(0.0, 0.0); SYMBOL_LENGTH],
            prev: [Complex::new(0.0, 0.0); SUBCARRIER_COUNT],
            cons: [Complex::new(0.0, 0.0); SUBCARRIER_COUNT],
            code: vec![0; CODE_LENGTH],
            meta: [0; META_LENGTH],
            symbol_number: PAYLOAD_SYMBOLS as i32,
            symbol_position: 0,
            stored: SyncEvent::default(),
            staged: SyncEvent::default(),
            accumulated: 0,
        })
    }

    /// Accept up to `EXTENDED_LENGTH` samples; true means `fetch` is ready.
    pub fn feed(&mut self, audio: &[f32]) -> Result<bool> {
        if audio.len() > EXTENDED_LENGTH {
            return Err(ModemError::InvalidInputSize);
        }
        for &sample in audio {
            let baseband =
                self.hilbert.process(self.block_dc.process(sample)) * self.band_shift.next();
            self.ring.push(baseband);
            if self.correlator.push(self.ring.snapshot()) {
                self.stored = SyncEvent {
                    cfo_rad: self.correlator.cfo_rad,
                    position: self.correlator.symbol_pos + self.accumulated as i32 + 1
                        - EXTENDED_LENGTH as i32,
                    valid: true,
                };
            }
            self.accumulated += 1;
            if self.accumulated == EXTENDED_LENGTH {
                self.buf.copy_from_slice(self.ring.snapshot());
            }
        }
        if self.accumulated >= EXTENDED_LENGTH {
            self.accumulated -= EXTENDED_LENGTH;
            if self.stored.valid {
                self.staged = self.stored;
                self.stored.valid = false;
            }
            return Ok(self.process());
        }
        Ok(false)
    }

    /// Deinterleave, polar list-decode, unwhiten. Returns the flip count.
    pub fn fetch(&mut self, payload: &mut [u8]) -> Result<u32> {
        if payload.len() != MESG_BYTES {
            return Err(ModemError::InvalidInputSize);
        }
        self.interleaver.unshuffle(&mut self.code);
        match self.polar.decode(payload, &self.code) {
            Some(flips) => {
                whiten(payload);
                Ok(flips)
            }
            None => Err(ModemError::DecodeFailure),
        }
    }

    fn process(&mut self) -> bool {
        if self.staged.valid {
            self.staged.valid = false;
            let position = self.staged.position;
            let in_window = position >= 0
                && position as usize + EXTENDED_LENGTH + SYMBOL_LENGTH <= BUFFER_LENGTH;
            if in_window && self.preamble() == FRAME_MARK {
                self.osc.omega(-self.staged.cfo_rad);
                self.symbol_position = position;
                self.symbol_number = -1;
                return false;
            }
        }
        let mut fetch_ready = false;
        if self.symbol_number < PAYLOAD_SYMBOLS as i32 {
            let base = self.symbol_position as usize;
            for i in 0..EXTENDED_LENGTH {
                let rotated = self.buf[base + i] * self.osc.next();
                if i < SYMBOL_LENGTH {
                    self.temp[i] = rotated;
                }
            }
            self.fft.process(&mut self.temp);
            if self.symbol_number >= 0 {
                for i in 0..SUBCARRIER_COUNT {
                    self.cons[i] = demod_or_erase(self.temp[rx_bin(i as i32)], self.prev[i]);
                }
                self.demap();
            }
            self.symbol_number += 1;
            if self.symbol_number == PAYLOAD_SYMBOLS as i32 {
                fetch_ready = true;
            }
            for i in 0..SUBCARRIER_COUNT {
                self.prev[i] = self.temp[rx_bin(i as i32)];
            }
        }
        fetch_ready
    }

    fn preamble(&mut self) -> u32 {
        let mut nco = Phasor::new();
        nco.omega(-self.staged.cfo_rad);
        let base = self.staged.position as usize + EXTENDED_LENGTH;
        for (i, value) in self.temp.iter_mut().enumerate() {
            *value = self.buf[base + i] * nco.next();
        }
        self.fft.process(&mut self.temp);
        for i in 0..META_LENGTH {
            self.cons[i] =
                demod_or_erase(self.temp[rx_bin(i as i32 + 1)], self.temp[rx_bin(i as i32)]);
        }
        let mut seq = Mls::new(META_SEQUENCE_POLY);
        for i in 0..META_LENGTH {
            bpsk_soft(&mut self.meta[i], self.cons[i], 8.0);
            self.meta[i] *= nrz(seq.next()) as i8;
        }
        simplex_decode(&self.meta)
    }

    /// Per-symbol signal-over-noise estimate from hard-decision residuals;
    /// this is the only adaptive scale on the soft bits.
    fn precision(&self) -> f32 {
        let mut signal = 0.0;
        let mut noise = 0.0;
        for &cons in &self.cons {
            let mut hard = [0i8; 2];
            qpsk_hard(&mut hard, cons);
            let ideal = qpsk_map(&hard);
            signal += ideal.norm_sqr();
            noise += (cons - ideal).norm_sqr();
        }
        signal / noise
    }

    fn demap(&mut self) {
        let precision = self.precision();
        for i in 0..SUBCARRIER_COUNT {
            let offset = 2 * (self.symbol_number as usize * SUBCARRIER_COUNT + i);
            qpsk_soft(&mut self.code[offset..offset + 2], self.cons[i], precision);
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new().unwrap()
    }
}

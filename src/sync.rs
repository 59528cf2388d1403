//! Schmidl–Cox synchronisation.
//!
//! The training pair is one pilot symbol transmitted twice back to back, so
//! a lag-256 delay correlator produces a triangular timing metric whose apex
//! sits on the second copy. A Schmitt trigger rides the metric plateau; on
//! the falling edge the latched peak is refined by correlating the
//! differential spectrum of the candidate symbol against the known pilot
//! differential, which yields the integer CFO bin and the residual sample
//! offset. `M(d) = |P(d)|²/R(d)²` follows Schmidl & Cox (1997).

use crate::dsp::{Delay, Phasor, SchmittTrigger, SlidingSum};
use crate::{GUARD_LENGTH, SEARCH_POSITION, SYMBOL_LENGTH};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::{PI, TAU};
use std::sync::Arc;

const MATCH_LENGTH: usize = GUARD_LENGTH | 1;
const MATCH_DELAY: usize = (MATCH_LENGTH - 1) / 2;

pub struct SchmidlCox {
    fwd: Arc<dyn Fft<f32>>,
    bwd: Arc<dyn Fft<f32>>,
    kernel: Vec<Complex<f32>>,
    cor: SlidingSum<Complex<f32>>,
    pwr: SlidingSum<f32>,
    matcher: SlidingSum<f32>,
    phase_delay: Delay,
    trigger: SchmittTrigger,
    collect: bool,
    timing_max: f32,
    phase_max: f32,
    index_max: usize,
    temp: Vec<Complex<f32>>,
    diff: Vec<Complex<f32>>,
    pub symbol_pos: i32,
    pub cfo_rad: f32,
}

impl SchmidlCox {
    /// `reference` is the frequency-domain pilot symbol, full FFT length.
    pub fn new(reference: &[Complex<f32>]) -> Self {
        assert_eq!(reference.len(), SYMBOL_LENGTH);
        let mut planner = FftPlanner::new();
        let fwd = planner.plan_fft_forward(SYMBOL_LENGTH);
        let bwd = planner.plan_fft_inverse(SYMBOL_LENGTH);

        let mut kernel: Vec<Complex<f32>> = (0..SYMBOL_LENGTH)
            .map(|k| reference[(k + 1) % SYMBOL_LENGTH] * reference[k].conj())
            .collect();
        fwd.process(&mut kernel);
        for value in kernel.iter_mut() {
            *value = value.conj() / SYMBOL_LENGTH as f32;
        }

        Self {
            fwd,
            bwd,
            kernel,
            cor: SlidingSum::new(SYMBOL_LENGTH),
            pwr: SlidingSum::new(SYMBOL_LENGTH),
            matcher: SlidingSum::new(MATCH_LENGTH),
            phase_delay: Delay::new(MATCH_DELAY),
            trigger: SchmittTrigger::new(0.17 * MATCH_LENGTH as f32, 0.19 * MATCH_LENGTH as f32),
            collect: false,
            timing_max: 0.0,
            phase_max: 0.0,
            index_max: 0,
            temp: vec![Complex::new(0.0, 0.0); SYMBOL_LENGTH],
            diff: vec![Complex::new(0.0, 0.0); SYMBOL_LENGTH],
            symbol_pos: SEARCH_POSITION as i32,
            cfo_rad: 0.0,
        }
    }

    /// Advance the correlator by the newest sample; `window` is the ring
    /// snapshot ending at that sample. Returns true when a training pair has
    /// been confirmed, with `symbol_pos` and `cfo_rad` updated.
    pub fn push(&mut self, window: &[Complex<f32>]) -> bool {
        let early = window[SEARCH_POSITION];
        let late = window[SEARCH_POSITION + SYMBOL_LENGTH];
        let p = self.cor.push(late * early.conj());
        let r = self.pwr.push(late.norm_sqr());
        let min_r = 1e-4 * SYMBOL_LENGTH as f32;
        let r = r.max(min_r);
        let timing = self.matcher.push(p.norm_sqr() / (r * r));
        let phase = self.phase_delay.push(p.arg());

        let collect = self.trigger.push(timing);
        let process = self.collect && !collect;
        self.collect = collect;

        if collect {
            if self.timing_max < timing {
                self.timing_max = timing;
                self.phase_max = phase;
                self.index_max = MATCH_DELAY;
            } else if self.index_max < SEARCH_POSITION - SYMBOL_LENGTH {
                self.index_max += 1;
            }
        }
        if !process {
            return false;
        }

        let test_pos = SEARCH_POSITION - self.index_max;
        let frac_cfo = self.phase_max / SYMBOL_LENGTH as f32;
        self.timing_max = 0.0;
        self.index_max = 0;

        let mut osc = Phasor::new();
        osc.omega(-frac_cfo);
        for (i, value) in self.temp.iter_mut().enumerate() {
            *value = window[test_pos + i] * osc.next();
        }
        self.fwd.process(&mut self.temp);
        for (k, value) in self.diff.iter_mut().enumerate() {
            *value = self.temp[(k + 1) % SYMBOL_LENGTH] * self.temp[k].conj();
        }
        self.fwd.process(&mut self.diff);
        for (value, kernel) in self.diff.iter_mut().zip(&self.kernel) {
            *value *= *kernel;
        }
        self.bwd.process(&mut self.diff);

        let mut shift = 0;
        let mut peak = 0.0;
        let mut next = 0.0;
        for (s, value) in self.diff.iter().enumerate() {
            let power = value.norm_sqr();
            if power > peak {
                next = peak;
                peak = power;
                shift = s;
            } else if power > next {
                next = power;
            }
        }
        if peak <= 4.0 * next {
            return false;
        }

        let pos_err =
            (self.diff[shift].arg() * SYMBOL_LENGTH as f32 / TAU).round() as i32;
        if pos_err.unsigned_abs() as usize > GUARD_LENGTH / 2 {
            return false;
        }
        self.symbol_pos = test_pos as i32 - pos_err;

        let mut cfo = TAU * shift as f32 / SYMBOL_LENGTH as f32 + frac_cfo;
        if cfo >= PI {
            cfo -= TAU;
        }
        self.cfo_rad = cfo;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleRing;
    use crate::mls::{nrz, Mls};
    use crate::{BUFFER_LENGTH, SUBCARRIER_COUNT};

    fn baseband_bin(carrier: i32) -> usize {
        let center = SUBCARRIER_COUNT as i32 / 2;
        ((carrier - center + SYMBOL_LENGTH as i32) % SYMBOL_LENGTH as i32) as usize
    }

    fn pilot_spectrum() -> Vec<Complex<f32>> {
        let mut seq = Mls::new(0b1100111);
        let mut freq = vec![Complex::new(0.0, 0.0); SYMBOL_LENGTH];
        freq[baseband_bin(0)] = Complex::new(1.0, 0.0);
        for i in 1..SUBCARRIER_COUNT as i32 {
            freq[baseband_bin(i)] = freq[baseband_bin(i - 1)] * nrz(seq.next()) as f32;
        }
        freq
    }

    fn pilot_time() -> Vec<Complex<f32>> {
        let mut time = pilot_spectrum();
        FftPlanner::new()
            .plan_fft_inverse(SYMBOL_LENGTH)
            .process(&mut time);
        for value in time.iter_mut() {
            *value /= SYMBOL_LENGTH as f32;
        }
        time
    }

    fn detect(stream: &[Complex<f32>]) -> Option<(usize, i32, f32)> {
        let mut ring = SampleRing::new(BUFFER_LENGTH);
        let mut correlator = SchmidlCox::new(&pilot_spectrum());
        for (n, &sample) in stream.iter().enumerate() {
            ring.push(sample);
            if correlator.push(ring.snapshot()) {
                return Some((n, correlator.symbol_pos, correlator.cfo_rad));
            }
        }
        None
    }

    fn training_stream() -> (Vec<Complex<f32>>, usize) {
        let symbol = pilot_time();
        let mut stream = vec![Complex::new(0.0, 0.0); 700];
        stream.extend_from_slice(&symbol);
        let second_start = stream.len();
        stream.extend_from_slice(&symbol);
        stream.extend(vec![Complex::new(0.0, 0.0); 1200]);
        (stream, second_start)
    }

    #[test]
    fn test_detects_training_pair() {
        let (stream, second_start) = training_stream();
        let (hit, symbol_pos, cfo_rad) =
            detect(&stream).expect("training pair not detected");
        // translate the reported window index to a stream position
        let found = hit as i32 + 1 + symbol_pos - BUFFER_LENGTH as i32;
        assert!(
            (found - second_start as i32).abs() <= 2,
            "position {found} vs {second_start}"
        );
        assert!(cfo_rad.abs() < 1e-2, "cfo {cfo_rad}");
    }

    #[test]
    fn test_estimates_cfo() {
        let (mut stream, _) = training_stream();
        let omega = TAU * 5.0 / 8000.0;
        for (n, sample) in stream.iter_mut().enumerate() {
            *sample *= Complex::new((omega * n as f32).cos(), (omega * n as f32).sin());
        }
        let (_, _, cfo_rad) = detect(&stream).expect("no detection under CFO");
        assert!(
            (cfo_rad - omega).abs() < 0.1 * omega,
            "cfo {cfo_rad} vs {omega}"
        );
    }

    #[test]
    fn test_ignores_noise() {
        let mut state = 0x2545f491u32;
        let stream: Vec<Complex<f32>> = (0..8000)
            .map(|_| {
                let mut uniform = || {
                    state = state.wrapping_mul(1103515245).wrapping_add(12345);
                    (state >> 16) as f32 / 65535.0 - 0.5
                };
                Complex::new(uniform(), uniform())
            })
            .collect();
        assert!(detect(&stream).is_none());
    }

    #[test]
    fn test_ignores_single_symbol() {
        let symbol = pilot_time();
        let mut stream = vec![Complex::new(0.0, 0.0); 700];
        stream.extend_from_slice(&symbol);
        stream.extend(vec![Complex::new(0.0, 0.0); 1500]);
        assert!(detect(&stream).is_none());
    }
}

//! Streaming DSP primitives for the sample-by-sample receive path.

use rustfft::num_complex::Complex;
use std::f32::consts::PI;
use std::ops::{Add, Sub};

/// Moving-average DC remover: subtracts the mean of the last `len` samples.
pub struct BlockDc {
    history: Vec<f32>,
    sum: f32,
    pos: usize,
}

impl BlockDc {
    pub fn new(len: usize) -> Self {
        Self {
            history: vec![0.0; len],
            sum: 0.0,
            pos: 0,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        self.sum += input - self.history[self.pos];
        self.history[self.pos] = input;
        self.pos += 1;
        if self.pos == self.history.len() {
            self.pos = 0;
            // refresh the running sum so float error cannot accumulate
            self.sum = self.history.iter().sum();
        }
        input - self.sum / self.history.len() as f32
    }
}

/// FIR Hilbert transformer producing the analytic signal.
///
/// The real output is the input delayed by the group delay, the imaginary
/// output is the Blackman-windowed Hilbert FIR.
pub struct Hilbert {
    taps: Vec<f32>,
    history: Vec<f32>,
    delay: usize,
    pos: usize,
}

impl Hilbert {
    pub fn new(num_taps: usize) -> Self {
        assert!(num_taps % 2 == 1, "Hilbert filter needs odd length");
        let m = num_taps / 2;
        let mut taps = vec![0.0; num_taps];
        for (i, tap) in taps.iter_mut().enumerate() {
            let k = i as isize - m as isize;
            if k % 2 != 0 {
                let x = i as f32 / (num_taps - 1) as f32;
                let window = 0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos();
                *tap = window * 2.0 / (PI * k as f32);
            }
        }
        Self {
            taps,
            history: vec![0.0; num_taps],
            delay: m,
            pos: 0,
        }
    }

    pub fn process(&mut self, input: f32) -> Complex<f32> {
        let len = self.history.len();
        self.history[self.pos] = input;
        let mut im = 0.0;
        for (i, &tap) in self.taps.iter().enumerate() {
            if tap != 0.0 {
                im += tap * self.history[(self.pos + len - i) % len];
            }
        }
        let re = self.history[(self.pos + len - self.delay) % len];
        self.pos = (self.pos + 1) % len;
        Complex::new(re, im)
    }
}

/// Numerically-controlled oscillator emitting `exp(j·omega·n)`.
pub struct Phasor {
    value: Complex<f32>,
    delta: Complex<f32>,
}

impl Phasor {
    pub fn new() -> Self {
        Self {
            value: Complex::new(1.0, 0.0),
            delta: Complex::new(1.0, 0.0),
        }
    }

    pub fn omega(&mut self, omega: f32) {
        self.value = Complex::new(1.0, 0.0);
        self.delta = Complex::new(omega.cos(), omega.sin());
    }

    pub fn next(&mut self) -> Complex<f32> {
        let current = self.value;
        self.value *= self.delta;
        self.value /= self.value.norm();
        current
    }
}

impl Default for Phasor {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding-window sum over the last `len` pushed values.
pub struct SlidingSum<T> {
    history: Vec<T>,
    sum: T,
    pos: usize,
}

impl<T> SlidingSum<T>
where
    T: Copy + Default + Add<Output = T> + Sub<Output = T>,
{
    pub fn new(len: usize) -> Self {
        Self {
            history: vec![T::default(); len],
            sum: T::default(),
            pos: 0,
        }
    }

    pub fn push(&mut self, input: T) -> T {
        self.sum = self.sum + input - self.history[self.pos];
        self.history[self.pos] = input;
        self.pos += 1;
        if self.pos == self.history.len() {
            self.pos = 0;
            self.sum = self
                .history
                .iter()
                .fold(T::default(), |acc, &v| acc + v);
        }
        self.sum
    }
}

/// Fixed-length delay line.
pub struct Delay {
    history: Vec<f32>,
    pos: usize,
}

impl Delay {
    pub fn new(len: usize) -> Self {
        Self {
            history: vec![0.0; len],
            pos: 0,
        }
    }

    pub fn push(&mut self, input: f32) -> f32 {
        let output = self.history[self.pos];
        self.history[self.pos] = input;
        self.pos = (self.pos + 1) % self.history.len();
        output
    }
}

/// Hysteresis comparator: engages above `high`, releases below `low`.
pub struct SchmittTrigger {
    low: f32,
    high: f32,
    state: bool,
}

impl SchmittTrigger {
    pub fn new(low: f32, high: f32) -> Self {
        Self {
            low,
            high,
            state: false,
        }
    }

    pub fn push(&mut self, input: f32) -> bool {
        if self.state {
            if input < self.low {
                self.state = false;
            }
        } else if input > self.high {
            self.state = true;
        }
        self.state
    }
}

//! Receive-side sample ring with a contiguous read window.
//!
//! Every sample is written twice, one capacity apart, so the last
//! `capacity` samples are always readable as one slice in arrival order.

use rustfft::num_complex::Complex;

pub struct SampleRing {
    data: Vec<Complex<f32>>,
    capacity: usize,
    pos: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![Complex::new(0.0, 0.0); 2 * capacity],
            capacity,
            pos: 0,
        }
    }

    pub fn push(&mut self, sample: Complex<f32>) {
        self.data[self.pos] = sample;
        self.data[self.pos + self.capacity] = sample;
        self.pos += 1;
        if self.pos == self.capacity {
            self.pos = 0;
        }
    }

    /// The last `capacity` samples, oldest first, ending at the newest push.
    pub fn snapshot(&self) -> &[Complex<f32>] {
        &self.data[self.pos..self.pos + self.capacity]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Complex<f32> {
        Complex::new(n as f32, -(n as f32))
    }

    #[test]
    fn test_window_is_chronological() {
        let mut ring = SampleRing::new(8);
        for n in 0..29 {
            ring.push(sample(n));
        }
        let window = ring.snapshot();
        assert_eq!(window.len(), 8);
        for (k, &value) in window.iter().enumerate() {
            assert_eq!(value, sample(21 + k));
        }
    }

    #[test]
    fn test_window_before_full() {
        let mut ring = SampleRing::new(4);
        ring.push(sample(1));
        let window = ring.snapshot();
        assert_eq!(window[3], sample(1));
        assert_eq!(window[0], Complex::new(0.0, 0.0));
    }

    #[test]
    fn test_newest_always_last() {
        let mut ring = SampleRing::new(5);
        for n in 0..100 {
            ring.push(sample(n));
            assert_eq!(*ring.snapshot().last().unwrap(), sample(n));
        }
    }
}

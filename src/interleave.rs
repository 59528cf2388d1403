//! Fisher–Yates interleaver with a deterministic seed.
//!
//! The swap targets are recorded once at construction; replaying them
//! backwards undoes the permutation exactly.

use crate::scramble::Xorshift32;

pub struct Interleaver {
    targets: Vec<usize>,
}

impl Interleaver {
    pub fn new(len: usize) -> Self {
        let mut prng = Xorshift32::new();
        let targets = (0..len - 1)
            .map(|i| i + prng.next() as usize % (len - i))
            .collect();
        Self { targets }
    }

    pub fn shuffle(&self, data: &mut [i8]) {
        for (i, &j) in self.targets.iter().enumerate() {
            data.swap(i, j);
        }
    }

    pub fn unshuffle(&self, data: &mut [i8]) {
        for (i, &j) in self.targets.iter().enumerate().rev() {
            data.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bijection() {
        let interleaver = Interleaver::new(4096);
        let identity: Vec<i8> = (0..4096).map(|i| (i % 251) as i8).collect();
        let mut data = identity.clone();
        interleaver.shuffle(&mut data);
        assert_ne!(data, identity);
        interleaver.unshuffle(&mut data);
        assert_eq!(data, identity);
    }

    #[test]
    fn test_moves_most_positions() {
        let interleaver = Interleaver::new(4096);
        let mut data: Vec<i8> = (0..4096).map(|i| (i % 127) as i8).collect();
        let before = data.clone();
        interleaver.shuffle(&mut data);
        let fixed = data.iter().zip(&before).filter(|(a, b)| a == b).count();
        assert!(fixed < 200, "{fixed} positions unmoved");
    }

    #[test]
    fn test_deterministic() {
        let a = Interleaver::new(256);
        let b = Interleaver::new(256);
        assert_eq!(a.targets, b.targets);
    }
}

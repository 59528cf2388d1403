//! Payload whitening with a fixed-seed Xorshift32 stream.
//!
//! Both sides run the identical generator, so applying the whitener twice
//! restores the original bytes. The interleaver drives its own instance.

/// Marsaglia's 13/17/5 xorshift generator.
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    pub fn new() -> Self {
        Self { state: 2463534242 }
    }

    pub fn next(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }
}

impl Default for Xorshift32 {
    fn default() -> Self {
        Self::new()
    }
}

/// XOR each byte with the low byte of successive generator outputs.
pub fn whiten(data: &mut [u8]) {
    let mut prng = Xorshift32::new();
    for byte in data.iter_mut() {
        *byte ^= prng.next() as u8;
    }
}

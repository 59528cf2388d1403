//! Successive-cancellation list decoding for polar codes.
//!
//! LLRs are int8 throughout (negative = bit 1), path metrics are i32 sums of
//! penalised magnitudes. The list width is a plain constant; any width gives
//! a correct decoder, wider lists just survive deeper noise.

pub const LIST_SIZE: usize = 16;

pub fn frozen_bit(frozen: &[u32], index: usize) -> bool {
    (frozen[index / 32] >> (index % 32)) & 1 != 0
}

fn f_llr(a: i8, b: i8) -> i8 {
    let magnitude = (a as i32).abs().min((b as i32).abs());
    if (a < 0) != (b < 0) {
        -magnitude as i8
    } else {
        magnitude as i8
    }
}

fn g_llr(a: i8, b: i8, bit: u8) -> i8 {
    let sum = if bit != 0 {
        b as i32 - a as i32
    } else {
        b as i32 + a as i32
    };
    sum.clamp(-127, 127) as i8
}

#[derive(Clone)]
struct Path {
    metric: i32,
    // alpha[d] holds the LLRs entering depth d; alpha[order] is the channel
    alpha: Vec<Vec<i8>>,
    // beta[d] holds combined hard bits leaving depth d
    beta: Vec<Vec<u8>>,
    hard: Vec<u8>,
}

impl Path {
    fn new(order: usize, code: &[i8]) -> Self {
        let mut alpha: Vec<Vec<i8>> = (0..=order).map(|d| vec![0; 1 << d]).collect();
        alpha[order].copy_from_slice(code);
        Self {
            metric: 0,
            alpha,
            beta: (0..=order).map(|d| vec![0; 1 << d]).collect(),
            hard: vec![0; 1 << order],
        }
    }
}

pub struct Candidate {
    pub metric: i32,
    /// u-domain hard decisions, frozen positions included.
    pub hard: Vec<u8>,
}

pub struct PolarListDecoder {
    order: usize,
}

impl PolarListDecoder {
    pub fn new(order: usize) -> Self {
        Self { order }
    }

    /// Decode `code` into up to `LIST_SIZE` candidates, best metric first.
    pub fn decode(&self, code: &[i8], frozen: &[u32]) -> Vec<Candidate> {
        assert_eq!(code.len(), 1 << self.order);
        let mut paths = vec![Path::new(self.order, code)];
        self.recurse(self.order, 0, &mut paths, frozen);
        paths.sort_by_key(|path| path.metric);
        paths
            .into_iter()
            .map(|path| Candidate {
                metric: path.metric,
                hard: path.hard,
            })
            .collect()
    }

    fn recurse(&self, depth: usize, base: usize, paths: &mut Vec<Path>, frozen: &[u32]) {
        if depth == 0 {
            self.decide(base, paths, frozen);
            return;
        }
        let half = 1 << (depth - 1);

        for path in paths.iter_mut() {
            let (low, high) = path.alpha.split_at_mut(depth);
            for j in 0..half {
                low[depth - 1][j] = f_llr(high[0][j], high[0][j + half]);
            }
        }
        self.recurse(depth - 1, base, paths, frozen);

        for path in paths.iter_mut() {
            let (left, rest) = path.beta.split_at_mut(depth);
            rest[0][..half].copy_from_slice(&left[depth - 1]);
            let (low, high) = path.alpha.split_at_mut(depth);
            for j in 0..half {
                low[depth - 1][j] = g_llr(high[0][j], high[0][j + half], rest[0][j]);
            }
        }
        self.recurse(depth - 1, base + half, paths, frozen);

        for path in paths.iter_mut() {
            let (left, rest) = path.beta.split_at_mut(depth);
            for j in 0..half {
                let right = left[depth - 1][j];
                rest[0][j] ^= right;
                rest[0][j + half] = right;
            }
        }
    }

    fn decide(&self, index: usize, paths: &mut Vec<Path>, frozen: &[u32]) {
        if frozen_bit(frozen, index) {
            for path in paths.iter_mut() {
                let llr = path.alpha[0][0];
                if llr < 0 {
                    path.metric += -(llr as i32);
                }
                path.hard[index] = 0;
                path.beta[0][0] = 0;
            }
            return;
        }

        let mut forks: Vec<(i32, usize, u8)> = Vec::with_capacity(2 * paths.len());
        for (parent, path) in paths.iter().enumerate() {
            let llr = path.alpha[0][0] as i32;
            forks.push((path.metric + if llr < 0 { -llr } else { 0 }, parent, 0));
            forks.push((path.metric + if llr > 0 { llr } else { 0 }, parent, 1));
        }
        if forks.len() > LIST_SIZE {
            forks.sort();
            forks.truncate(LIST_SIZE);
        }

        let mut remaining = vec![0usize; paths.len()];
        for &(_, parent, _) in &forks {
            remaining[parent] += 1;
        }
        let mut pool: Vec<Option<Path>> = paths.drain(..).map(Some).collect();
        let mut survivors = Vec::with_capacity(forks.len());
        for (metric, parent, bit) in forks {
            remaining[parent] -= 1;
            let mut path = if remaining[parent] == 0 {
                pool[parent].take().expect("fork parent consumed twice")
            } else {
                pool[parent].clone().expect("fork parent consumed twice")
            };
            path.metric = metric;
            path.hard[index] = bit;
            path.beta[0][0] = bit;
            survivors.push(path);
        }
        *paths = survivors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // u-domain to codeword, XOR butterflies
    fn transform(bits: &mut [u8]) {
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

    fn encode(order: usize, frozen: &[u32], info: &[u8]) -> Vec<u8> {
        let mut u = vec![0u8; 1 << order];
        let mut next = 0;
        for (i, value) in u.iter_mut().enumerate() {
            if !frozen_bit(frozen, i) {
                *value = info[next];
                next += 1;
            }
        }
        transform(&mut u);
        u
    }

    #[test]
    fn test_clean_decode_order_4() {
        // freeze the 8 least reliable positions of a length-16 code
        let frozen = [0b0000_0001_0111_1111_u32];
        let info = [1u8, 0, 1, 1, 0, 1, 0, 0];
        let codeword = encode(4, &frozen, &info);
        let llrs: Vec<i8> = codeword.iter().map(|&b| if b != 0 { -96 } else { 96 }).collect();

        let decoder = PolarListDecoder::new(4);
        let candidates = decoder.decode(&llrs, &frozen);
        assert_eq!(candidates[0].metric, 0);
        let mut u = vec![0u8; 16];
        let mut next = 0;
        for (i, value) in u.iter_mut().enumerate() {
            if !frozen_bit(&frozen, i) {
                *value = info[next];
                next += 1;
            }
        }
        assert_eq!(candidates[0].hard, u);
    }

    #[test]
    fn test_erasures_keep_codeword_in_list() {
        let frozen = [0b0000_0011_0111_1111_u32];
        let info = [1u8, 1, 0, 1, 0, 0, 1];
        let codeword = encode(4, &frozen, &info);
        let mut llrs: Vec<i8> = codeword.iter().map(|&b| if b != 0 { -64 } else { 64 }).collect();
        llrs[3] = 0;
        llrs[9] = 0;

        let decoder = PolarListDecoder::new(4);
        let candidates = decoder.decode(&llrs, &frozen);
        let expected: Vec<u8> = {
            let mut u = vec![0u8; 16];
            let mut next = 0;
            for (i, value) in u.iter_mut().enumerate() {
                if !frozen_bit(&frozen, i) {
                    *value = info[next];
                    next += 1;
                }
            }
            u
        };
        assert!(candidates.iter().any(|c| c.hard == expected));
    }

    #[test]
    fn test_list_width_bounded() {
        let frozen = [0u32; 2];
        let llrs = vec![0i8; 64];
        let decoder = PolarListDecoder::new(6);
        let candidates = decoder.decode(&llrs, &frozen);
        assert!(candidates.len() <= LIST_SIZE);
    }

    #[test]
    fn test_metrics_sorted() {
        let frozen = [0b0000_0000_1111_1111_u32];
        let mut llrs = vec![40i8; 16];
        llrs[5] = -10;
        llrs[11] = -3;
        let decoder = PolarListDecoder::new(4);
        let candidates = decoder.decode(&llrs, &frozen);
        for pair in candidates.windows(2) {
            assert!(pair[0].metric <= pair[1].metric);
        }
    }
}

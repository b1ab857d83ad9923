/// Continuous health tests over the raw chaos samples, modeled on the
/// SP 800-90B repetition-count and adaptive-proportion tests, plus an
/// on-demand Shannon check for conditioned output.
use std::collections::{HashMap, VecDeque};

/// Consecutive identical raw samples tolerated before the source is
/// declared failed. A healthy trajectory repeats at most once or twice.
pub const REPETITION_CUTOFF: usize = 5;

/// Sliding window for the adaptive-proportion test.
pub const PROPORTION_WINDOW: usize = 512;

/// Maximum occurrences of any single 16-bit symbol within the window.
pub const PROPORTION_CUTOFF: usize = 16;

/// Minimum Shannon entropy (bits/byte) for conditioned output.
pub const MIN_CONDITIONED_ENTROPY: f64 = 7.99;

/// Tracks the raw sample stream; `observe` returns false the moment either
/// continuous test fails.
pub struct HealthMonitor {
    last: Option<u16>,
    run_length: usize,
    window: VecDeque<u16>,
    counts: HashMap<u16, usize>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            last: None,
            run_length: 0,
            window: VecDeque::with_capacity(PROPORTION_WINDOW),
            counts: HashMap::new(),
        }
    }

    pub fn observe(&mut self, sample: u16) -> bool {
        // Repetition count.
        if self.last == Some(sample) {
            self.run_length += 1;
        } else {
            self.last = Some(sample);
            self.run_length = 1;
        }
        if self.run_length >= REPETITION_CUTOFF {
            return false;
        }

        // Adaptive proportion over the sliding window.
        if self.window.len() == PROPORTION_WINDOW {
            if let Some(evicted) = self.window.pop_front() {
                if let Some(count) = self.counts.get_mut(&evicted) {
                    *count -= 1;
                    if *count == 0 {
                        self.counts.remove(&evicted);
                    }
                }
            }
        }
        self.window.push_back(sample);
        let count = self.counts.entry(sample).or_insert(0);
        *count += 1;
        *count <= PROPORTION_CUTOFF
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.run_length = 0;
        self.window.clear();
        self.counts.clear();
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Shannon entropy of a byte string, in bits per byte.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut freq = [0usize; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }
    let total = data.len() as f64;
    let mut entropy = 0.0;
    for &count in freq.iter() {
        if count > 0 {
            let p = count as f64 / total;
            entropy -= p * p.log2();
        }
    }
    entropy
}

/// Chaos-seeded, SHA3-conditioned entropy source.
///
/// Seeding combines OS randomness, the wall clock, and optional external
/// entropy through SHA3-512 into the initial state of the chaotic system.
/// Raw 16-bit samples accumulate in a 1 KiB pool and pass the continuous
/// health tests; output is produced by hashing successive non-overlapping
/// pool windows with SHA3-512. Once a health test fails, the source is
/// Unhealthy and every consumer gets `EntropyUnavailable` until `reset`.
pub mod chaos;
pub mod health;

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;

use self::chaos::ChaosSystem;
use self::health::{shannon_entropy, HealthMonitor, MIN_CONDITIONED_ENTROPY};
use crate::crypto::hash;
use crate::error::{CipherError, Result};

/// Raw sample pool size.
pub const RAW_POOL_LEN: usize = 1024;

/// Bytes of raw pool hashed per conditioned block; also the window stride,
/// so windows never overlap.
const CONDITION_WINDOW: usize = 128;

const CONDITIONED_LEN: usize = hash::DIGEST_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

pub struct EntropySource {
    system: ChaosSystem,
    monitor: HealthMonitor,
    pool: [u8; RAW_POOL_LEN],
    window_offset: usize,
    conditioned: [u8; CONDITIONED_LEN],
    conditioned_used: usize,
    healthy: bool,
}

impl EntropySource {
    pub fn new() -> Self {
        Self::with_seed_material(&[])
    }

    /// Create a source whose seed additionally mixes in caller-supplied
    /// entropy.
    pub fn with_seed_material(extra: &[u8]) -> Self {
        Self {
            system: seed_system(extra),
            monitor: HealthMonitor::new(),
            pool: [0u8; RAW_POOL_LEN],
            // Consumed positions force a refill / recondition on first use.
            window_offset: RAW_POOL_LEN,
            conditioned: [0u8; CONDITIONED_LEN],
            conditioned_used: CONDITIONED_LEN,
            healthy: true,
        }
    }

    /// Produce `dst.len()` bytes of conditioned output.
    pub fn fill(&mut self, dst: &mut [u8]) -> Result<()> {
        if !self.healthy {
            return Err(CipherError::EntropyUnavailable);
        }
        let mut written = 0;
        while written < dst.len() {
            if self.conditioned_used == CONDITIONED_LEN {
                self.recondition()?;
            }
            let take = (dst.len() - written).min(CONDITIONED_LEN - self.conditioned_used);
            dst[written..written + take]
                .copy_from_slice(&self.conditioned[self.conditioned_used..self.conditioned_used + take]);
            self.conditioned_used += take;
            written += take;
        }
        Ok(())
    }

    pub fn health_status(&self) -> HealthStatus {
        if self.healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// Reseed and clear the health state. The only recovery path once a
    /// health test has failed.
    pub fn reset(&mut self) {
        self.reset_with(&[]);
    }

    pub fn reset_with(&mut self, extra: &[u8]) {
        self.system = seed_system(extra);
        self.monitor.reset();
        self.window_offset = RAW_POOL_LEN;
        self.conditioned_used = CONDITIONED_LEN;
        self.healthy = true;
    }

    /// On-demand Shannon check over `sample_len` bytes of fresh conditioned
    /// output. Marks the source Unhealthy when the measured entropy falls
    /// below the acceptance threshold.
    pub fn entropy_check(&mut self, sample_len: usize) -> Result<f64> {
        let mut buffer = vec![0u8; sample_len];
        self.fill(&mut buffer)?;
        let bits_per_byte = shannon_entropy(&buffer);
        if bits_per_byte < MIN_CONDITIONED_ENTROPY {
            warn!(bits_per_byte, "conditioned output failed the entropy check");
            self.healthy = false;
            return Err(CipherError::EntropyUnavailable);
        }
        Ok(bits_per_byte)
    }

    fn recondition(&mut self) -> Result<()> {
        if self.window_offset + CONDITION_WINDOW > RAW_POOL_LEN {
            self.refill_pool()?;
        }
        let window = &self.pool[self.window_offset..self.window_offset + CONDITION_WINDOW];
        self.conditioned = hash::sha3_512(window);
        self.window_offset += CONDITION_WINDOW;
        self.conditioned_used = 0;
        Ok(())
    }

    fn refill_pool(&mut self) -> Result<()> {
        let mut offset = 0;
        while offset < RAW_POOL_LEN {
            for word in self.system.sample() {
                if !self.monitor.observe(word) {
                    self.healthy = false;
                    warn!("raw sample health test failed; entropy source marked unhealthy");
                    return Err(CipherError::EntropyUnavailable);
                }
                self.pool[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
                offset += 2;
            }
        }
        self.window_offset = 0;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn force_unhealthy(&mut self) {
        self.healthy = false;
    }
}

impl Default for EntropySource {
    fn default() -> Self {
        Self::new()
    }
}

fn seed_system(extra: &[u8]) -> ChaosSystem {
    let mut os_random = [0u8; 64];
    OsRng.fill_bytes(&mut os_random);
    let clock = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let seed = hash::sha3_512_concat(&[&os_random, &clock.to_be_bytes(), extra]);
    ChaosSystem::from_seed(&seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_various_lengths() {
        let mut source = EntropySource::new();
        for len in [1usize, 16, 64, 100, 1000] {
            let mut buffer = vec![0u8; len];
            source.fill(&mut buffer).unwrap();
        }
    }

    #[test]
    fn test_successive_fills_differ() {
        let mut source = EntropySource::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        source.fill(&mut a).unwrap();
        source.fill(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_two_sources_differ() {
        let mut first = EntropySource::new();
        let mut second = EntropySource::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        first.fill(&mut a).unwrap();
        second.fill(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unhealthy_source_refuses_fill() {
        let mut source = EntropySource::new();
        source.force_unhealthy();
        assert_eq!(source.health_status(), HealthStatus::Unhealthy);

        let mut buffer = [0u8; 16];
        assert!(matches!(
            source.fill(&mut buffer),
            Err(CipherError::EntropyUnavailable)
        ));
    }

    #[test]
    fn test_reset_recovers() {
        let mut source = EntropySource::new();
        source.force_unhealthy();
        source.reset();
        assert_eq!(source.health_status(), HealthStatus::Healthy);

        let mut buffer = [0u8; 16];
        source.fill(&mut buffer).unwrap();
    }

    #[test]
    fn test_conditioned_output_entropy() {
        let mut source = EntropySource::new();
        let bits = source.entropy_check(1 << 20).unwrap();
        assert!(bits >= MIN_CONDITIONED_ENTROPY, "measured {bits} bits/byte");
    }

    #[test]
    fn test_seed_material_is_mixed_in() {
        let mut a = EntropySource::with_seed_material(b"site-a");
        let mut b = EntropySource::with_seed_material(b"site-b");
        let mut buf_a = [0u8; 32];
        let mut buf_b = [0u8; 32];
        a.fill(&mut buf_a).unwrap();
        b.fill(&mut buf_b).unwrap();
        assert_ne!(buf_a, buf_b);
    }
}

/// The chaotic dynamical system behind the entropy source.
///
/// Eleven state variables are integrated with fixed-step Euler: a six
/// dimensional Lorenz extension (two cross-coupled Lorenz subsystems) and a
/// five dimensional hyperchaotic subsystem. After a warm-up that escapes
/// the seeding transient, selected variables are quantized to 16-bit words.
pub const TIME_STEP: f64 = 0.01;
pub const WARMUP_STEPS: usize = 1000;

/// Words produced per integration step.
pub const WORDS_PER_STEP: usize = 4;

const SIGMA: f64 = 10.0;
const RHO: f64 = 28.0;
const BETA: f64 = 2.667;
const COUPLING: f64 = 0.1;

const HYPER_A: f64 = 10.0;
const HYPER_B: f64 = 2.667;
const HYPER_C: f64 = 28.0;
const HYPER_R: f64 = 1.0;
const HYPER_K: f64 = 0.5;

/// Quantization scale: multiplying the trajectory by this before taking the
/// fractional part spreads the fast-moving mid-order digits across the full
/// 16-bit range.
const QUANT_SCALE: f64 = 4096.0;

pub struct ChaosSystem {
    lorenz: [f64; 6],
    hyper: [f64; 5],
}

impl ChaosSystem {
    /// Initialize the state variables from a 64-byte seed, placing each
    /// within its safe range, then run the warm-up.
    pub fn from_seed(seed: &[u8; 64]) -> Self {
        let unit = |index: usize| -> f64 {
            let mut window = [0u8; 4];
            window.copy_from_slice(&seed[index * 4..index * 4 + 4]);
            u32::from_le_bytes(window) as f64 / u32::MAX as f64
        };
        let spread = |u: f64, lo: f64, hi: f64| lo + u * (hi - lo);

        let mut system = Self {
            lorenz: [
                spread(unit(0), -15.0, 15.0),
                spread(unit(1), -15.0, 15.0),
                spread(unit(2), 10.0, 40.0),
                spread(unit(3), -15.0, 15.0),
                spread(unit(4), -15.0, 15.0),
                spread(unit(5), 10.0, 40.0),
            ],
            hyper: [
                spread(unit(6), -10.0, 10.0),
                spread(unit(7), -10.0, 10.0),
                spread(unit(8), 10.0, 30.0),
                spread(unit(9), -5.0, 5.0),
                spread(unit(10), -10.0, 10.0),
            ],
        };
        for _ in 0..WARMUP_STEPS {
            system.step();
        }
        system
    }

    /// One Euler step of both subsystems.
    pub fn step(&mut self) {
        let [x1, x2, x3, x4, x5, x6] = self.lorenz;
        self.lorenz = [
            x1 + TIME_STEP * (SIGMA * (x2 - x1)),
            x2 + TIME_STEP * (x1 * (RHO - x3) - x2),
            x3 + TIME_STEP * (x1 * x2 - BETA * x3),
            x4 + TIME_STEP * (SIGMA * (x5 - x4) + COUPLING * x1),
            x5 + TIME_STEP * (x4 * (RHO - x6) - x5),
            x6 + TIME_STEP * (x4 * x5 - BETA * x6),
        ];

        let [y1, y2, y3, y4, y5] = self.hyper;
        self.hyper = [
            y1 + TIME_STEP * (HYPER_A * (y2 - y1)),
            y2 + TIME_STEP * (HYPER_C * y1 - y2 - y1 * y3 + y4),
            y3 + TIME_STEP * (y1 * y2 - HYPER_B * y3),
            y4 + TIME_STEP * (-y1 * y3 - HYPER_R * y4),
            y5 + TIME_STEP * (HYPER_K * (y1 - y5)),
        ];
    }

    /// Advance one step and quantize one variable from each corner of the
    /// state into 16-bit sample words.
    pub fn sample(&mut self) -> [u16; WORDS_PER_STEP] {
        self.step();
        [
            quantize(self.lorenz[0]),
            quantize(self.lorenz[3]),
            quantize(self.hyper[0]),
            quantize(self.hyper[3]),
        ]
    }
}

fn quantize(value: f64) -> u16 {
    ((value.abs() * QUANT_SCALE).fract() * 65536.0) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> ChaosSystem {
        let mut seed = [0u8; 64];
        for (i, b) in seed.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(97).wrapping_add(5);
        }
        ChaosSystem::from_seed(&seed)
    }

    #[test]
    fn test_trajectory_stays_bounded() {
        let mut system = seeded();
        for _ in 0..100_000 {
            system.step();
        }
        for v in system.lorenz.iter().chain(system.hyper.iter()) {
            assert!(v.is_finite());
            assert!(v.abs() < 500.0, "state escaped: {v}");
        }
    }

    #[test]
    fn test_same_seed_same_samples() {
        let mut a = seeded();
        let mut b = seeded();
        for _ in 0..100 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = seeded();
        let mut seed = [0u8; 64];
        seed[0] = 1;
        let mut b = ChaosSystem::from_seed(&seed);

        let a_samples: Vec<_> = (0..16).map(|_| a.sample()).collect();
        let b_samples: Vec<_> = (0..16).map(|_| b.sample()).collect();
        assert_ne!(a_samples, b_samples);
    }

    #[test]
    fn test_samples_are_not_constant() {
        let mut system = seeded();
        let first = system.sample();
        let mut saw_change = false;
        for _ in 0..32 {
            if system.sample() != first {
                saw_change = true;
                break;
            }
        }
        assert!(saw_change);
    }
}

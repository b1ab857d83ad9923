/// Rotation policy: scheduling and destruction parameters for key versions.
use serde::{Deserialize, Serialize};

use crate::error::{CipherError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestructionMethod {
    /// Overwrite the material with zeros.
    Zero,
    /// XOR a derived stream over the material for each pass, then zero it.
    RandomOverwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Scheduled rotation cadence; the sweep warns once a key is this old.
    pub interval_days: u32,
    /// Hard ceiling; the sweep escalates to a critical event past this age.
    pub max_age_days: u32,
    /// Rotation is refused while the active key is younger than this.
    pub min_age_days: u32,
    /// How many versions in {Active, Rotated} to keep before archiving.
    pub retention_cycles: u32,
    pub destruction_method: DestructionMethod,
    pub destruction_passes: u32,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            interval_days: 365,
            max_age_days: 400,
            min_age_days: 1,
            retention_cycles: 3,
            destruction_method: DestructionMethod::RandomOverwrite,
            destruction_passes: 3,
        }
    }
}

impl RotationPolicy {
    /// Enforce 0 < min_age <= interval < max_age, retention >= 1,
    /// passes >= 1.
    pub fn validate(&self) -> Result<()> {
        if self.min_age_days == 0 {
            return Err(CipherError::PolicyInvalid(
                "min_age_days must be positive".into(),
            ));
        }
        if self.min_age_days > self.interval_days {
            return Err(CipherError::PolicyInvalid(format!(
                "min_age_days {} exceeds interval_days {}",
                self.min_age_days, self.interval_days
            )));
        }
        if self.interval_days >= self.max_age_days {
            return Err(CipherError::PolicyInvalid(format!(
                "interval_days {} must be below max_age_days {}",
                self.interval_days, self.max_age_days
            )));
        }
        if self.retention_cycles == 0 {
            return Err(CipherError::PolicyInvalid(
                "retention_cycles must be at least 1".into(),
            ));
        }
        if self.destruction_passes == 0 {
            return Err(CipherError::PolicyInvalid(
                "destruction_passes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        assert!(RotationPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_zero_min_age_rejected() {
        let policy = RotationPolicy {
            min_age_days: 0,
            ..Default::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(CipherError::PolicyInvalid(_))
        ));
    }

    #[test]
    fn test_min_age_above_interval_rejected() {
        let policy = RotationPolicy {
            min_age_days: 400,
            interval_days: 365,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_interval_at_max_age_rejected() {
        let policy = RotationPolicy {
            interval_days: 400,
            max_age_days: 400,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_zero_retention_rejected() {
        let policy = RotationPolicy {
            retention_cycles: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_zero_passes_rejected() {
        let policy = RotationPolicy {
            destruction_passes: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }
}

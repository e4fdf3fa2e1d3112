//! Striping Policy Model
//!
//! A striping policy describes how a file's byte stream is spread across
//! the OSDs of one replica: the stripe (object) size, the total number of
//! OSDs in a line and how many of them hold parity.
//!
//! Policies arrive with the file's locations metadata (xlocset), one per
//! replica. Translators only ever consult the first policy of a
//! [`PolicyContainer`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A list of striping policies, one per replica.
pub type PolicyContainer = [StripingPolicy];

/// Striping policy types understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StripingPolicyType {
    /// Plain striping without redundancy
    Raid0,
    /// Striping with systematic erasure-coded parity devices
    ErasureCode,
}

impl fmt::Display for StripingPolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StripingPolicyType::Raid0 => write!(f, "raid0"),
            StripingPolicyType::ErasureCode => write!(f, "erasure_code"),
        }
    }
}

/// Striping policy of one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripingPolicy {
    /// Layout type
    #[serde(rename = "type")]
    pub policy_type: StripingPolicyType,

    /// Size of one stripe unit in kB
    pub stripe_size: u32,

    /// Total number of OSDs in a line (n = k + m)
    pub width: u32,

    /// Number of parity OSDs in a line (m)
    #[serde(default)]
    pub parity_width: u32,
}

impl StripingPolicy {
    /// RAID0 policy over `width` OSDs.
    pub fn raid0(stripe_size_kb: u32, width: u32) -> Self {
        Self {
            policy_type: StripingPolicyType::Raid0,
            stripe_size: stripe_size_kb,
            width,
            parity_width: 0,
        }
    }

    /// Erasure-coded policy with `width` OSDs, `parity_width` of them parity.
    pub fn erasure_coded(stripe_size_kb: u32, width: u32, parity_width: u32) -> Self {
        Self {
            policy_type: StripingPolicyType::ErasureCode,
            stripe_size: stripe_size_kb,
            width,
            parity_width,
        }
    }

    /// Check the policy's structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.stripe_size == 0 {
            return Err(Error::InvalidPolicy(
                "stripe_size must be greater than 0".to_string(),
            ));
        }
        if self.parity_width >= self.width {
            return Err(Error::InvalidPolicy(format!(
                "width {} leaves no data OSD with parity_width {}",
                self.width, self.parity_width
            )));
        }
        match self.policy_type {
            StripingPolicyType::Raid0 if self.parity_width != 0 => Err(Error::InvalidPolicy(
                "raid0 policies cannot carry parity".to_string(),
            )),
            StripingPolicyType::ErasureCode if self.parity_width == 0 => Err(
                Error::InvalidPolicy("erasure_code policies need parity_width >= 1".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Stripe size in bytes.
    pub fn stripe_size_bytes(&self) -> usize {
        self.stripe_size as usize * 1024
    }

    /// Number of data OSDs (k).
    pub fn data_width(&self) -> usize {
        (self.width - self.parity_width) as usize
    }

    /// Number of parity OSDs (m).
    pub fn parity_width(&self) -> usize {
        self.parity_width as usize
    }

    /// Total number of OSDs in a line (n).
    pub fn width(&self) -> usize {
        self.width as usize
    }

    /// Bytes of file content covered by one line (k stripes).
    pub fn line_size(&self) -> usize {
        self.stripe_size_bytes() * self.data_width()
    }
}

/// The validated policy a translator works with.
pub fn primary_policy(policies: &PolicyContainer) -> Result<&StripingPolicy> {
    let policy = policies
        .first()
        .ok_or_else(|| Error::InvalidPolicy("no striping policy supplied".to_string()))?;
    policy.validate()?;
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_geometry() {
        let policy = StripingPolicy::erasure_coded(128, 6, 2);
        assert_eq!(policy.stripe_size_bytes(), 128 * 1024);
        assert_eq!(policy.data_width(), 4);
        assert_eq!(policy.parity_width(), 2);
        assert_eq!(policy.width(), 6);
        assert_eq!(policy.line_size(), 4 * 128 * 1024);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_invalid_policies() {
        assert_matches!(
            StripingPolicy::erasure_coded(0, 3, 1).validate(),
            Err(Error::InvalidPolicy(_))
        );
        assert_matches!(
            StripingPolicy::erasure_coded(1, 2, 2).validate(),
            Err(Error::InvalidPolicy(_))
        );
        assert_matches!(
            StripingPolicy::erasure_coded(1, 3, 0).validate(),
            Err(Error::InvalidPolicy(_))
        );
        let mut raid0 = StripingPolicy::raid0(1, 3);
        raid0.parity_width = 1;
        assert_matches!(raid0.validate(), Err(Error::InvalidPolicy(_)));
    }

    #[test]
    fn test_primary_policy_uses_first_entry() {
        let policies = vec![
            StripingPolicy::raid0(64, 2),
            StripingPolicy::erasure_coded(64, 3, 1),
        ];
        let primary = primary_policy(&policies).unwrap();
        assert_eq!(primary.policy_type, StripingPolicyType::Raid0);
        assert_matches!(primary_policy(&[]), Err(Error::InvalidPolicy(_)));
    }

    #[test]
    fn test_policy_json() {
        let json = r#"{"type":"erasure_code","stripe_size":4,"width":5,"parity_width":2}"#;
        let policy: StripingPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy, StripingPolicy::erasure_coded(4, 5, 2));

        let raid0: StripingPolicy =
            serde_json::from_str(r#"{"type":"raid0","stripe_size":1,"width":1}"#).unwrap();
        assert_eq!(raid0.parity_width, 0);
    }
}

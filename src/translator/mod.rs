//! Stripe Translation
//!
//! Maps a linear `(buffer, offset)` file request onto per-object
//! operations and merges completed reads back.
//!
//! # Pipeline
//!
//! ```text
//!  OS read/write ──▶ translate_*_request ──▶ dispatch to OSDs ──▶ process_reads
//!                    (this module)           (ObjectStore)        (this module,
//!                                                                  decodes lost
//!                                                                  stripes)
//! ```
//!
//! # Translators
//!
//! - [`Raid0Translator`]: plain striping, no redundancy
//! - [`ErasureCodedTranslator`]: striping with parity devices, generic over
//!   any [`ErasureCodec`](crate::ec::ErasureCodec)

mod erasure;
mod operation;
mod raid0;

use std::collections::HashMap;
use std::sync::Arc;

use crate::ec::{ReedSolVanCodec, WordSize};
use crate::error::{Error, Result};
use crate::policy::{primary_policy, PolicyContainer, StripingPolicyType};

pub use erasure::{ErasureCodedTranslator, ReedSolVanTranslator};
pub use operation::{ReadBuffer, ReadOperation, TranslatedRead, WriteBuffer, WriteOperation};
pub use raid0::Raid0Translator;

/// Converts byte-range requests into per-object operations and back.
pub trait StripeTranslator: Send + Sync {
    /// Split a write into per-object operations (parity included).
    fn translate_write_request<'a>(
        &self,
        buf: &'a [u8],
        offset: u64,
        policies: &PolicyContainer,
    ) -> Result<Vec<WriteOperation<'a>>>;

    /// Split a read into per-object operations whose data slots alias `buf`.
    fn translate_read_request<'a>(
        &self,
        buf: &'a mut [u8],
        offset: u64,
        policies: &PolicyContainer,
    ) -> Result<TranslatedRead<'a>>;

    /// Merge completed reads, repairing lost objects where possible.
    ///
    /// `successful_reads` has one entry per operation in emission order.
    /// Consumes the operations so translator-owned buffers are freed here.
    /// Returns the number of bytes now valid in the caller's buffer.
    fn process_reads(
        &self,
        operations: Vec<ReadOperation<'_>>,
        successful_reads: &[bool],
        policies: &PolicyContainer,
    ) -> Result<usize>;
}

// =============================================================================
// Registry
// =============================================================================

/// Translators keyed by striping policy type.
#[derive(Clone, Default)]
pub struct TranslatorRegistry {
    translators: HashMap<StripingPolicyType, Arc<dyn StripeTranslator>>,
}

impl std::fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorRegistry")
            .field("types", &self.translators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TranslatorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// RAID0 plus Reed-Solomon-Vandermonde erasure coding.
    pub fn with_defaults(word_size: WordSize) -> Self {
        let mut registry = Self::new();
        registry.register(StripingPolicyType::Raid0, Arc::new(Raid0Translator::new()));
        registry.register(
            StripingPolicyType::ErasureCode,
            Arc::new(ErasureCodedTranslator::new(ReedSolVanCodec::new(), word_size)),
        );
        registry
    }

    /// Register (or replace) the translator for a policy type.
    pub fn register(&mut self, policy_type: StripingPolicyType, translator: Arc<dyn StripeTranslator>) {
        self.translators.insert(policy_type, translator);
    }

    /// Translator for a policy type.
    pub fn get(&self, policy_type: StripingPolicyType) -> Result<Arc<dyn StripeTranslator>> {
        self.translators
            .get(&policy_type)
            .cloned()
            .ok_or(Error::UnknownPolicyType(policy_type))
    }

    /// Translator for the first policy of a container.
    pub fn for_policies(&self, policies: &PolicyContainer) -> Result<Arc<dyn StripeTranslator>> {
        self.get(primary_policy(policies)?.policy_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::StripingPolicy;

    #[test]
    fn test_registry_lookup() {
        let registry = TranslatorRegistry::with_defaults(WordSize::W8);
        assert!(registry.get(StripingPolicyType::Raid0).is_ok());
        assert!(registry
            .for_policies(&[StripingPolicy::erasure_coded(1, 3, 1)])
            .is_ok());
    }

    #[test]
    fn test_registry_unknown_type() {
        let mut registry = TranslatorRegistry::new();
        registry.register(StripingPolicyType::Raid0, Arc::new(Raid0Translator::new()));
        assert!(matches!(
            registry.get(StripingPolicyType::ErasureCode),
            Err(Error::UnknownPolicyType(StripingPolicyType::ErasureCode))
        ));
    }
}

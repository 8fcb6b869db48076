//! CIR to OSCAL artifact mappers.
//!
//! Each mapper is a pure transformation from processed CIR to one typed
//! artifact. Mappers never fail on missing optional data; the only error
//! they surface is a `MappingError` from property emission or from a
//! missing input that has no sensible default.

pub mod assessment;
pub mod base;
pub mod classify;
pub mod extract;
pub mod inventory;
pub mod poam;
pub mod ssp;

use crate::config::MappingConfig;
use crate::error::MappingError;
use crate::oscal::props::{Element, PropertyPolicy, PropsBuilder, VOCABULARY_1_1_3, Vocabulary};

pub use assessment::{AssessmentPlanMapper, AssessmentResultsMapper};
pub use inventory::InventoryMapper;
pub use poam::PoamMapper;
pub use ssp::SspMapper;

/// A transformation from CIR input to one artifact document.
pub trait Mapper {
    type Input: ?Sized;
    type Output;

    fn map(&self, input: &Self::Input) -> Result<Self::Output, MappingError>;
}

/// Settings shared by every mapper in one conversion run.
#[derive(Debug, Clone)]
pub struct MapContext {
    /// Publication timestamp stamped on every artifact of the run.
    pub timestamp: String,
    pub policy: PropertyPolicy,
    pub vocabulary: &'static Vocabulary,
    pub namespace: String,
    pub import_profile: String,
}

impl MapContext {
    pub fn new(config: &MappingConfig) -> Self {
        Self::with_timestamp(config, base::now_timestamp())
    }

    pub fn with_timestamp(config: &MappingConfig, timestamp: String) -> Self {
        Self {
            timestamp,
            policy: config.property_policy,
            vocabulary: &VOCABULARY_1_1_3,
            namespace: config.extension_namespace.clone(),
            import_profile: config.import_profile.clone(),
        }
    }

    pub fn props(&self, element: Element) -> PropsBuilder<'_> {
        PropsBuilder::new(element, self.vocabulary, &self.namespace)
    }
}

impl Default for MapContext {
    fn default() -> Self {
        Self::new(&MappingConfig::default())
    }
}

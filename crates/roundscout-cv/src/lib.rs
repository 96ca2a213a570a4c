//! Roundscout Computer Vision Library
//!
//! Finds agent icons on a minimap crop: alpha-weighted multi-scale template correlation,
//! global non-maximum suppression, ring-color team classification and roster
//! constraints.

pub mod bbox;
pub mod detection;
pub mod template;
pub mod utils;

// Re-export commonly used types
pub use bbox::{BBox, BBoxCollection};
pub use detection::{
    AgentDetector, DetectionConfig, TeamClassifier, TeamColorConfig, UniquenessFilter,
};
pub use template::{
    AgentTemplate, AgentTemplateSet, ScaledTemplate, TemplateConfig, TemplateLoader,
    TemplateMatcher,
};

// Error handling
pub type Result<T> = anyhow::Result<T>;

/// Seams between the detector and its collaborators
pub mod traits {
    use super::*;
    use crate::utils::PreparedImage;

    /// Source of pre-scaled agent templates, built once and shared read-only
    pub trait AgentTemplateProvider: Send + Sync {
        fn agent_templates(&self) -> &[AgentTemplate];

        fn agent_names(&self) -> Vec<&str> {
            self.agent_templates().iter().map(|t| t.name.as_str()).collect()
        }
    }

    /// Correlation of one scaled template against a prepared image
    pub trait TemplateMatchable {
        fn match_template(
            &self,
            image: &PreparedImage,
            template: &ScaledTemplate,
            threshold: f64,
        ) -> Vec<BBox>;
    }
}

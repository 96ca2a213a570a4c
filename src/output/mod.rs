//! Files written for each scan: minimaps, metadata, positions, clusters, report

pub mod report;
pub mod store;

pub use report::ReportGenerator;
pub use store::{FormationAnalysis, OutputStore, RoundMetadata};

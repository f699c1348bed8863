pub mod config;
pub mod error;
pub mod locations;
pub mod maps;
pub mod naming;
pub mod observations;
pub mod outputs;
pub mod pipelines;
pub mod review;
pub mod rules;
pub mod suntimes;
pub mod timestamps;
pub mod types;

#[cfg(feature = "runtime")]
pub mod geocoder;

pub use config::AppConfig;
pub use pipelines::{run_visit_pipeline, ExecutionContext, FieldVisitInputs, VisitPipelineOutput};
pub use types::{FieldVisit, GeoPoint, LocationSource};

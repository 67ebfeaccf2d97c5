//! The `pipeline_runs` table.

mod model;
mod repository;

pub use model::PipelineRunDB;
pub use repository::RunRepository;

//! Run scheduling, execution and bookkeeping.

mod coordinator;
mod model;
mod schedule;
mod store;


pub use coordinator::{PipelineComponents, RunCoordinator};
pub use model::{
    AttemptRecord, LogicalDateRun, RunOutcome, RunReport, RunState, TaskStage,
};
pub use schedule::logical_dates;
pub use store::RunStore;

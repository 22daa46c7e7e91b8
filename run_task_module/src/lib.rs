mod run_task;

pub use run_task::*;

mod core;
mod executor;
mod messages;
mod types;

pub use self::core::Dispatcher;
pub use executor::{ModuleExecutor, PhaseExecutor};
pub use messages::{launch_failure_message, phase_message};
pub use types::{DispatchRecord, DispatchStatus, DropReason, InboundEvent};

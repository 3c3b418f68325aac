pub mod local;
pub mod registry;
pub mod service;

pub use service::{Capabilities, OpAction, OpOutcome, OpRequest, OpsService};

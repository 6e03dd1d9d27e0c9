pub mod config;
pub mod cycle;
pub mod error;
pub mod interval;
pub mod io;
pub mod paths;
pub mod requirements;
pub mod store;

pub use error::{Result, StatsError};
pub use interval::{Alignment, OperationInterval};
pub use requirements::{RunHistory, UpdateRequirements, UpdateRequirementsEvaluator};

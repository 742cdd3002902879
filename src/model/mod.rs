pub mod config;
pub mod diagnostic;
pub mod intent;
pub mod project;
pub mod snapshot;
pub mod task;

pub use config::*;
pub use diagnostic::*;
pub use intent::*;
pub use project::*;
pub use snapshot::*;
pub use task::*;

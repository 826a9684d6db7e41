pub mod context;
pub mod lifecycle;
pub mod logging;
pub mod scheduler;

pub use lifecycle::{run_auto_approval_once, run_standalone};

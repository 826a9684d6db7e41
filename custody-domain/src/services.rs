// Pure domain services

pub mod dwell_policy;
pub mod transition_planner;

pub use dwell_policy::*;
pub use transition_planner::*;

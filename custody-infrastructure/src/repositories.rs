pub mod dwell_policy_files;
pub mod memory_ledger;
pub mod postgres_ledger;

pub use dwell_policy_files::*;
pub use memory_ledger::*;
pub use postgres_ledger::*;

pub mod audit_sink;
pub mod identity_service;

pub use audit_sink::*;
pub use identity_service::*;

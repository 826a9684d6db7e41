// Domain entities

pub mod auto_approval;
pub mod principal;
pub mod runtime_config;
pub mod shipment;
pub mod shipment_stage;
pub mod transition;

pub use auto_approval::*;
pub use principal::*;
pub use runtime_config::*;
pub use shipment::*;
pub use shipment_stage::*;
pub use transition::*;

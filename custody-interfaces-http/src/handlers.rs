pub mod approval_handlers;
pub mod ops_handlers;
pub mod shipment_handlers;

pub use approval_handlers::*;
pub use ops_handlers::*;
pub use shipment_handlers::*;

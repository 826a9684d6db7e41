// Domain value objects
pub mod geo_point;
pub mod identifiers;
pub mod report_kind;
pub mod shipment_status;

pub use geo_point::*;
pub use identifiers::*;
pub use report_kind::*;
pub use shipment_status::*;

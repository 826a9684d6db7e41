pub mod auto_approval_commands;
pub mod shipment_commands;
pub mod transition_commands;

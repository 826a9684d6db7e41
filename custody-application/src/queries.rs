pub mod shipment_queries;

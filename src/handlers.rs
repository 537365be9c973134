pub mod attachments;
pub mod configuration;
pub mod contacts;
pub mod imports;
pub mod inbound;
pub mod sales;

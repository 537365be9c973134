pub mod companies;
pub mod configuration;
pub mod contacts;
pub mod deals;
pub mod import;
pub mod notes;
pub mod sales;
pub mod tags;
pub mod tasks;
pub mod webhooks;

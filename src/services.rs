pub mod attachment_service;
pub mod auth;
pub mod configuration_service;
pub mod import_jobs;
pub mod import_service;
pub mod import_stream;
pub mod inbound_email_service;
pub mod merge_service;
pub mod sales_service;

pub mod store;
pub use store::{CrmStore, MergeTransaction};
pub mod pg_store;
pub use pg_store::PgCrmStore;

pub mod sales_repo;
pub use sales_repo::SalesRepository;
pub mod company_repo;
pub use company_repo::CompanyRepository;
pub mod contact_repo;
pub use contact_repo::ContactRepository;
pub mod deal_repo;
pub use deal_repo::DealRepository;
pub mod note_repo;
pub use note_repo::NoteRepository;
pub mod task_repo;
pub use task_repo::TaskRepository;
pub mod tag_repo;
pub use tag_repo::TagRepository;
pub mod configuration_repo;
pub use configuration_repo::ConfigurationRepository;

#[cfg(test)]
pub mod memory;

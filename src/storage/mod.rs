pub mod identity_store;
pub mod record;

pub use identity_store::IdentityStore;
pub use record::{validate_username, EnrollmentRecord};

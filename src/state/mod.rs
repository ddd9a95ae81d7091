mod catalog;
mod status;
mod user_data;

pub use catalog::{CatalogSnapshot, CatalogState};
pub use status::{RequestSnapshot, RequestSlot, RequestStatus};
pub use user_data::{UserDataSnapshot, UserDataState};

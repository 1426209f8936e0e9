pub mod models;
pub mod store;

pub use models::{Resource, ResourceType};
pub use store::{CreateResource, PgResourceStore, ResourceStore, UpdateResource};

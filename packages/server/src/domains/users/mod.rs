pub mod models;
pub mod store;

pub use models::{Role, User};
pub use store::{PgUserStore, UserStore};

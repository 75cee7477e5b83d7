pub mod database;
pub mod sqlite;
pub mod traits;

pub use database::{connect, migrate};
pub use sqlite::{SqliteCredentialSource, SqliteProductStore};
pub use traits::{CredentialSource, ProductStore};

pub mod db;
pub mod error;
pub mod store;

pub use db::SqliteProgressStore;
pub use error::StoreError;
pub use store::{MemoryProgressStore, ProgressStore};

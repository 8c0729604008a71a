mod config;
mod error;
mod store;
mod stream;

pub use config::FirebaseConfig;
pub use error::{FirebaseError, FirebaseResult};
pub use store::FirebaseStore;

pub mod config;
pub mod error;
pub mod types;

pub mod fallback;
pub mod media;
pub mod mode;
pub mod reactive;
pub mod remote;
pub mod storage;
pub mod store;

#[doc(hidden)]
pub use serde_json;

pub use config::Config;
pub use error::{Error, Result};
pub use store::{CollectionStore, CollectionStoreOptions};
pub use types::{Document, MediaReference};

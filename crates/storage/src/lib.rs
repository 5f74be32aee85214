pub mod backend;
pub mod error;
mod key;
pub mod object;

pub use crate::backend::StorageBackend;
pub use crate::key::validate as validate_key;
pub use crate::object::{Metadata, Object, ObjectInfo};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;

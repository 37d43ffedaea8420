pub mod chatdb;
pub mod db;
pub mod error;
pub mod jobdb;
pub mod memory;
pub mod profiledb;

use std::sync::Arc;

use self::{chatdb::ChatExt, jobdb::JobExt, profiledb::ProfileExt};

/// Everything the services need from persistence.
pub trait EntityStore: JobExt + ChatExt + ProfileExt + std::fmt::Debug + Send + Sync {}

impl<T> EntityStore for T where T: JobExt + ChatExt + ProfileExt + std::fmt::Debug + Send + Sync {}

pub type SharedStore = Arc<dyn EntityStore>;

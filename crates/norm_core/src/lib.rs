//! Backend-agnostic persistence capabilities with a SQLite adapter.
//!
//! Application code depends on the `Creator`/`Reader`/`Updater`/`Deleter`
//! contracts and the composites built from them; `adapter` realizes them with
//! per-operation query templates, and `aggregation` joins or groups the
//! results of independent reads by key.

pub mod adapter;
pub mod aggregation;
pub mod capability;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod scan;
pub mod template;

pub use adapter::{
    new_immutable_object, new_object, new_persistent_object, new_view, SqlCreator, SqlDeleter,
    SqlImmutableObject, SqlObject, SqlPersistentObject, SqlReader, SqlUpdater, SqlView,
};
pub use aggregation::{group, join_by_key, lookup, partition_by_key, Keyable, Merge};
pub use capability::{
    Creator, Deleter, ImmutableObject, Object, PersistentObject, Reader, Updater, View,
};
pub use config::{ConfigError, ConfigResult, JournalMode, NormConfig, StoreConfig};
pub use context::{CancelToken, Context};
pub use error::{ErrorKind, FetchSide, NormError, NormResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use scan::{ScanError, ScanShape};
pub use template::{
    compile, default_placeholder, set_default_placeholder, CompiledQuery, Placeholder, Template,
    TemplateError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

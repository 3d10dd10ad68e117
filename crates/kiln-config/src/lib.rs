//! Layered configuration store.
//!
//! Scans a directory tree of TOML/JSON fragments and deep-merges them into
//! one [`ConfigTree`], indexed by fragment name and by declared kind. Trees
//! can be persisted as snapshots to skip the scan on later runs.

mod error;
mod fragment;
mod merge;
mod snapshot;
mod tree;

pub use error::ConfigError;
pub use fragment::{toml_to_json, Fragment, FragmentFormat, FragmentSource, KIND_KEY};
pub use merge::deep_merge;
pub use snapshot::{
    load_or_build, load_snapshot, tree_digest, write_snapshot, SNAPSHOT_FORMAT, SNAPSHOT_VERSION,
};
pub use tree::ConfigTree;

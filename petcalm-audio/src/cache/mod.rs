//! Offline asset cache: named on-disk caches, network access, and the
//! install/activate/fetch lifecycle

pub mod fetch;
pub mod offline;
pub mod store;

pub use fetch::{BundleDirectory, FetchedAsset, HttpNetwork, Network};
pub use offline::{OfflineAssetCache, RequestKind};
pub use store::{CacheStorage, CachedEntry, EntryMeta, NamedCache};

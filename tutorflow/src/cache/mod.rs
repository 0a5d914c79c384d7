//! Memoization of generative calls.
//!
//! Keys are the exact prompt text, values the first response recorded for
//! it. Entries never expire.

mod file;
mod memory;

pub use file::JsonFileCache;
pub use memory::InMemoryCache;

use std::fmt::Debug;

/// Default cache file name.
pub const DEFAULT_CACHE_FILE: &str = "llm_cache.json";

/// Key-value store for generative responses.
///
/// Implementations never fail the caller: read and write problems are
/// logged and treated as a miss or a dropped write.
pub trait CacheStore: Send + Sync + Debug {
    /// Looks up the response recorded for a prompt.
    fn get(&self, key: &str) -> Option<String>;

    /// Records a response. An existing entry for the key is kept.
    fn put(&self, key: &str, value: &str);
}

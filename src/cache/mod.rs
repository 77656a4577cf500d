pub mod scheme_cache;

pub use scheme_cache::{source_hash, CacheEntry, SchemeCache};

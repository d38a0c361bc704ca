//! Persistent layer cache for platform builds
//!
//! Provides content-addressed caching keyed by the hash of each platform's
//! image definition and build recipe.
//!
//! # Validity
//!
//! - Cache keys derived from the SHA256 of image definition + recipe bytes
//! - One entry per platform id; storing a new key replaces the old entry
//! - An entry is reused only while its key equals the freshly resolved key
//!
//! # Lookup outcomes
//!
//! | Outcome | Build behavior |
//! |---------|----------------|
//! | Hit | Cached image archive loaded, image build skipped |
//! | Stale | Key changed; image rebuilt, entry replaced on success |
//! | Miss | Image built, entry created on success |

pub mod key;
pub mod store;

pub use key::{resolve, CacheKey};
pub use store::{format_bytes, CacheEntry, CacheStore, CachedLayer, FsCacheStore};

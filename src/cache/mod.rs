//! # Data Cache
//!
//! Memoizes loader results by `name + hash_key(args)`.
//!
//! - **Single-flight**: concurrent readers of a fresh entry share one
//!   [`SharedLoad`](core::SharedLoad) future and observe the same outcome.
//! - **Freshness**: an entry is reused while it has live subscribers, when read with
//!   the `Native` intent (back/forward), in server execution, or within the preload
//!   window. Invalidated entries (timestamp `0`) are always reloaded.
//! - **Invalidation**: [`DataCache::invalidate`] and [`DataCache::revalidate`] match
//!   keys by prefix, so invalidating `user` hits `user[1]` and `user[2]`.
//! - **Eviction**: [`CacheSweeper`] drops entries past the TTL that nobody observes.

mod core;
mod key;
mod query;
mod sweep;

pub use self::core::{DataCache, KeyFilter, LoadFuture, LoadResult, LoaderValue, SharedLoad};
pub use key::{cache_key, hash_key};
pub use query::Query;
pub use sweep::CacheSweeper;

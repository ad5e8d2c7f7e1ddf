//! Feed sources and loading.
//!
//! A [`FeedSource`] yields the payloads a feed currently publishes: files in
//! a download directory ([`DirectoryFeed`]) or payloads and pre-parsed rows
//! handed over in memory ([`InMemoryFeed`]). [`load_feed`] fetches a source,
//! picks the parser per payload format and returns the feed's records.
//!
//! # Example
//!
//! ```no_run
//! use portwatch::core::domain::FeedRole;
//! use portwatch::io::loaders::{load_feed, DirectoryFeed};
//!
//! let feed = DirectoryFeed::new("arrivals", FeedRole::Arriving, "data/arrivals");
//! let result = load_feed(&feed).expect("feed unavailable");
//! println!("Loaded {} records", result.records.len());
//! ```

pub mod loaders;


pub use loaders::{
    load_feed, DirectoryFeed, FeedFormat, FeedLoadResult, FeedPayload, FeedSource, InMemoryFeed,
};

//! In-memory catalog of active subscriptions.
//!
//! The catalog maps subscription identifiers to [`CatalogRecord`]s and
//! notifies watchers of every insertion and removal:
//! - Events reach each watcher exactly once, in mutation order
//! - Each watcher has its own bounded queue and delivery thread
//! - A slow watcher loses events (counted) instead of stalling writers
//!
//! # Example
//!
//! ```ignore
//! let catalog = Catalog::new();
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let watch = catalog.watch(tx);
//!
//! catalog.add(SubscriptionId::from("s1"), CatalogRecord::new(RequestId(1), sub))?;
//! match rx.recv()? {
//!     CatalogEvent { kind: CatalogEventKind::Added, record } => println!("{:?}", record),
//!     _ => {}
//! }
//!
//! watch.unwatch();
//! ```

mod manager;
mod types;

pub use manager::{Catalog, CatalogWatch};
pub use types::{CatalogConfig, CatalogEvent, CatalogEventKind, CatalogRecord, WatchId};

//! Watermark state
//!
//! Tracks how far each resource has been synced so the next run only asks
//! for records changed since then.
//!
//! # Overview
//!
//! - `Watermark` - persisted progress record for one resource
//! - `KvStore` - single-key storage seam (`MemoryKvStore`, `ObjectKvStore`)
//! - `WatermarkStore` - keyed, retrying access to watermarks

mod manager;
mod store;
mod types;

pub use manager::{WatermarkStore, DEFAULT_NAMESPACE};
pub use store::{KvStore, MemoryKvStore, ObjectKvStore, StoreError};
pub use types::Watermark;

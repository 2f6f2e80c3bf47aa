//! Background work
//!
//! - Video thumbnail queue and worker
//! - Expired story sweeper

mod stories;
mod thumbnail;

pub use stories::sweep_expired_stories;
pub use thumbnail::{JobOutcome, QUEUE_CAPACITY, ThumbnailQueue, ThumbnailWorker};

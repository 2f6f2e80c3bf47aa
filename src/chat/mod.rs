//! Real-time chat fan-out

mod hub;

pub use hub::{ChatEvent, ChatHub};

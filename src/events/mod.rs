//! Event object model: flag protocol, source partitioning, and the
//! order-like indexed event consumed by the depth engine.

pub mod flags;
pub mod order;
pub mod source;

pub use flags::EventFlags;
pub use order::{IndexedEvent, Order, Price, Scope, Side, Size};
pub use source::EventSource;

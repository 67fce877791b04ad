//! Transaction-reassembly engine: per-source pending-event buffering, flag
//! interpretation, snapshot post-processing and listener routing.

pub mod model;
pub mod processor;
pub mod router;
pub mod snapshot;
pub mod strategy;
pub mod subscription;

pub use model::{
    IndexedTxModel, IndexedTxModelBuilder, TimeSeriesTxModel, TimeSeriesTxModelBuilder,
};
pub use router::TransactionListener;
pub use snapshot::SnapshotMode;
pub use strategy::DeliveryMode;
pub use subscription::FROM_TIME_UNSUBSCRIBED;

//! Order book engine: sorted side containers, depth-limit truncation, diff
//! computation and update-rate aggregation over reconstructed transactions.

pub mod model;
pub(crate) mod ordering;
pub(crate) mod side;

pub use model::{DepthSnapshot, MarketDepthListener, MarketDepthModel, MarketDepthModelBuilder};
pub use side::BookDiff;

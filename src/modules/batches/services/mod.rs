pub mod batch_service;
pub mod distribution;

pub use batch_service::{BatchAdjustment, BatchService};
pub use distribution::{distribute, Share, ShareInput};

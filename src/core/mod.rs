pub mod error;
pub mod import;
pub mod money;

pub use error::{AppError, Result};
pub use money::{format_gbp, round_money};

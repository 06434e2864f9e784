pub mod error;
pub mod gateway;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::*;
pub use gateway::{FinanceClient, RetryPolicy, TickerBatch};
pub use traits::*;
pub use types::*;

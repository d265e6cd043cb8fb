// Position lifecycle and order execution
pub mod trader;

pub use trader::{TradeAction, Trader};

// External market data and exchange APIs
pub mod binance;
pub mod news;

pub use binance::BinanceClient;
pub use news::NewsClient;

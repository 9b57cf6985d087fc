pub mod stock;

pub use stock::{MovementDetails, StockSnapshot};

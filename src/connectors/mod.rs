pub mod alpaca;
pub mod deepseek;
pub mod messages;
pub mod traits;

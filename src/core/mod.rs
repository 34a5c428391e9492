pub mod decision;
pub mod engine;
pub mod executor;

pub use decision::DecisionPolicy;
pub use engine::{IterationOutcome, TradingEngine};
pub use executor::TradeExecutor;

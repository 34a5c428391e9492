pub mod technical;

pub use technical::{compute_snapshot, TechnicalIndicators};

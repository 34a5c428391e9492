//! Polling trading loop: indicators in, a model-generated signal out,
//! gated by a decision policy and executed through a brokerage.

pub mod config;
pub mod connectors;
pub mod core;
pub mod error;
pub mod indicators;
pub mod storage;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

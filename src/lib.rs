pub mod api;
pub mod config;
pub mod contracts;
pub mod issuance;
pub mod metrics;
pub mod sequence;
pub mod storage;

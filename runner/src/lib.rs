//! Batch dispatch of an external simulation executable across a fixed
//! pool of parallel workers: static round-robin partitioning, one
//! timeout-bounded subprocess per task, append-only checkpointing and an
//! order-stable combined output file.

pub mod batch;
pub mod checkpoint;
pub mod collector;
pub mod config;
pub mod executors;
pub mod layout;
pub mod tasks;
pub mod worker;

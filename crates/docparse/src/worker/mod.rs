//! Asynchronous processing behind the synchronous ingest call.

pub mod job;
pub mod pool;

pub use job::{Job, JobResult};
pub use pool::WorkerPool;

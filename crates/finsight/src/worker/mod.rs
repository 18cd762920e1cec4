pub mod pool;

pub use pool::{WorkerConfig, WorkerPool};

pub mod consumer;
pub mod pool;
pub mod producer;
pub mod reaper;

pub use consumer::Consumer;
pub use pool::{WorkerOutcome, WorkerPool, WorkerPoolConfig};
pub use producer::Producer;
pub use reaper::{find_stuck_jobs, reap_stuck_jobs, ReaperReport};

// Re-export crossbeam_channel for use in main
pub use crossbeam_channel;

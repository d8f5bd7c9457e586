pub use rayon::ThreadPoolBuildError;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Background pool used for chunk generation, mesh building, and cache I/O.
pub struct JobSystem {
    pool: ThreadPool,
}

impl JobSystem {
    pub fn new(num_threads: Option<usize>, name: &str) -> Result<Self, ThreadPoolBuildError> {
        let count = num_threads.unwrap_or_else(default_worker_threads).max(1);
        let prefix = name.to_owned();
        let pool = ThreadPoolBuilder::new()
            .num_threads(count)
            .thread_name(move |index| format!("{prefix}-{index}"))
            .build()?;
        tracing::debug!("Started job system '{name}' with {count} threads");
        Ok(Self { pool })
    }

    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }
}

/// One thread is left for the caller's update loop.
pub fn default_worker_threads() -> usize {
    let available = std::thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(4);
    available.saturating_sub(1).clamp(2, 8)
}

//! Execution backends. Every kernel is written once against `Backend`; the
//! serial and thread-pool variants run the same per-chunk closures, and
//! anything reduced across chunks is reduced in chunk order, so both give
//! bit-identical results.
use crate::config::BackendParams;
use crate::error::ConfigError;
use rayon::prelude::*;
use tracing::info;

pub enum Backend {
    Serial,
    Threads(rayon::ThreadPool),
}

impl Backend {
    pub fn new(params: &BackendParams) -> Result<Backend, ConfigError> {
        match params {
            BackendParams::Serial => {
                info!("using the serial backend");
                Ok(Backend::Serial)
            }
            BackendParams::Threads { n_threads } => {
                let n = match n_threads {
                    Some(0) => {
                        return Err(ConfigError::InvalidBackend(
                            "thread count must be at least 1".to_string(),
                        ))
                    }
                    Some(n) => *n,
                    None => std::thread::available_parallelism()
                        .map(|n| n.get())
                        .unwrap_or(1),
                };
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ConfigError::InvalidBackend(e.to_string()))?;
                info!(n_threads = n, "using the thread-pool backend");
                Ok(Backend::Threads(pool))
            }
        }
    }

    pub fn n_workers(&self) -> usize {
        match self {
            Backend::Serial => 1,
            Backend::Threads(pool) => pool.current_num_threads(),
        }
    }

    /// Evaluate `f` for every index in `0..n`, results in index order.
    pub fn map_indexed<T, F>(&self, n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            Backend::Serial => (0..n).map(f).collect(),
            Backend::Threads(pool) => pool.install(|| (0..n).into_par_iter().map(f).collect()),
        }
    }

    /// Run `f` on disjoint mutable chunks of `data`. The chunk index is
    /// passed along so callers can address matching slices elsewhere.
    pub fn for_each_chunk_mut<T, F>(&self, data: &mut [T], chunk_size: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        match self {
            Backend::Serial => data
                .chunks_mut(chunk_size)
                .enumerate()
                .for_each(|(i, c)| f(i, c)),
            Backend::Threads(pool) => pool.install(|| {
                data.par_chunks_mut(chunk_size)
                    .enumerate()
                    .for_each(|(i, c)| f(i, c))
            }),
        }
    }
}

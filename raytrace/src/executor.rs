use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Runs the embarrassingly-parallel parts of building a geometry index.
///
/// Implementations hold no per-geometry state, so a single executor can be
/// shared by every geometry in the process.
pub trait Executor: Sync {
    /// Splits `items` into contiguous, disjoint chunks and calls `f` on each
    /// of them, passing the chunk's offset within `items`; returns once all
    /// chunks have been processed.
    fn for_each<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send;

    /// Runs both closures, potentially in parallel, and returns their
    /// results.
    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send;
}

/// Executor that does everything on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn for_each<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        if !items.is_empty() {
            f(0, items);
        }
    }

    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        (a(), b())
    }
}

/// Executor backed by a rayon thread pool.
#[derive(Debug, Default)]
pub struct ThreadPoolExecutor {
    /// Dedicated pool; when missing, rayon's global pool is used instead.
    pool: Option<ThreadPool>,
}

impl ThreadPoolExecutor {
    /// Chunks smaller than this aren't worth sending to another thread.
    const MIN_CHUNK_LEN: usize = 256;

    /// Returns the process-wide executor.
    ///
    /// It runs on rayon's global pool, which gets spawned lazily on first
    /// use and lives until the process exits.
    pub fn shared() -> &'static Self {
        static SHARED: ThreadPoolExecutor = ThreadPoolExecutor { pool: None };

        &SHARED
    }

    /// Creates an executor with its own pool of `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("raytrace-{idx}"))
            .build()?;

        Ok(Self { pool: Some(pool) })
    }

    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn chunk_len(&self, len: usize) -> usize {
        len.div_ceil(4 * self.threads().max(1))
            .max(Self::MIN_CHUNK_LEN)
    }
}

impl Executor for ThreadPoolExecutor {
    fn for_each<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        if items.is_empty() {
            return;
        }

        let chunk_len = self.chunk_len(items.len());

        let mut run = move || {
            items.par_chunks_mut(chunk_len).enumerate().for_each(
                |(chunk_idx, chunk)| {
                    f(chunk_idx * chunk_len, chunk);
                },
            );
        };

        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        match &self.pool {
            Some(pool) => pool.join(a, b),
            None => rayon::join(a, b),
        }
    }
}

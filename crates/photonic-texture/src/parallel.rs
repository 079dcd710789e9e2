//! Fixed-size worker pool for data-parallel stages.
//!
//! Every stage splits its output into disjoint partitions (rows, tiles or
//! 4x4 blocks) and computes each partition from read-only inputs only. The
//! value written at a position therefore depends on that position alone, and
//! results are bit-identical for any pool size.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{try_filled, Result};

/// A fixed-size pool of worker threads.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `threads` workers; `0` uses the available parallelism.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("photonic-worker-{}", i))
            .build()?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Compute one value per pixel of a `width` x `height` grid.
    ///
    /// Rows are distributed across workers; each row is a disjoint slice of
    /// the output.
    pub fn map_pixels<T, F>(&self, width: u32, height: u32, f: F) -> Result<Vec<T>>
    where
        T: Send + Clone + Default,
        F: Fn(u32, u32) -> T + Sync,
    {
        self.map_rows(width, height, |y, row| {
            for (x, out) in row.iter_mut().enumerate() {
                *out = f(x as u32, y);
            }
        })
    }

    /// Fill a `width` x `height` grid row by row.
    ///
    /// `f` receives the row index and the row's output slice.
    pub fn map_rows<T, F>(&self, width: u32, height: u32, f: F) -> Result<Vec<T>>
    where
        T: Send + Clone + Default,
        F: Fn(u32, &mut [T]) + Sync,
    {
        let w = width as usize;
        let mut out = try_filled(w * height as usize, T::default())?;
        if w == 0 {
            return Ok(out);
        }
        self.pool.install(|| {
            out.par_chunks_mut(w)
                .enumerate()
                .for_each(|(y, row)| f(y as u32, row));
        });
        Ok(out)
    }

    /// Compute `count` independent work items, returned in index order.
    pub fn map_indexed<T, F>(&self, count: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        self.pool
            .install(|| (0..count).into_par_iter().map(&f).collect())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

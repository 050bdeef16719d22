//! # Parallel World
//!
//! Lockstep collectives between the workers that each own a partition of the atoms.
//!
//! Every collective is a synchronization point: all workers must call the same
//! collectives in the same order. Rank [`ROOT`] is the authoritative worker; it is
//! the only one holding the channel to the driver, and every broadcast originates
//! from it.

mod serial;
mod threaded;

pub use serial::SerialComm;
pub use threaded::ThreadComm;

use thiserror::Error;

/// Rank of the authoritative worker.
pub const ROOT: usize = 0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommError {
    #[error("Worker {peer} disconnected from the world")]
    Disconnected { peer: usize },

    #[error("Worker {peer} sent a {found} payload where {expected} was expected")]
    UnexpectedPayload {
        peer: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Worker {peer} contributed {actual} values to a reduction of {expected}")]
    LengthMismatch {
        peer: usize,
        expected: usize,
        actual: usize,
    },
}

/// Collective operations over the worker world.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    #[inline]
    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }

    /// Replaces `data` on every worker with the root's contents.
    fn broadcast_bytes(&self, data: &mut Vec<u8>) -> Result<(), CommError>;

    fn broadcast_f64(&self, data: &mut Vec<f64>) -> Result<(), CommError>;

    fn broadcast_i32(&self, data: &mut Vec<i32>) -> Result<(), CommError>;

    /// Element-wise sum across workers, delivered to the root only.
    fn reduce_sum_f64(&self, local: &[f64]) -> Result<Option<Vec<f64>>, CommError>;

    fn reduce_sum_i32(&self, local: &[i32]) -> Result<Option<Vec<i32>>, CommError>;

    /// Element-wise sum across workers, delivered to every worker.
    fn all_reduce_sum_f64(&self, local: &[f64]) -> Result<Vec<f64>, CommError> {
        let mut summed = self.reduce_sum_f64(local)?.unwrap_or_default();
        self.broadcast_f64(&mut summed)?;
        Ok(summed)
    }

    fn all_reduce_sum_i32(&self, local: &[i32]) -> Result<Vec<i32>, CommError> {
        let mut summed = self.reduce_sum_i32(local)?.unwrap_or_default();
        self.broadcast_i32(&mut summed)?;
        Ok(summed)
    }

    /// Every worker's contribution, indexed by rank, delivered to every worker.
    fn all_gather_f64(&self, local: &[f64]) -> Result<Vec<Vec<f64>>, CommError>;
}

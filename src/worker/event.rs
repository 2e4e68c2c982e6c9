//! Messages sent from workers to the aggregator.

use chrono::{DateTime, Local};

use crate::source::Candidate;

/// A confirmed match. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// The Base58Check address
    pub address: String,
    /// The private key that derives `address`
    pub private_key: Candidate,
    /// The ID of the worker that found this hit
    pub worker_id: usize,
    /// Discovery time
    pub found_at: DateTime<Local>,
}

impl Hit {
    /// Returns the private key as 64 lowercase hex characters.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key)
    }
}

/// Worker output. Workers never touch global statistics directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Successful derivations since the worker's previous flush.
    Attempts { worker_id: usize, count: u64 },
    /// A match, sent as soon as it is found.
    Hit(Hit),
    /// The worker waited past the stall bound for a key batch.
    Stalled { worker_id: usize },
}

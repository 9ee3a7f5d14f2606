use std::time::Instant;

use ahash::HashMap;
use kctl::Record;
use tokio::sync::oneshot;

use crate::error::Error;

/// An outstanding kernel request, keyed by its sequence number.
pub struct Continuation {
    tx: oneshot::Sender<Result<Record, Error>>,
    deadline: Instant,
}

/// Requests sent to the kernel and not yet answered.
#[derive(Default)]
pub struct PendingTable {
    entries: HashMap<u32, Continuation>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sequence_number: u32, tx: oneshot::Sender<Result<Record, Error>>, deadline: Instant) {
        self.entries.insert(sequence_number, Continuation { tx, deadline });
    }

    /// Remove and return the continuation for a sequence number, if any —
    /// used both to resolve a matched response and to cancel on timeout.
    pub fn take(&mut self, sequence_number: u32) -> Option<Continuation> {
        self.entries.remove(&sequence_number)
    }

    /// Resolve every continuation past its deadline with `Error::Timeout`.
    /// Called periodically by `KernelClient`'s reaper task so a
    /// continuation whose owning task was cancelled or dropped does not
    /// leak forever.
    pub fn reap_expired(&mut self, now: Instant) {
        let expired: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, c)| c.deadline <= now)
            .map(|(seq, _)| *seq)
            .collect();

        for seq in expired {
            if let Some(continuation) = self.entries.remove(&seq) {
                let _ = continuation.tx.send(Err(Error::Timeout));
            }
        }
    }

    /// Resolve every outstanding continuation with `Error::ChannelClosed`,
    /// called once the transport has gone away.
    pub fn fail_all(&mut self) {
        for (_, continuation) in self.entries.drain() {
            let _ = continuation.tx.send(Err(Error::ChannelClosed));
        }
    }
}

impl Continuation {
    pub fn resolve(self, result: Result<Record, Error>) {
        let _ = self.tx.send(result);
    }
}

//! Single-slot, overwrite-on-full hand-off between one producer and one
//! consumer.
//!
//! The slot is a capacity-one channel. The producer keeps a receiver clone so
//! it can evict a stale occupant itself; neither side ever blocks and the
//! mailbox never holds more than one item.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

/// Producer half. Owned by the capture worker.
pub struct Depositor<T> {
    tx: Sender<T>,
    evict: Receiver<T>,
}

/// Consumer half. Owned by whoever polls for the latest item.
pub struct Collector<T> {
    rx: Receiver<T>,
}

/// Create a connected mailbox pair.
pub fn mailbox<T>() -> (Depositor<T>, Collector<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let depositor = Depositor {
        tx,
        evict: rx.clone(),
    };
    (depositor, Collector { rx })
}

impl<T> Depositor<T> {
    /// Install `item`, discarding any undelivered occupant.
    ///
    /// Returns `true` when an older item was discarded. Never blocks: with a
    /// single producer the slot is guaranteed free after one eviction.
    pub fn deposit(&self, item: T) -> bool {
        let mut item = item;
        let mut displaced = false;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return displaced,
                Err(TrySendError::Full(back)) => {
                    // The consumer may win the race for the occupant; either way
                    // the slot is free on the next attempt.
                    if self.evict.try_recv().is_ok() {
                        displaced = true;
                    }
                    item = back;
                }
                Err(TrySendError::Disconnected(_)) => return displaced,
            }
        }
    }
}

impl<T> Collector<T> {
    /// Take the pending item, if any. Never blocks.
    pub fn fetch(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

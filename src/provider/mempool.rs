//! Pending transactions held while automining is off

use std::collections::VecDeque;

use crate::{
    config::MempoolOrder,
    types::{Address, SimulationTx, B256},
};

/// Transaction waiting for the next mined block
#[derive(Debug, Clone)]
pub struct PendingTx {
    /// Hash returned to the submitter
    pub hash: B256,
    /// Sender nonce assigned at submission
    pub nonce: u64,
    pub tx: SimulationTx,
}

/// Queue of pending transactions
#[derive(Debug, Default)]
pub struct Mempool {
    pending: Vec<PendingTx>,
}

impl Mempool {
    /// Queues a transaction behind the ones already pending
    pub fn push(&mut self, pending: PendingTx) {
        self.pending.push(pending);
    }

    /// Number of queued transactions
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of queued transactions sent by `sender`
    pub fn pending_from(&self, sender: Address) -> u64 {
        self.pending
            .iter()
            .filter(|pending| pending.tx.caller == sender)
            .count() as u64
    }

    /// Empties the queue in mining order
    ///
    /// `Priority` repeatedly takes the highest-priced transaction among the
    /// lowest-nonce transactions of each sender, so a sender's transactions
    /// always run in nonce order. Equal prices keep submission order.
    pub fn drain_ordered(&mut self, order: MempoolOrder) -> Vec<PendingTx> {
        let drained = std::mem::take(&mut self.pending);
        if order == MempoolOrder::Fifo {
            return drained;
        }

        // Per-sender queues in nonce order, tagged with submission index
        let mut queues: Vec<VecDeque<(usize, PendingTx)>> = Vec::new();
        for (index, pending) in drained.into_iter().enumerate() {
            let sender = pending.tx.caller;
            match queues.iter_mut().find(|queue| {
                queue.front().is_some_and(|(_, head)| head.tx.caller == sender)
            }) {
                Some(queue) => queue.push_back((index, pending)),
                None => queues.push(VecDeque::from([(index, pending)])),
            }
        }
        for queue in &mut queues {
            queue.make_contiguous().sort_by_key(|(_, pending)| pending.nonce);
        }

        let mut ordered = Vec::with_capacity(queues.iter().map(VecDeque::len).sum());
        loop {
            let next = queues
                .iter()
                .enumerate()
                .filter_map(|(slot, queue)| queue.front().map(|(index, head)| (slot, *index, head.tx.gas_price)))
                .max_by(|a, b| a.2.cmp(&b.2).then(b.1.cmp(&a.1)));
            let Some((slot, _, _)) = next else {
                break;
            };
            if let Some((_, pending)) = queues[slot].pop_front() {
                ordered.push(pending);
            }
        }
        ordered
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::connection::Connection;
use crate::connector::Connector;

/// Consistent snapshot of pool counters, taken under the pool lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Slots still owned by the pool (`available + used`).
    pub total: usize,
    /// Parked connections ready to hand out.
    pub available: usize,
    /// Connections currently lent out.
    pub used: usize,
    /// Acquirers blocked waiting for a slot.
    pub waiting: usize,
    /// Successful acquires since the pool was built.
    pub acquired: u64,
    /// Acquires that gave up after their wait expired.
    pub timeouts: u64,
}

/// A blocked acquirer. Each has its own condvar so a freed slot wakes only
/// the head of the queue.
pub(crate) struct Waiter {
    pub(crate) ticket: u64,
    pub(crate) wake: Arc<Condvar>,
}

pub(crate) struct PoolInner {
    pub(crate) idle: VecDeque<Connection>,
    pub(crate) used: usize,
    pub(crate) total: usize,
    /// Tickets of blocked acquirers, oldest first. Only the head may claim a slot.
    pub(crate) waiters: VecDeque<Waiter>,
    pub(crate) next_ticket: u64,
    pub(crate) closed: bool,
    pub(crate) acquired: u64,
    pub(crate) timeouts: u64,
}

impl PoolInner {
    pub(crate) fn new(idle: VecDeque<Connection>) -> Self {
        Self {
            total: idle.len(),
            idle,
            used: 0,
            waiters: VecDeque::new(),
            next_ticket: 0,
            closed: false,
            acquired: 0,
            timeouts: 0,
        }
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.total,
            available: self.idle.len(),
            used: self.used,
            waiting: self.waiters.len(),
            acquired: self.acquired,
            timeouts: self.timeouts,
        }
    }

    pub(crate) fn take_ticket(&mut self) -> (u64, Arc<Condvar>) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let wake = Arc::new(Condvar::new());
        self.waiters.push_back(Waiter {
            ticket,
            wake: Arc::clone(&wake),
        });
        (ticket, wake)
    }

    pub(crate) fn drop_ticket(&mut self, ticket: u64) {
        self.waiters.retain(|w| w.ticket != ticket);
    }

    /// A slot can go to `ticket` if one is parked and nobody queued earlier.
    pub(crate) fn is_turn_of(&self, ticket: u64) -> bool {
        !self.idle.is_empty() && self.waiters.front().is_some_and(|w| w.ticket == ticket)
    }

    /// Wake the oldest waiter if a parked connection is there for it.
    pub(crate) fn wake_head(&self) {
        if self.idle.is_empty() {
            return;
        }
        if let Some(head) = self.waiters.front() {
            head.wake.notify_one();
        }
    }

    pub(crate) fn wake_all(&self) {
        for waiter in &self.waiters {
            waiter.wake.notify_one();
        }
    }

    /// Move one parked connection to the lent-out side.
    pub(crate) fn lend(&mut self) -> Option<Connection> {
        let conn = self.idle.pop_front()?;
        self.used += 1;
        self.acquired += 1;
        Some(conn)
    }
}

/// State shared by every clone of a [`Pool`](super::Pool) and every guard it lent.
pub(crate) struct PoolShared {
    pub(crate) id: u64,
    pub(crate) connector: Connector,
    pub(crate) acquire_timeout: Option<Duration>,
    pub(crate) inner: Mutex<PoolInner>,
}

impl PoolShared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a connection back from a borrower.
    ///
    /// Any transaction it still has open is rolled back before the slot is
    /// visible to other acquirers. After the pool closed the connection is
    /// closed instead of parked.
    pub(crate) fn put_back(&self, conn: Connection) {
        conn.settle();
        let mut inner = self.lock();
        inner.used -= 1;
        if inner.closed {
            inner.total -= 1;
            drop(inner);
            tracing::debug!(pool = self.id, connection = conn.id(), "closing connection returned after pool close");
            conn.close();
            return;
        }
        tracing::debug!(pool = self.id, connection = conn.id(), "connection released");
        inner.idle.push_back(conn);
        inner.wake_head();
    }
}

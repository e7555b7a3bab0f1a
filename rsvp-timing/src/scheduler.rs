use crate::timer::duration_ns;
use log::trace;
use std::collections::BTreeMap;
use std::time::Duration;

/// Handle to one pending delayed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutHandle(u64);

/// Cancellable delayed events on an external clock.
///
/// Nothing fires on its own: the owner pulls due events with [`pop_due`]
/// from its single control thread. Events due at the same instant come out
/// in scheduling order. After [`cancel_all`] nothing scheduled before the
/// call is ever returned, whether or not it was already due.
///
/// [`pop_due`]: Scheduler::pop_due
/// [`cancel_all`]: Scheduler::cancel_all
#[derive(Debug)]
pub struct Scheduler<E> {
    next_id: u64,
    pending: BTreeMap<(u64, u64), E>,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn after(&mut self, now_ns: u64, delay: Duration, event: E) -> TimeoutHandle {
        self.at(now_ns.saturating_add(duration_ns(delay)), event)
    }

    pub fn at(&mut self, due_ns: u64, event: E) -> TimeoutHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert((due_ns, id), event);
        trace!("scheduled #{id} for {due_ns} ns");
        TimeoutHandle(id)
    }

    /// Idempotent; returns whether the event was still pending.
    pub fn cancel(&mut self, handle: TimeoutHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|&(_, id), _| id != handle.0);
        before != self.pending.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        if dropped > 0 {
            trace!("cancelled {dropped} pending events");
        }
        dropped
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.keys().next().map(|&(due, _)| due)
    }

    /// Earliest event due at or before `now_ns`, with its due time.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<(u64, E)> {
        match self.pending.first_key_value() {
            Some((&(due, _), _)) if due <= now_ns => {
                self.pending.pop_first().map(|((due, _), ev)| (due, ev))
            }
            _ => None,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

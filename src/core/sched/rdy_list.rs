//! Ready list - doubly linked list of TCBs at a given priority
//!
//! Each priority level has its own ready list. Tasks are appended at the
//! tail and scheduled from the head, which gives FIFO order within one
//! level and makes round-robin a head-to-tail rotation. Linkage runs
//! through the TCB arena by index, so the list itself is two indices.

use crate::task::OsTcb;
use crate::types::OsTaskId;

/// Ready list for a single priority level
#[derive(Debug, Clone, Copy)]
pub struct ReadyList {
    head: Option<OsTaskId>,
    tail: Option<OsTaskId>,
}

impl ReadyList {
    pub const fn new() -> Self {
        ReadyList {
            head: None,
            tail: None,
        }
    }

    /// First task to be scheduled at this priority
    #[inline]
    pub fn head(&self) -> Option<OsTaskId> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<OsTaskId> {
        self.tail
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append a task at the tail
    ///
    /// The task must not currently be linked into any ready list.
    pub fn insert_tail(&mut self, tcbs: &mut [OsTcb], id: OsTaskId) {
        tcbs[id as usize].rdy_next = None;
        tcbs[id as usize].rdy_prev = self.tail;

        match self.tail {
            Some(tail) => tcbs[tail as usize].rdy_next = Some(id),
            None => self.head = Some(id),
        }

        self.tail = Some(id);
    }

    /// Unlink a task from this list
    ///
    /// The task must currently be linked into this list.
    pub fn remove(&mut self, tcbs: &mut [OsTcb], id: OsTaskId) {
        let prev = tcbs[id as usize].rdy_prev;
        let next = tcbs[id as usize].rdy_next;

        match prev {
            Some(p) => tcbs[p as usize].rdy_next = next,
            None => self.head = next,
        }

        match next {
            Some(n) => tcbs[n as usize].rdy_prev = prev,
            None => self.tail = prev,
        }

        tcbs[id as usize].rdy_prev = None;
        tcbs[id as usize].rdy_next = None;
    }

    /// Rotate the head task to the tail, returning the new head
    pub fn rotate(&mut self, tcbs: &mut [OsTcb]) -> Option<OsTaskId> {
        let head = self.head?;
        if self.head == self.tail {
            return self.head;
        }
        self.remove(tcbs, head);
        self.insert_tail(tcbs, head);
        self.head
    }
}

impl Default for ReadyList {
    fn default() -> Self {
        Self::new()
    }
}

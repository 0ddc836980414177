//! Scheduler module
//!
//! Priority-based dispatch with FIFO ready lists per level. The dispatcher
//! never performs the stack swap itself: it selects the next task and the
//! port (or a test harness) commits the switch.

mod rdy_list;

pub use rdy_list::ReadyList;

use crate::kernel::Kernel;
use crate::types::{OsPrio, OsTaskId, OsTaskState};

impl Kernel {
    // ============ Dispatcher ============

    /// Main scheduling point
    ///
    /// Selects the highest priority ready task as `next`. Refuses to run
    /// while an ISR is active or while the scheduler lock is held above
    /// the level the unlock path itself maintains.
    pub(crate) fn schedule(&mut self) {
        if !self.running || self.int_nesting > 0 || self.lock_nesting > 1 {
            return;
        }

        self.sched_req = false;

        let high = self.prio_tbl.highest();
        let Some(head) = self.rdy[high as usize].head() else {
            return;
        };
        self.next = Some(head);
    }

    /// Whether the dispatcher selected a task other than the current one
    #[inline]
    pub fn switch_pending(&self) -> bool {
        self.next.is_some() && self.next != self.current
    }

    /// Commit the pending switch, returning the new current task
    ///
    /// On a target this runs inside the PendSV handler after the old
    /// context was saved; host tests call it to emulate the context switch.
    pub fn commit_switch(&mut self) -> Option<OsTaskId> {
        let next = self.next?;
        if Some(next) == self.current {
            return self.current;
        }

        if let Some(cur) = self.current {
            let tcb = &mut self.tcbs[cur as usize];
            if tcb.state == OsTaskState::Running {
                tcb.state = OsTaskState::Ready;
            }
        }

        self.tcbs[next as usize].state = OsTaskState::Running;
        self.current = Some(next);
        Some(next)
    }

    // ============ Ready list maintenance ============

    /// Link a task into the ready list for its priority
    pub(crate) fn rdy_insert(&mut self, id: OsTaskId) {
        let prio = self.tcbs[id as usize].prio;
        self.rdy[prio as usize].insert_tail(&mut self.tcbs, id);
        self.prio_tbl.set(prio);
        self.sched_req = true;
    }

    /// Unlink a task from the ready list for its priority
    pub(crate) fn rdy_remove(&mut self, id: OsTaskId) {
        let prio = self.tcbs[id as usize].prio;
        self.rdy[prio as usize].remove(&mut self.tcbs, id);
        if self.rdy[prio as usize].is_empty() {
            self.prio_tbl.clear(prio);
        }
    }

    /// Wake a task: mark it ready and request a reschedule
    pub(crate) fn make_ready(&mut self, id: OsTaskId) {
        self.tcbs[id as usize].state = OsTaskState::Ready;
        self.rdy_insert(id);
    }

    /// Move a ready/running task to a different priority level
    ///
    /// The caller has already decided the move; this only fixes the lists.
    pub(crate) fn rdy_change_prio(&mut self, id: OsTaskId, new_prio: OsPrio) {
        self.rdy_remove(id);
        self.tcbs[id as usize].prio = new_prio;
        self.rdy_insert(id);
    }

    /// Rotate the ready list at the current task's priority (round robin)
    pub(crate) fn sched_round_robin(&mut self) {
        if !self.cfg.round_robin {
            return;
        }
        let Some(cur) = self.current else { return };

        let tcb = &mut self.tcbs[cur as usize];
        if tcb.state != OsTaskState::Running {
            return;
        }
        if tcb.time_quanta_ctr > 0 {
            tcb.time_quanta_ctr -= 1;
        }
        if tcb.time_quanta_ctr > 0 {
            return;
        }
        tcb.time_quanta_ctr = tcb.time_quanta;

        let prio = tcb.prio;
        let list = &mut self.rdy[prio as usize];
        if list.head() != list.tail() {
            list.rotate(&mut self.tcbs);
            self.sched_req = true;
        }
    }
}

/// Yield to the next ready task at the current priority, if any
pub fn os_sched_yield() {
    crate::kernel::with(|k| {
        if let Some(cur) = k.current {
            let prio = k.tcbs[cur as usize].prio;
            let list = &mut k.rdy[prio as usize];
            if list.head() != list.tail() {
                list.rotate(&mut k.tcbs);
                k.sched_req = true;
                k.lock();
                k.unlock();
                crate::kernel::trigger_switch(k);
            }
        }
    });
}

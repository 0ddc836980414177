//! Event control blocks
//!
//! The generic blocking primitive underneath semaphores and mailboxes.
//! Each ECB carries a counter, an optional mail payload and a waiting
//! list of blocked tasks ordered FIFO or by priority. ECBs come from a
//! fixed table with an explicit free list.

use crate::config::CFG_MAX_EVENT;
use crate::error::{OsError, OsResult};
use crate::kernel::Kernel;
use crate::types::{
    OsDelOpt, OsEventId, OsEventType, OsMail, OsPendOn, OsPendStatus, OsSemCtr, OsSortType,
    OsTaskId, OsTick,
};

/// Event Control Block
pub struct OsEcb {
    /// Object type, `Invalid` while the slot is free
    pub event_type: OsEventType,
    /// Waiting-list ordering
    pub sort_type: OsSortType,
    /// Semaphore count, or mailbox occupied flag (0/1)
    pub counter: OsSemCtr,
    /// Semaphore ceiling
    pub initial_counter: OsSemCtr,
    /// Mailbox payload
    pub mail: OsMail,
    /// Table index of this ECB
    pub id: OsEventId,
    /// Head of the waiting list of blocked tasks
    pub wait_head: Option<OsTaskId>,
    /// Next free slot while this one is unused
    pub free_next: Option<OsEventId>,
}

impl OsEcb {
    pub const fn new() -> Self {
        OsEcb {
            event_type: OsEventType::Invalid,
            sort_type: OsSortType::Fifo,
            counter: 0,
            initial_counter: 0,
            mail: core::ptr::null_mut(),
            id: 0,
            wait_head: None,
            free_next: None,
        }
    }
}

impl Default for OsEcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsEcb {}
unsafe impl Sync for OsEcb {}

impl Kernel {
    // ============ Allocation ============

    /// Allocate an ECB from the free list
    pub(crate) fn event_create(
        &mut self,
        event_type: OsEventType,
        sort_type: OsSortType,
    ) -> OsResult<OsEventId> {
        self.lock();
        let Some(id) = self.free_event else {
            self.unlock();
            return Err(OsError::NoFreeEvent);
        };
        self.free_event = self.events[id as usize].free_next;
        self.unlock();

        let ecb = &mut self.events[id as usize];
        ecb.event_type = event_type;
        ecb.sort_type = sort_type;
        ecb.counter = 0;
        ecb.initial_counter = 0;
        ecb.mail = core::ptr::null_mut();
        ecb.wait_head = None;
        ecb.free_next = None;
        Ok(id)
    }

    /// Return an ECB to the free list
    fn event_release(&mut self, id: OsEventId) {
        self.events[id as usize].event_type = OsEventType::Invalid;
        self.lock();
        self.events[id as usize].free_next = self.free_event;
        self.free_event = Some(id);
        self.unlock();
    }

    /// Delete an event
    ///
    /// `NoPend` refuses while tasks are waiting; `Anyway` wakes every
    /// waiter with a deleted status first, tearing down delay-list
    /// membership as well.
    pub(crate) fn event_delete(
        &mut self,
        id: OsEventId,
        expected: OsEventType,
        opt: OsDelOpt,
    ) -> OsResult<()> {
        self.event_check(id, expected)?;

        match opt {
            OsDelOpt::NoPend => {
                if self.events[id as usize].wait_head.is_some() {
                    return Err(OsError::TaskWaiting);
                }
                self.event_release(id);
            }
            OsDelOpt::Anyway => {
                self.lock();
                while let Some(tid) = self.events[id as usize].wait_head {
                    self.event_unlink_waiter(tid);
                    if self.tcbs[tid as usize].is_delayed() {
                        self.dly_remove(tid);
                    }
                    let tcb = &mut self.tcbs[tid as usize];
                    tcb.pend_on = OsPendOn::Nothing;
                    tcb.pend_status = OsPendStatus::Del;
                    tcb.pmail = core::ptr::null_mut();
                    self.make_ready(tid);
                }
                self.unlock();
                self.event_release(id);
            }
        }
        Ok(())
    }

    /// Validate an event handle against the expected object type
    pub(crate) fn event_check(&self, id: OsEventId, expected: OsEventType) -> OsResult<()> {
        if self.cfg.par_check {
            if (id as usize) >= CFG_MAX_EVENT {
                return Err(OsError::InvalidId);
            }
            if self.events[id as usize].event_type != expected {
                return Err(OsError::InvalidId);
            }
        }
        Ok(())
    }

    // ============ Waiting list ============

    /// Insert a task into an event's waiting list per its sort order
    ///
    /// FIFO appends at the tail; priority order inserts before the first
    /// strictly lower-priority waiter, so equal priorities stay FIFO.
    pub(crate) fn wait_list_insert(&mut self, eid: OsEventId, tid: OsTaskId) {
        let head = self.events[eid as usize].wait_head;
        let by_prio = self.events[eid as usize].sort_type == OsSortType::Prio;
        let prio = self.tcbs[tid as usize].prio;

        self.tcbs[tid as usize].wait_next = None;
        self.tcbs[tid as usize].wait_prev = None;

        let Some(head) = head else {
            self.events[eid as usize].wait_head = Some(tid);
            return;
        };

        if by_prio && self.tcbs[head as usize].prio > prio {
            self.tcbs[tid as usize].wait_next = Some(head);
            self.tcbs[head as usize].wait_prev = Some(tid);
            self.events[eid as usize].wait_head = Some(tid);
            return;
        }

        let mut prev = head;
        let mut cur = self.tcbs[head as usize].wait_next;
        while let Some(c) = cur {
            if by_prio && self.tcbs[c as usize].prio > prio {
                break;
            }
            prev = c;
            cur = self.tcbs[c as usize].wait_next;
        }

        self.tcbs[tid as usize].wait_prev = Some(prev);
        self.tcbs[tid as usize].wait_next = cur;
        self.tcbs[prev as usize].wait_next = Some(tid);
        if let Some(c) = cur {
            self.tcbs[c as usize].wait_prev = Some(tid);
        }
    }

    /// Block the current task on an event
    ///
    /// Links it onto the waiting list and, with a nonzero timeout, onto
    /// the delay list as well. The caller holds the scheduler lock.
    pub(crate) fn event_task_to_wait(
        &mut self,
        eid: OsEventId,
        tid: OsTaskId,
        pend_on: OsPendOn,
        timeout: OsTick,
    ) {
        self.rdy_remove(tid);

        let tcb = &mut self.tcbs[tid as usize];
        tcb.state = crate::types::OsTaskState::Waiting;
        tcb.pend_on = pend_on;
        tcb.pend_status = OsPendStatus::Ok;
        tcb.pmail = core::ptr::null_mut();
        tcb.event_id = Some(eid);

        self.wait_list_insert(eid, tid);
        if timeout > 0 {
            self.dly_insert(tid, timeout);
        }
        self.sched_req = true;
    }

    /// Wake the first waiter of an event
    ///
    /// Unlinks it from the waiting list and from the delay list if it was
    /// pending with a timeout, records a successful pend and readies it.
    /// Returns the woken task so the caller can hand over the payload.
    pub(crate) fn event_wake_first(&mut self, eid: OsEventId) -> Option<OsTaskId> {
        let tid = self.events[eid as usize].wait_head?;

        self.event_unlink_waiter(tid);
        if self.tcbs[tid as usize].is_delayed() {
            self.dly_remove(tid);
        }

        let tcb = &mut self.tcbs[tid as usize];
        tcb.pend_on = OsPendOn::Nothing;
        tcb.pend_status = OsPendStatus::Ok;

        self.make_ready(tid);
        Some(tid)
    }

    /// Unlink a task from its event's waiting list
    pub(crate) fn event_unlink_waiter(&mut self, tid: OsTaskId) {
        let Some(eid) = self.tcbs[tid as usize].event_id else {
            return;
        };

        let prev = self.tcbs[tid as usize].wait_prev;
        let next = self.tcbs[tid as usize].wait_next;

        match prev {
            Some(p) => self.tcbs[p as usize].wait_next = next,
            None => self.events[eid as usize].wait_head = next,
        }
        if let Some(n) = next {
            self.tcbs[n as usize].wait_prev = prev;
        }

        let tcb = &mut self.tcbs[tid as usize];
        tcb.wait_prev = None;
        tcb.wait_next = None;
        tcb.event_id = None;
    }

    // ============ Pend completion ============

    /// Read back the outcome of a pend after the task was woken
    ///
    /// Consumes the mail handed over by the waker. Exactly one of the wake
    /// path and the timeout path ran; this maps whichever it was onto the
    /// caller's result.
    pub fn pend_result(&mut self, tid: OsTaskId) -> OsResult<OsMail> {
        let tcb = &mut self.tcbs[tid as usize];
        match tcb.pend_status {
            OsPendStatus::Ok => {
                let mail = tcb.pmail;
                tcb.pmail = core::ptr::null_mut();
                Ok(mail)
            }
            OsPendStatus::Timeout => Err(OsError::Timeout),
            OsPendStatus::Del => Err(OsError::ObjDel),
        }
    }

    /// Counter of an event, for semaphore counts and mailbox state checks
    pub fn event_counter(&self, id: OsEventId) -> OsResult<OsSemCtr> {
        if (id as usize) >= CFG_MAX_EVENT {
            return Err(OsError::InvalidId);
        }
        Ok(self.events[id as usize].counter)
    }
}

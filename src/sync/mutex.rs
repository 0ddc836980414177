//! Mutex implementation with priority inheritance
//!
//! An immediate priority-inheritance protocol: while a mutex is held, the
//! owner's effective priority is never below that of any task blocked on
//! it. Waiters queue in arrival order; the highest-priority waiter is
//! tracked out-of-band in `hipri_task` so the common release path avoids
//! a rescan. Mutexes come from a monotonically increasing free-ID counter
//! and are never deleted.

use crate::config::CFG_MAX_MUTEX;
use crate::error::{OsError, OsResult};
use crate::kernel::{self, Kernel};
use crate::types::{OsMutexId, OsPend, OsPendOn, OsPendStatus, OsPrio, OsTaskId, OsTaskState};

/// Mutex occupancy state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsMutexState {
    Free = 0,
    Occupied = 1,
}

/// Mutex control block
pub struct OsMutexCb {
    /// Occupancy flag
    pub flag: OsMutexState,
    /// Current owner
    pub owner: Option<OsTaskId>,
    /// Highest-priority waiter recorded incrementally on entry
    pub hipri_task: Option<OsTaskId>,
    /// Owner's priority before any inheritance boost
    pub original_prio: OsPrio,
    /// Head of the waiting list, arrival order
    pub wait_head: Option<OsTaskId>,
}

impl OsMutexCb {
    pub const fn new() -> Self {
        OsMutexCb {
            flag: OsMutexState::Free,
            owner: None,
            hipri_task: None,
            original_prio: 0,
            wait_head: None,
        }
    }
}

impl Default for OsMutexCb {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Create a mutex
    pub fn mutex_create(&mut self) -> OsResult<OsMutexId> {
        self.lock();
        if (self.mutex_free_id as usize) >= CFG_MAX_MUTEX {
            self.unlock();
            return Err(OsError::NoFreeMutex);
        }
        let id = self.mutex_free_id;
        self.mutex_free_id += 1;
        self.unlock();

        self.mutexes[id as usize] = OsMutexCb::new();
        Ok(id)
    }

    fn mutex_check(&self, id: OsMutexId) -> OsResult<()> {
        if self.cfg.par_check && id >= self.mutex_free_id {
            return Err(OsError::InvalidId);
        }
        Ok(())
    }

    /// Minimum priority among a mutex's waiters
    ///
    /// The single source of truth for every rescan: release with an
    /// untracked promotion, waiter removal, and waiter priority changes
    /// all call this over the same waiting-list snapshot.
    pub(crate) fn mutex_min_waiter(&self, id: OsMutexId) -> Option<(OsTaskId, OsPrio)> {
        let mut best: Option<(OsTaskId, OsPrio)> = None;
        let mut cur = self.mutexes[id as usize].wait_head;
        while let Some(t) = cur {
            let p = self.tcbs[t as usize].prio;
            if best.map_or(true, |(_, bp)| p < bp) {
                best = Some((t, p));
            }
            cur = self.tcbs[t as usize].wait_next;
        }
        best
    }

    // ============ Enter ============

    /// Enter the critical region guarded by the mutex
    ///
    /// A free mutex is taken at the caller's own priority. When another
    /// task holds it, the owner is promoted to the caller's priority
    /// immediately if lower, and the caller is appended to the waiting
    /// list in arrival order and blocks. Complete a `Blocked` entry with
    /// [`Kernel::pend_result`] once the handoff woke the task.
    pub fn mutex_enter(&mut self, id: OsMutexId) -> OsResult<OsPend> {
        if self.int_nesting > 0 {
            return Err(OsError::CallInIsr);
        }
        if !self.running {
            return Err(OsError::OsNotRunning);
        }
        if self.lock_nesting > 0 {
            return Err(OsError::SchedInLock);
        }
        self.mutex_check(id)?;
        let cur = self.current.ok_or(OsError::OsNotRunning)?;

        self.lock();

        if self.mutexes[id as usize].flag == OsMutexState::Free {
            let m = &mut self.mutexes[id as usize];
            m.flag = OsMutexState::Occupied;
            m.owner = Some(cur);
            m.hipri_task = Some(cur);
            m.original_prio = self.tcbs[cur as usize].prio;
            self.tcbs[cur as usize].mutex_id = Some(id);
            self.unlock();
            return Ok(OsPend::Acquired);
        }

        let owner = self.mutexes[id as usize].owner.unwrap_or(cur);
        if owner == cur {
            self.unlock();
            return Err(OsError::MutexOwner);
        }

        let cur_prio = self.tcbs[cur as usize].prio;
        if self.tcbs[owner as usize].prio > cur_prio {
            // Immediate inheritance: promote the owner before blocking
            self.mutexes[id as usize].hipri_task = Some(cur);
            self.apply_prio(owner, cur_prio);
            crate::trace!("mutex {}: owner {} inherits prio {}", id, owner, cur_prio);
        }

        let tcb = &mut self.tcbs[cur as usize];
        tcb.mutex_id = Some(id);
        tcb.pend_on = OsPendOn::Mutex;
        tcb.pend_status = OsPendStatus::Ok;
        tcb.wait_next = None;
        tcb.wait_prev = None;

        self.rdy_remove(cur);
        self.tcbs[cur as usize].state = OsTaskState::Waiting;
        self.mutex_wait_append(id, cur);
        self.sched_req = true;

        self.unlock();
        Ok(OsPend::Blocked)
    }

    /// Append a task at the tail of a mutex waiting list
    fn mutex_wait_append(&mut self, id: OsMutexId, tid: OsTaskId) {
        match self.mutexes[id as usize].wait_head {
            None => self.mutexes[id as usize].wait_head = Some(tid),
            Some(head) => {
                let mut tail = head;
                while let Some(n) = self.tcbs[tail as usize].wait_next {
                    tail = n;
                }
                self.tcbs[tail as usize].wait_next = Some(tid);
                self.tcbs[tid as usize].wait_prev = Some(tail);
            }
        }
    }

    // ============ Leave ============

    /// Leave the critical region guarded by the mutex
    ///
    /// With no waiters the mutex frees and the owner's priority is
    /// restored. Otherwise the priority to hand to the next owner is
    /// determined — by a full waiting-list scan when the recorded highest
    /// waiter never promoted the owner, or from the owner's boosted
    /// priority when it did — the outgoing owner returns to its original
    /// priority, and the first-arrived waiter takes the mutex at the
    /// determined priority.
    pub fn mutex_leave(&mut self, id: OsMutexId) -> OsResult<()> {
        if self.int_nesting > 0 {
            return Err(OsError::CallInIsr);
        }
        self.mutex_check(id)?;

        let cur = self.current.ok_or(OsError::OsNotRunning)?;
        if self.mutexes[id as usize].flag != OsMutexState::Occupied
            || self.mutexes[id as usize].owner != Some(cur)
        {
            return Err(OsError::NotMutexOwner);
        }

        self.lock();
        self.tcbs[cur as usize].mutex_id = None;

        let original_prio = self.mutexes[id as usize].original_prio;

        if self.mutexes[id as usize].wait_head.is_none() {
            let m = &mut self.mutexes[id as usize];
            m.flag = OsMutexState::Free;
            m.owner = None;
            m.hipri_task = None;
            if self.tcbs[cur as usize].prio != original_prio {
                self.apply_prio(cur, original_prio);
            }
            self.unlock();
            return Ok(());
        }

        let handoff_prio = if self.mutexes[id as usize].hipri_task == Some(cur) {
            // Never promoted beyond the recorded waiter; the true highest
            // priority must come from a scan
            let (t, p) = self.mutex_min_waiter(id).unwrap_or((cur, original_prio));
            self.mutexes[id as usize].hipri_task = Some(t);
            p
        } else {
            self.tcbs[cur as usize].prio
        };

        if self.tcbs[cur as usize].prio != original_prio {
            self.apply_prio(cur, original_prio);
        }

        // Hand the mutex to the first-arrived waiter
        let next_owner = self.mutexes[id as usize].wait_head.unwrap();
        self.mutex_wait_unlink(id, next_owner);

        let m = &mut self.mutexes[id as usize];
        m.owner = Some(next_owner);
        m.original_prio = self.tcbs[next_owner as usize].prio;

        let tcb = &mut self.tcbs[next_owner as usize];
        tcb.pend_on = OsPendOn::Nothing;
        tcb.pend_status = OsPendStatus::Ok;
        tcb.prio = handoff_prio;

        self.make_ready(next_owner);
        self.unlock();
        Ok(())
    }

    // ============ Waiter removal ============

    /// Unlink a task from a mutex waiting list
    fn mutex_wait_unlink(&mut self, id: OsMutexId, tid: OsTaskId) {
        let prev = self.tcbs[tid as usize].wait_prev;
        let next = self.tcbs[tid as usize].wait_next;

        match prev {
            Some(p) => self.tcbs[p as usize].wait_next = next,
            None => self.mutexes[id as usize].wait_head = next,
        }
        if let Some(n) = next {
            self.tcbs[n as usize].wait_prev = prev;
        }

        self.tcbs[tid as usize].wait_prev = None;
        self.tcbs[tid as usize].wait_next = None;
    }

    /// Remove a task that is being deleted from its mutex waiting list
    ///
    /// When the removed task was the tracked highest-priority waiter, the
    /// remaining list is rescanned and the (possibly reduced) inherited
    /// priority is re-applied to the current owner.
    pub(crate) fn mutex_remove_waiter(&mut self, tid: OsTaskId) {
        let Some(id) = self.tcbs[tid as usize].mutex_id else {
            return;
        };

        self.mutex_wait_unlink(id, tid);
        self.tcbs[tid as usize].mutex_id = None;
        self.tcbs[tid as usize].pend_on = OsPendOn::Nothing;

        if self.mutexes[id as usize].hipri_task == Some(tid) {
            self.mutex_reapply_inherit(id);
        }
    }

    /// Recompute and re-apply the owner's inherited priority
    ///
    /// The inherited level is the minimum of the owner's original priority
    /// and every remaining waiter's priority.
    pub(crate) fn mutex_reapply_inherit(&mut self, id: OsMutexId) {
        let Some(owner) = self.mutexes[id as usize].owner else {
            return;
        };

        let original = self.mutexes[id as usize].original_prio;
        let (hipri, prio) = match self.mutex_min_waiter(id) {
            Some((t, p)) if p < original => (Some(t), p),
            _ => (Some(owner), original),
        };
        self.mutexes[id as usize].hipri_task = hipri;

        if self.tcbs[owner as usize].prio != prio {
            self.apply_prio(owner, prio);
        }
    }

    // ============ Queries ============

    /// Current owner of the mutex
    pub fn mutex_owner(&self, id: OsMutexId) -> OsResult<Option<OsTaskId>> {
        if (id as usize) >= CFG_MAX_MUTEX {
            return Err(OsError::InvalidId);
        }
        Ok(self.mutexes[id as usize].owner)
    }

    /// Effective priority of the mutex owner, if owned
    pub fn mutex_owner_prio(&self, id: OsMutexId) -> OsResult<Option<OsPrio>> {
        Ok(self
            .mutex_owner(id)?
            .map(|t| self.tcbs[t as usize].prio))
    }
}

// ============ Public API (global instance) ============

/// Create a mutex on the global kernel
pub fn os_mutex_create() -> OsResult<OsMutexId> {
    kernel::with(|k| k.mutex_create())
}

/// Enter the critical region guarded by the mutex, blocking while held
pub fn os_mutex_enter(id: OsMutexId) -> OsResult<()> {
    let pend = kernel::with(|k| {
        let r = k.mutex_enter(id);
        kernel::trigger_switch(k);
        r
    })?;

    match pend {
        OsPend::Acquired => Ok(()),
        OsPend::Blocked => {
            // Execution resumes here once the mutex was handed over
            kernel::with(|k| {
                let cur = k.current_task().ok_or(OsError::OsNotRunning)?;
                k.pend_result(cur).map(|_| ())
            })
        }
    }
}

/// Leave the critical region guarded by the mutex
pub fn os_mutex_leave(id: OsMutexId) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.mutex_leave(id);
        kernel::trigger_switch(k);
        r
    })
}

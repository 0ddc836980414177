//! Semaphore implementation
//!
//! Counting semaphores built on the event control block. A post with
//! waiters present hands the token straight to the first waiter, so the
//! counter never leaves `0..=initial_counter` at any observable point.

use crate::error::{OsError, OsResult};
use crate::kernel::{self, Kernel};
use crate::types::{
    OsDelOpt, OsEventId, OsEventType, OsPend, OsPendOn, OsSemCtr, OsSortType, OsTick,
};

impl Kernel {
    /// Create a counting semaphore
    ///
    /// # Arguments
    /// * `init_cnt` - Initial count
    /// * `max_cnt` - Ceiling the counter may never exceed
    /// * `sort_type` - Waiting-list ordering
    pub fn sem_create(
        &mut self,
        init_cnt: OsSemCtr,
        max_cnt: OsSemCtr,
        sort_type: OsSortType,
    ) -> OsResult<OsEventId> {
        if self.cfg.par_check && init_cnt > max_cnt {
            return Err(OsError::InvalidParameter);
        }

        let id = self.event_create(OsEventType::Sem, sort_type)?;
        self.events[id as usize].counter = init_cnt;
        self.events[id as usize].initial_counter = max_cnt;
        Ok(id)
    }

    /// Delete a semaphore
    pub fn sem_del(&mut self, id: OsEventId, opt: OsDelOpt) -> OsResult<()> {
        self.event_delete(id, OsEventType::Sem, opt)
    }

    /// Take the semaphore without blocking
    pub fn sem_accept(&mut self, id: OsEventId) -> OsResult<()> {
        self.event_check(id, OsEventType::Sem)?;

        self.lock();
        let r = if self.events[id as usize].counter > 0 {
            self.events[id as usize].counter -= 1;
            Ok(())
        } else {
            Err(OsError::SemEmpty)
        };
        self.unlock();
        r
    }

    /// Wait for the semaphore
    ///
    /// Decrements and acquires immediately when the count is positive;
    /// otherwise the current task blocks, with `timeout` ticks before the
    /// pend times out (0 = wait forever). Complete a `Blocked` pend with
    /// [`Kernel::pend_result`] once the task has been woken.
    pub fn sem_pend(&mut self, id: OsEventId, timeout: OsTick) -> OsResult<OsPend> {
        if self.int_nesting > 0 {
            return Err(OsError::CallInIsr);
        }
        if !self.running {
            return Err(OsError::OsNotRunning);
        }
        self.event_check(id, OsEventType::Sem)?;
        if self.lock_nesting > 0 {
            return Err(OsError::SchedInLock);
        }
        let cur = self.current.ok_or(OsError::OsNotRunning)?;

        self.lock();
        if self.events[id as usize].counter > 0 {
            self.events[id as usize].counter -= 1;
            self.unlock();
            return Ok(OsPend::Acquired);
        }

        self.event_task_to_wait(id, cur, OsPendOn::Semaphore, timeout);
        self.unlock();
        Ok(OsPend::Blocked)
    }

    /// Signal the semaphore
    ///
    /// Wakes the first waiter per the sort order, or increments the
    /// counter when nobody waits. Fails with `SemFull` at the ceiling.
    pub fn sem_post(&mut self, id: OsEventId) -> OsResult<()> {
        self.event_check(id, OsEventType::Sem)?;

        if self.events[id as usize].counter == self.events[id as usize].initial_counter {
            return Err(OsError::SemFull);
        }

        self.lock();
        if self.event_wake_first(id).is_none() {
            self.events[id as usize].counter += 1;
        }
        self.unlock();
        Ok(())
    }

    /// Signal the semaphore from an interrupt handler
    ///
    /// While the scheduler is locked the post is deferred onto the
    /// service-request queue instead of touching the waiting lists.
    pub fn isr_sem_post(&mut self, id: OsEventId) -> OsResult<()> {
        if self.lock_nesting > 0 {
            self.srq.push_sem_post(id)
        } else {
            self.sem_post(id)
        }
    }

    /// Current semaphore count
    pub fn sem_count(&self, id: OsEventId) -> OsResult<OsSemCtr> {
        self.event_check(id, OsEventType::Sem)?;
        self.event_counter(id)
    }
}

// ============ Public API (global instance) ============

/// Create a semaphore on the global kernel
pub fn os_sem_create(
    init_cnt: OsSemCtr,
    max_cnt: OsSemCtr,
    sort_type: OsSortType,
) -> OsResult<OsEventId> {
    kernel::with(|k| k.sem_create(init_cnt, max_cnt, sort_type))
}

/// Delete a semaphore on the global kernel
pub fn os_sem_del(id: OsEventId, opt: OsDelOpt) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.sem_del(id, opt);
        kernel::trigger_switch(k);
        r
    })
}

/// Take the semaphore without blocking
pub fn os_sem_accept(id: OsEventId) -> OsResult<()> {
    kernel::with(|k| k.sem_accept(id))
}

/// Wait for the semaphore, blocking up to `timeout` ticks (0 = forever)
pub fn os_sem_pend(id: OsEventId, timeout: OsTick) -> OsResult<()> {
    let pend = kernel::with(|k| {
        let r = k.sem_pend(id, timeout);
        kernel::trigger_switch(k);
        r
    })?;

    match pend {
        OsPend::Acquired => Ok(()),
        OsPend::Blocked => {
            // Execution resumes here after the task was woken
            kernel::with(|k| {
                let cur = k.current_task().ok_or(OsError::OsNotRunning)?;
                k.pend_result(cur).map(|_| ())
            })
        }
    }
}

/// Signal the semaphore
pub fn os_sem_post(id: OsEventId) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.sem_post(id);
        kernel::trigger_switch(k);
        r
    })
}

/// Signal the semaphore from an ISR
pub fn isr_sem_post(id: OsEventId) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.isr_sem_post(id);
        kernel::trigger_switch(k);
        r
    })
}

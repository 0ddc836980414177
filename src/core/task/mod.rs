//! Task management module
//!
//! Task creation, deletion and priority changes. TCBs come from a fixed
//! arena with a free list; the idle task occupies the first slot and is
//! protected from deletion and priority changes.

mod tcb;

pub use tcb::OsTcb;

use crate::config::{CFG_MAX_TASKS, CFG_PRIO_IDLE, CFG_STK_SIZE_MIN, CFG_TIME_QUANTA_DEFAULT};
use crate::error::{OsError, OsResult};
use crate::kernel::{self, Kernel};
use crate::types::{
    OsEventId, OsPendOn, OsPrio, OsSortType, OsStkElement, OsTaskId, OsTaskState,
};

/// Task entry point function type
pub type OsTaskFn = fn(*mut ()) -> !;

impl Kernel {
    // ============ Creation ============

    /// Create a task and make it ready
    ///
    /// # Arguments
    /// * `name` - Task name for debugging
    /// * `entry` - Task entry point
    /// * `arg` - Argument passed to the entry point
    /// * `prio` - Task priority (0 = highest; the idle level is reserved)
    /// * `stk_base` / `stk_size` - Stack area in words
    ///
    /// If the kernel is running and the new task outranks the current one,
    /// a reschedule is requested.
    pub fn task_create(
        &mut self,
        name: &'static str,
        entry: OsTaskFn,
        arg: *mut (),
        prio: OsPrio,
        stk_base: *mut OsStkElement,
        stk_size: usize,
    ) -> OsResult<OsTaskId> {
        self.task_create_inner(name, entry, arg, prio, stk_base, stk_size, false)
    }

    pub(crate) fn task_create_inner(
        &mut self,
        name: &'static str,
        entry: OsTaskFn,
        arg: *mut (),
        prio: OsPrio,
        stk_base: *mut OsStkElement,
        stk_size: usize,
        sys_task: bool,
    ) -> OsResult<OsTaskId> {
        if !self.initialized {
            return Err(OsError::OsNotInit);
        }
        if self.int_nesting > 0 {
            return Err(OsError::CallInIsr);
        }
        if self.cfg.par_check {
            let prio_limit = if sys_task { CFG_PRIO_IDLE + 1 } else { CFG_PRIO_IDLE };
            if prio >= prio_limit {
                return Err(OsError::PrioInvalid);
            }
            if stk_base.is_null() || stk_size < CFG_STK_SIZE_MIN {
                return Err(OsError::StkInvalid);
            }
        }

        self.lock();

        let Some(id) = self.free_tcb else {
            self.unlock();
            return Err(OsError::NoFreeTcb);
        };
        self.free_tcb = self.tcbs[id as usize].free_next;

        let stk_ptr = unsafe { crate::port::os_task_stk_init(entry, arg, stk_base, stk_size) };

        let tcb = &mut self.tcbs[id as usize];
        tcb.reset();
        tcb.name = name;
        tcb.prio = prio;
        tcb.stk_ptr = stk_ptr;
        tcb.stk_base = stk_base;
        tcb.stk_size = stk_size;
        tcb.time_quanta = CFG_TIME_QUANTA_DEFAULT;
        tcb.time_quanta_ctr = CFG_TIME_QUANTA_DEFAULT;

        self.make_ready(id);
        self.unlock();

        crate::trace!("task {} created at prio {}", id, prio);
        Ok(id)
    }

    // ============ Deletion ============

    /// Delete a task and recycle its TCB
    ///
    /// The task is unlinked from whichever lists it belongs to: ready,
    /// delay, event waiting, or a mutex waiting list (re-applying priority
    /// inheritance to the mutex owner when the deleted task was its
    /// tracked highest-priority waiter). Deleting the current task
    /// requests an immediate reschedule and does not return to it.
    pub fn task_del(&mut self, id: OsTaskId) -> OsResult<()> {
        if self.int_nesting > 0 {
            return Err(OsError::CallInIsr);
        }
        if self.cfg.par_check && (id as usize) >= CFG_MAX_TASKS {
            return Err(OsError::InvalidId);
        }
        if id == self.idle_task {
            return Err(OsError::ProtectedTask);
        }
        if self.tcbs[id as usize].state == OsTaskState::Dormant {
            return Err(OsError::InvalidId);
        }

        self.lock();

        match self.tcbs[id as usize].state {
            OsTaskState::Ready | OsTaskState::Running => {
                self.rdy_remove(id);
            }
            OsTaskState::Waiting => {
                if self.tcbs[id as usize].is_delayed() {
                    self.dly_remove(id);
                }
                if self.tcbs[id as usize].event_id.is_some() {
                    self.event_unlink_waiter(id);
                }
                #[cfg(feature = "mutex")]
                if self.tcbs[id as usize].pend_on == OsPendOn::Mutex {
                    self.mutex_remove_waiter(id);
                }
            }
            OsTaskState::Dormant => {}
        }

        let tcb = &mut self.tcbs[id as usize];
        tcb.reset();
        tcb.free_next = self.free_tcb;
        self.free_tcb = Some(id);

        if self.current == Some(id) {
            self.current = None;
            self.sched_req = true;
        }

        self.unlock();

        crate::trace!("task {} deleted", id);
        Ok(())
    }

    // ============ Priority ============

    /// Change a task's priority
    ///
    /// When the task owns a mutex this updates the priority the mutex will
    /// restore on release; the effective priority is only lowered once no
    /// inherited boost outranks the request. When the task waits on a
    /// mutex, the owner's inherited priority is recomputed.
    pub fn set_prio(&mut self, id: OsTaskId, prio: OsPrio) -> OsResult<()> {
        if id == self.idle_task {
            return Err(OsError::ProtectedTask);
        }
        if self.cfg.par_check {
            if (id as usize) >= CFG_MAX_TASKS {
                return Err(OsError::InvalidId);
            }
            if prio >= CFG_PRIO_IDLE {
                return Err(OsError::PrioInvalid);
            }
        }
        if self.tcbs[id as usize].state == OsTaskState::Dormant {
            return Err(OsError::InvalidId);
        }
        if self.tcbs[id as usize].prio == prio {
            return Ok(());
        }

        #[cfg(feature = "mutex")]
        if let Some(mid) = self.tcbs[id as usize].mutex_id {
            if self.mutexes[mid as usize].owner == Some(id) {
                self.mutexes[mid as usize].original_prio = prio;
                if self.tcbs[id as usize].prio < prio {
                    // Holding an inherited boost above the requested level;
                    // the restore on release will apply it.
                    return Ok(());
                }
            }
        }

        self.lock();
        self.apply_prio(id, prio);
        self.unlock();
        Ok(())
    }

    /// Apply an effective priority to a task in whatever list it occupies
    ///
    /// Used both by `set_prio` and by the mutex inheritance protocol, so a
    /// promotion is visible to every scheduling decision the task is
    /// subject to: ready lists are reordered, priority-sorted event
    /// waiting lists are re-sorted, and a further mutex owner down a
    /// blocking chain inherits in turn.
    pub(crate) fn apply_prio(&mut self, id: OsTaskId, prio: OsPrio) {
        if self.tcbs[id as usize].prio == prio {
            return;
        }

        match self.tcbs[id as usize].state {
            OsTaskState::Ready => {
                self.rdy_change_prio(id, prio);
            }
            OsTaskState::Running => {
                self.rdy_change_prio(id, prio);
            }
            OsTaskState::Waiting => {
                self.tcbs[id as usize].prio = prio;

                #[cfg(feature = "mutex")]
                if self.tcbs[id as usize].pend_on == OsPendOn::Mutex {
                    if let Some(mid) = self.tcbs[id as usize].mutex_id {
                        self.mutex_reapply_inherit(mid);
                    }
                }
                if let Some(eid) = self.tcbs[id as usize].event_id {
                    self.event_resort_waiter(eid, id);
                }
            }
            OsTaskState::Dormant => {}
        }
    }

    /// Re-sort a waiter inside a priority-ordered event waiting list
    pub(crate) fn event_resort_waiter(&mut self, eid: OsEventId, id: OsTaskId) {
        if self.events[eid as usize].sort_type == OsSortType::Prio {
            self.event_unlink_waiter(id);
            self.tcbs[id as usize].event_id = Some(eid);
            self.wait_list_insert(eid, id);
        }
    }
}

// ============ Public API (global instance) ============

/// Create a task on the global kernel
///
/// # Example
/// ```ignore
/// static mut TASK_STK: [OsStkElement; 256] = [0; 256];
///
/// fn worker(_: *mut ()) -> ! {
///     loop { /* ... */ }
/// }
///
/// let id = os_task_create("worker", worker, core::ptr::null_mut(), 5, unsafe {
///     &mut TASK_STK
/// })?;
/// ```
pub fn os_task_create(
    name: &'static str,
    entry: OsTaskFn,
    arg: *mut (),
    prio: OsPrio,
    stack: &'static mut [OsStkElement],
) -> OsResult<OsTaskId> {
    kernel::with(|k| {
        let r = k.task_create(name, entry, arg, prio, stack.as_mut_ptr(), stack.len());
        kernel::trigger_switch(k);
        r
    })
}

/// Delete a task on the global kernel
pub fn os_task_del(id: OsTaskId) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.task_del(id);
        kernel::trigger_switch(k);
        r
    })
}

/// Change a task's priority on the global kernel
pub fn os_set_prio(id: OsTaskId, prio: OsPrio) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.set_prio(id, prio);
        kernel::trigger_switch(k);
        r
    })
}

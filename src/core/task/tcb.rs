//! Task Control Block (TCB) definition
//!
//! TCBs live in a fixed arena inside the kernel context and reference each
//! other by index, never by pointer. Each list a task can belong to has its
//! own pair of link fields: the ready list, the event/mutex waiting list,
//! and the delay list. Ready and waiting membership are mutually exclusive,
//! but a task pending with a timeout sits on the waiting list *and* the
//! delay list at once, so those links must not be shared.

use crate::types::{
    OsEventId, OsMail, OsMutexId, OsPendOn, OsPendStatus, OsPrio, OsStkElement, OsTaskId,
    OsTaskState, OsTick,
};

/// Task Control Block
pub struct OsTcb {
    // ============ Identity ============
    /// Arena index of this TCB
    pub task_id: OsTaskId,
    /// Task name
    pub name: &'static str,

    // ============ Stack ============
    /// Saved stack pointer, updated by the port on context switch
    pub stk_ptr: *mut OsStkElement,
    /// Base of the stack area
    pub stk_base: *mut OsStkElement,
    /// Stack size in words
    pub stk_size: usize,

    // ============ Priority and state ============
    /// Current (possibly inherited) priority
    pub prio: OsPrio,
    /// Current task state
    pub state: OsTaskState,

    // ============ Ready list links ============
    pub rdy_next: Option<OsTaskId>,
    pub rdy_prev: Option<OsTaskId>,

    // ============ Event / mutex waiting list links ============
    pub wait_next: Option<OsTaskId>,
    pub wait_prev: Option<OsTaskId>,
    /// What the task is blocked on
    pub pend_on: OsPendOn,
    /// Outcome recorded by the waker or the timeout path
    pub pend_status: OsPendStatus,
    /// Event the task waits on, if any
    pub event_id: Option<OsEventId>,
    /// Mutex the task owns or waits on, if any
    pub mutex_id: Option<OsMutexId>,

    // ============ Delay list links ============
    pub dly_next: Option<OsTaskId>,
    pub dly_prev: Option<OsTaskId>,
    /// Delta ticks relative to the previous delay-list node;
    /// `None` while the task is not delayed
    pub delay_tick: Option<OsTick>,

    // ============ Message ============
    /// Mail handed over by a mailbox post
    pub pmail: OsMail,

    // ============ Round robin ============
    /// Time quanta assigned to this task
    pub time_quanta: OsTick,
    /// Remaining quanta in the current slice
    pub time_quanta_ctr: OsTick,

    // ============ Free list ============
    /// Next free TCB while this slot is dormant
    pub free_next: Option<OsTaskId>,
}

impl OsTcb {
    pub const fn new() -> Self {
        OsTcb {
            task_id: 0,
            name: "",

            stk_ptr: core::ptr::null_mut(),
            stk_base: core::ptr::null_mut(),
            stk_size: 0,

            prio: 0,
            state: OsTaskState::Dormant,

            rdy_next: None,
            rdy_prev: None,

            wait_next: None,
            wait_prev: None,
            pend_on: OsPendOn::Nothing,
            pend_status: OsPendStatus::Ok,
            event_id: None,
            mutex_id: None,

            dly_next: None,
            dly_prev: None,
            delay_tick: None,

            pmail: core::ptr::null_mut(),

            time_quanta: 0,
            time_quanta_ctr: 0,

            free_next: None,
        }
    }

    /// Reset every field except identity and free-list linkage
    pub fn reset(&mut self) {
        let id = self.task_id;
        let free_next = self.free_next;
        *self = Self::new();
        self.task_id = id;
        self.free_next = free_next;
    }

    /// Whether the task currently sits on the delay list
    #[inline]
    pub fn is_delayed(&self) -> bool {
        self.delay_tick.is_some()
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsTcb {}
unsafe impl Sync for OsTcb {}

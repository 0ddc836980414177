//! Kernel context and lifecycle
//!
//! All mutable kernel state — nesting counters, the reschedule request,
//! the TCB arena, ready lists, the delay list, event and mutex tables and
//! the ISR service-request queue — lives in one [`Kernel`] struct. The
//! embedded API operates on a single global instance behind a [`CsCell`];
//! tests construct private instances and drive them directly.

use crate::config::{
    KernelConfig, CFG_IDLE_STACK_SIZE, CFG_MAX_EVENT, CFG_MAX_TASKS, CFG_PRIO_IDLE, CFG_PRIO_MAX,
};
use crate::core::cs_cell::CsCell;
use crate::critical::critical_section;
use crate::error::{OsError, OsResult};
use crate::prio::PrioTable;
use crate::sched::ReadyList;
use crate::sync::event::OsEcb;
#[cfg(feature = "mutex")]
use crate::sync::mutex::OsMutexCb;
use crate::sync::srq::ServiceReq;
use crate::task::{OsTaskFn, OsTcb};
use crate::types::{OsEventId, OsMutexId, OsNestingCtr, OsStkElement, OsTaskId, OsTaskState};

/// Kernel context
///
/// One instance is one independent kernel: it owns every table and every
/// counter, and all operations are methods on it.
pub struct Kernel {
    /// Runtime configuration
    pub(crate) cfg: KernelConfig,

    // ============ Lifecycle flags ============
    pub(crate) initialized: bool,
    pub(crate) running: bool,

    // ============ Nesting counters ============
    /// Interrupt nesting depth
    pub(crate) int_nesting: OsNestingCtr,
    /// Scheduler lock nesting; the dispatcher only runs when this
    /// returns to zero (or one, during the unlock itself)
    pub(crate) lock_nesting: OsNestingCtr,
    /// A reschedule was requested while the dispatcher could not run
    pub(crate) sched_req: bool,

    // ============ Time ============
    /// System tick counter
    pub(crate) tick_cnt: u64,

    // ============ Tasks ============
    pub(crate) tcbs: [OsTcb; CFG_MAX_TASKS],
    pub(crate) free_tcb: Option<OsTaskId>,
    pub(crate) idle_task: OsTaskId,

    // ============ Scheduling ============
    pub(crate) prio_tbl: PrioTable,
    pub(crate) rdy: [ReadyList; CFG_PRIO_MAX],
    /// Currently executing task
    pub(crate) current: Option<OsTaskId>,
    /// Task selected by the dispatcher to run next
    pub(crate) next: Option<OsTaskId>,

    // ============ Delay list ============
    /// Head of the delta-encoded delay list
    pub(crate) dly_head: Option<OsTaskId>,

    // ============ Events ============
    pub(crate) events: [OsEcb; CFG_MAX_EVENT],
    pub(crate) free_event: Option<OsEventId>,

    // ============ Mutexes ============
    #[cfg(feature = "mutex")]
    pub(crate) mutexes: [OsMutexCb; crate::config::CFG_MAX_MUTEX],
    /// Next mutex ID to hand out; mutexes are never deleted
    #[cfg(feature = "mutex")]
    pub(crate) mutex_free_id: OsMutexId,

    // ============ ISR service requests ============
    pub(crate) srq: ServiceReq,
}

impl Kernel {
    pub const fn new() -> Self {
        Kernel {
            cfg: KernelConfig::new(),

            initialized: false,
            running: false,

            int_nesting: 0,
            lock_nesting: 0,
            sched_req: false,

            tick_cnt: 0,

            tcbs: [const { OsTcb::new() }; CFG_MAX_TASKS],
            free_tcb: None,
            idle_task: 0,

            prio_tbl: PrioTable::new(),
            rdy: [ReadyList::new(); CFG_PRIO_MAX],
            current: None,
            next: None,

            dly_head: None,

            events: [const { OsEcb::new() }; CFG_MAX_EVENT],
            free_event: None,

            #[cfg(feature = "mutex")]
            mutexes: [const { OsMutexCb::new() }; crate::config::CFG_MAX_MUTEX],
            #[cfg(feature = "mutex")]
            mutex_free_id: 0,

            srq: ServiceReq::new(),
        }
    }

    // ============ Lifecycle ============

    /// Initialize the kernel: build the free lists and create the idle task
    ///
    /// Must be called before any other operation. The idle task runs
    /// `idle_entry` on `idle_stack` at the lowest priority and is never
    /// deleted.
    pub fn init(
        &mut self,
        cfg: KernelConfig,
        idle_entry: OsTaskFn,
        idle_stk_base: *mut OsStkElement,
        idle_stk_size: usize,
    ) -> OsResult<()> {
        if self.running {
            return Err(OsError::OsRunning);
        }

        *self = Kernel::new();
        self.cfg = cfg;

        // Free TCB list
        for i in 0..CFG_MAX_TASKS {
            self.tcbs[i].task_id = i as OsTaskId;
            self.tcbs[i].free_next = if i + 1 < CFG_MAX_TASKS {
                Some((i + 1) as OsTaskId)
            } else {
                None
            };
        }
        self.free_tcb = Some(0);

        // Free event list
        for i in 0..CFG_MAX_EVENT {
            self.events[i].id = i as OsEventId;
            self.events[i].free_next = if i + 1 < CFG_MAX_EVENT {
                Some((i + 1) as OsEventId)
            } else {
                None
            };
        }
        self.free_event = Some(0);

        self.initialized = true;

        let idle = self.task_create_inner(
            "Idle",
            idle_entry,
            core::ptr::null_mut(),
            CFG_PRIO_IDLE,
            idle_stk_base,
            idle_stk_size,
            true,
        )?;
        self.idle_task = idle;

        crate::info!("kernel initialized, idle task {}", idle);
        Ok(())
    }

    /// Start multitasking: make the highest priority ready task current
    ///
    /// On a target the port then restores that task's context; on the host
    /// the test harness drives switches through [`Kernel::commit_switch`].
    pub fn start(&mut self) -> OsResult<()> {
        if !self.initialized {
            return Err(OsError::OsNotInit);
        }
        if self.running {
            return Err(OsError::OsRunning);
        }

        let high = self.prio_tbl.highest();
        let head = self.rdy[high as usize].head().ok_or(OsError::OsNotInit)?;

        self.tcbs[head as usize].state = OsTaskState::Running;
        self.current = Some(head);
        self.next = Some(head);
        self.running = true;

        crate::info!("kernel started, first task {}", head);
        Ok(())
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // ============ Scheduler lock ============

    /// Raise the scheduler lock without validation (internal bracket)
    #[inline]
    pub(crate) fn lock(&mut self) {
        self.lock_nesting = self.lock_nesting.saturating_add(1);
    }

    /// Release one level of scheduler lock
    ///
    /// When the count returns to zero this first drains the ISR
    /// service-request queue, then runs the dispatcher if a reschedule was
    /// requested while the lock was held. Both run with the lock still at
    /// one so nothing re-enters the dispatcher underneath them.
    pub(crate) fn unlock(&mut self) {
        debug_assert!(self.lock_nesting > 0);
        if self.lock_nesting == 1 {
            if self.srq.is_pending() {
                self.respond_srq();
            }
            if self.sched_req {
                self.schedule();
            }
            self.lock_nesting = 0;
        } else {
            self.lock_nesting = self.lock_nesting.saturating_sub(1);
        }
    }

    /// Lock the scheduler (application API)
    pub fn sched_lock(&mut self) -> OsResult<()> {
        if !self.running {
            return Err(OsError::OsNotRunning);
        }
        if self.int_nesting > 0 {
            return Err(OsError::CallInIsr);
        }
        if self.lock_nesting == OsNestingCtr::MAX {
            return Err(OsError::LockNestingOvf);
        }
        self.lock();
        Ok(())
    }

    /// Unlock the scheduler (application API)
    pub fn sched_unlock(&mut self) -> OsResult<()> {
        if !self.running {
            return Err(OsError::OsNotRunning);
        }
        if self.int_nesting > 0 {
            return Err(OsError::CallInIsr);
        }
        if self.lock_nesting == 0 {
            return Err(OsError::SchedNotLocked);
        }
        self.unlock();
        Ok(())
    }

    #[inline]
    pub fn sched_lock_nesting(&self) -> OsNestingCtr {
        self.lock_nesting
    }

    // ============ Interrupt nesting ============

    /// Notify the kernel an ISR was entered
    pub fn isr_enter(&mut self) {
        if self.running {
            self.int_nesting = self.int_nesting.saturating_add(1);
        }
    }

    /// Notify the kernel an ISR is exiting
    ///
    /// At the outermost exit, runs the dispatcher if a reschedule is
    /// pending and the scheduler is not locked.
    pub fn isr_exit(&mut self) {
        if !self.running || self.int_nesting == 0 {
            return;
        }
        self.int_nesting -= 1;
        if self.int_nesting == 0 && self.sched_req {
            self.lock_nesting = self.lock_nesting.saturating_add(1);
            self.schedule();
            self.lock_nesting -= 1;
        }
    }

    #[inline]
    pub fn int_nesting(&self) -> OsNestingCtr {
        self.int_nesting
    }

    // ============ Queries ============

    #[inline]
    pub fn current_task(&self) -> Option<OsTaskId> {
        self.current
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_cnt
    }

    pub fn task_state(&self, id: OsTaskId) -> OsResult<OsTaskState> {
        if (id as usize) >= CFG_MAX_TASKS {
            return Err(OsError::InvalidId);
        }
        Ok(self.tcbs[id as usize].state)
    }

    pub fn task_prio(&self, id: OsTaskId) -> OsResult<crate::types::OsPrio> {
        if (id as usize) >= CFG_MAX_TASKS {
            return Err(OsError::InvalidId);
        }
        Ok(self.tcbs[id as usize].prio)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Global instance ============

/// The kernel instance behind the embedded free-function API
pub(crate) static OS: CsCell<Kernel> = CsCell::new(Kernel::new());

/// Idle task stack for the global instance
static mut IDLE_STK: [OsStkElement; CFG_IDLE_STACK_SIZE] = [0; CFG_IDLE_STACK_SIZE];

/// Internal idle task of the global instance
fn os_idle_task(_: *mut ()) -> ! {
    loop {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::wfi();
    }
}

/// Run a closure on the global kernel inside a critical section
#[inline]
pub(crate) fn with<R>(f: impl FnOnce(&mut Kernel) -> R) -> R {
    critical_section(|cs| f(OS.get(cs)))
}

/// Trigger the port context switch when the dispatcher picked a new task
///
/// No-op off-target; host tests commit switches explicitly instead.
#[inline]
pub(crate) fn trigger_switch(k: &mut Kernel) {
    #[cfg(target_arch = "arm")]
    if k.switch_pending() {
        crate::port::os_ctx_sw();
    }
    #[cfg(not(target_arch = "arm"))]
    let _ = k;
}

// ============ Public API (global instance) ============

/// Initialize the kernel with the default configuration
///
/// Must be called before any other OS function.
pub fn os_init() -> OsResult<()> {
    os_init_with(KernelConfig::new())
}

/// Initialize the kernel with an explicit configuration
#[allow(static_mut_refs)]
pub fn os_init_with(cfg: KernelConfig) -> OsResult<()> {
    with(|k| unsafe { k.init(cfg, os_idle_task, IDLE_STK.as_mut_ptr(), IDLE_STK.len()) })
}

/// Start multitasking
///
/// Starts the system tick and restores the context of the highest
/// priority ready task. Does not return under normal operation.
pub fn os_start() -> OsResult<()> {
    with(|k| k.start())?;

    crate::port::os_cpu_systick_init(16_000_000 / crate::config::CFG_TICK_RATE_HZ);
    unsafe { crate::port::os_start_high_rdy() };

    Ok(())
}

/// Lock the scheduler
pub fn os_sched_lock() -> OsResult<()> {
    with(|k| k.sched_lock())
}

/// Unlock the scheduler, dispatching if a reschedule is pending
pub fn os_sched_unlock() -> OsResult<()> {
    with(|k| {
        let r = k.sched_unlock();
        trigger_switch(k);
        r
    })
}

/// Notify the kernel an ISR was entered
///
/// Call at the top of every interrupt handler that uses kernel services.
pub fn os_int_enter() {
    with(|k| k.isr_enter());
}

/// Notify the kernel an ISR is exiting
pub fn os_int_exit() {
    with(|k| {
        k.isr_exit();
        trigger_switch(k);
    });
}

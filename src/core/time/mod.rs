//! Time management module
//!
//! The delay list is delta-encoded: each node stores only the tick
//! difference to its predecessor, so one decrement of the head per system
//! tick ages every delayed task. The sum of deltas from the head through
//! any node equals that node's absolute remaining ticks.

use portable_atomic::{AtomicU32, Ordering};

use crate::config::{CFG_MAX_TASKS, CFG_TICK_RATE_HZ};
use crate::error::{OsError, OsResult};
use crate::kernel::{self, Kernel};
use crate::types::{OsPendOn, OsPendStatus, OsTaskId, OsTaskState, OsTick};

/// Lock-free tick mirror for logging timestamps
pub(crate) static TICKS: AtomicU32 = AtomicU32::new(0);

impl Kernel {
    // ============ Delay list ============

    /// Insert a task into the delay list with a relative timeout
    ///
    /// Walks the list consuming each node's delta from the requested tick
    /// count; the insertion point is the first node whose delta exceeds
    /// what is left, and the deltas on both sides are re-split so partial
    /// sums stay equal to absolute remaining ticks. Ties go after existing
    /// nodes.
    pub(crate) fn dly_insert(&mut self, id: OsTaskId, ticks: OsTick) {
        if ticks == 0 {
            return;
        }

        let mut rem = ticks;
        match self.dly_head {
            None => {
                self.tcbs[id as usize].delay_tick = Some(rem);
                self.tcbs[id as usize].dly_prev = None;
                self.tcbs[id as usize].dly_next = None;
                self.dly_head = Some(id);
            }
            Some(head) => {
                let mut cur = head;
                loop {
                    let cur_delta = self.tcbs[cur as usize].delay_tick.unwrap_or(0);
                    if rem < cur_delta {
                        // Insert before `cur`, splitting its delta
                        let prev = self.tcbs[cur as usize].dly_prev;
                        self.tcbs[id as usize].dly_prev = prev;
                        self.tcbs[id as usize].dly_next = Some(cur);
                        self.tcbs[cur as usize].dly_prev = Some(id);
                        match prev {
                            Some(p) => self.tcbs[p as usize].dly_next = Some(id),
                            None => self.dly_head = Some(id),
                        }
                        self.tcbs[id as usize].delay_tick = Some(rem);
                        self.tcbs[cur as usize].delay_tick = Some(cur_delta - rem);
                        break;
                    }
                    rem -= cur_delta;
                    match self.tcbs[cur as usize].dly_next {
                        Some(n) => cur = n,
                        None => {
                            // Append at the tail
                            self.tcbs[cur as usize].dly_next = Some(id);
                            self.tcbs[id as usize].dly_prev = Some(cur);
                            self.tcbs[id as usize].dly_next = None;
                            self.tcbs[id as usize].delay_tick = Some(rem);
                            break;
                        }
                    }
                }
            }
        }

        self.tcbs[id as usize].state = OsTaskState::Waiting;
        self.sched_req = true;
    }

    /// Remove a task from the delay list, preserving the delta invariant
    ///
    /// The removed node's delta is folded into its successor.
    pub(crate) fn dly_remove(&mut self, id: OsTaskId) {
        let prev = self.tcbs[id as usize].dly_prev;
        let next = self.tcbs[id as usize].dly_next;
        let delta = self.tcbs[id as usize].delay_tick.unwrap_or(0);

        if let Some(n) = next {
            let nd = self.tcbs[n as usize].delay_tick.unwrap_or(0);
            self.tcbs[n as usize].delay_tick = Some(nd + delta);
            self.tcbs[n as usize].dly_prev = prev;
        }
        match prev {
            Some(p) => self.tcbs[p as usize].dly_next = next,
            None => self.dly_head = next,
        }

        self.tcbs[id as usize].dly_prev = None;
        self.tcbs[id as usize].dly_next = None;
        self.tcbs[id as usize].delay_tick = None;
    }

    /// Wake every task whose delay has expired
    ///
    /// Pops the head while its delta is zero. An expired task that was
    /// also waiting on an event is unlinked from the event's waiting list
    /// and its pend is marked timed out; exactly one of the two teardown
    /// paths (this one or the event wake) ever runs for a given pend.
    pub(crate) fn time_dispose(&mut self) {
        while let Some(head) = self.dly_head {
            if self.tcbs[head as usize].delay_tick != Some(0) {
                break;
            }

            self.dly_head = self.tcbs[head as usize].dly_next;
            if let Some(nh) = self.dly_head {
                self.tcbs[nh as usize].dly_prev = None;
            }
            let tcb = &mut self.tcbs[head as usize];
            tcb.dly_next = None;
            tcb.dly_prev = None;
            tcb.delay_tick = None;
            let was_event_waiter = tcb.event_id.is_some();

            if was_event_waiter {
                self.event_unlink_waiter(head);
                let tcb = &mut self.tcbs[head as usize];
                tcb.pend_on = OsPendOn::Nothing;
                tcb.pend_status = OsPendStatus::Timeout;
            }

            self.make_ready(head);
        }
    }

    /// Absolute remaining ticks for a delayed task
    ///
    /// Sums the deltas from the list head through the task.
    pub fn delay_remaining(&self, id: OsTaskId) -> Option<OsTick> {
        self.tcbs.get(id as usize)?.delay_tick?;

        let mut sum: OsTick = 0;
        let mut cur = self.dly_head;
        while let Some(c) = cur {
            sum += self.tcbs[c as usize].delay_tick.unwrap_or(0);
            if c == id {
                return Some(sum);
            }
            cur = self.tcbs[c as usize].dly_next;
        }
        None
    }

    // ============ Tick dispatch ============

    /// Advance the kernel by one system tick
    ///
    /// Normally called from the tick ISR between `isr_enter`/`isr_exit`.
    /// Ages the delay-list head and runs the dispose when it expires —
    /// deferring it onto the service-request path if an application
    /// scheduler lock was held at tick time — then requests a reschedule.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        self.lock();
        self.tick_cnt = self.tick_cnt.wrapping_add(1);

        self.sched_round_robin();

        if let Some(head) = self.dly_head {
            let delta = self.tcbs[head as usize].delay_tick.unwrap_or(0);
            if delta > 1 {
                self.tcbs[head as usize].delay_tick = Some(delta - 1);
            } else {
                self.tcbs[head as usize].delay_tick = Some(0);
                if self.lock_nesting > 1 {
                    self.srq.defer_time_dispose();
                } else {
                    self.time_dispose();
                }
            }
        }

        self.sched_req = true;
        self.unlock();
    }

    // ============ Delays ============

    /// Delay the current task for a number of ticks
    ///
    /// A zero tick count returns immediately; rejected from ISR context
    /// and while the scheduler lock is held.
    pub fn tick_delay(&mut self, ticks: OsTick) -> OsResult<()> {
        if self.int_nesting > 0 {
            return Err(OsError::CallInIsr);
        }
        if !self.running {
            return Err(OsError::OsNotRunning);
        }
        if ticks == 0 {
            return Ok(());
        }
        if self.lock_nesting > 0 {
            return Err(OsError::SchedInLock);
        }

        let cur = self.current.ok_or(OsError::OsNotRunning)?;

        self.lock();
        self.rdy_remove(cur);
        let tcb = &mut self.tcbs[cur as usize];
        tcb.pend_on = OsPendOn::Nothing;
        tcb.pend_status = OsPendStatus::Ok;
        self.dly_insert(cur, ticks);
        self.unlock();
        Ok(())
    }

    /// Re-arm or cut short a task's delay
    ///
    /// With `ticks == 0` the delay expires immediately: the task is torn
    /// down from its waiting structures exactly as the tick dispose would.
    pub fn reset_task_delay(&mut self, id: OsTaskId, ticks: OsTick) -> OsResult<()> {
        if self.cfg.par_check && (id as usize) >= CFG_MAX_TASKS {
            return Err(OsError::InvalidId);
        }
        if self.tcbs[id as usize].delay_tick.is_none() {
            return Err(OsError::NotInDelayList);
        }

        self.lock();
        self.dly_remove(id);
        if ticks == 0 {
            if self.tcbs[id as usize].event_id.is_some() {
                self.event_unlink_waiter(id);
                let tcb = &mut self.tcbs[id as usize];
                tcb.pend_on = OsPendOn::Nothing;
                tcb.pend_status = OsPendStatus::Timeout;
            }
            self.make_ready(id);
        } else {
            self.dly_insert(id, ticks);
        }
        self.unlock();
        Ok(())
    }
}

// ============ Public API (global instance) ============

/// Delay the current task for `ticks` system ticks
pub fn os_time_dly(ticks: OsTick) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.tick_delay(ticks);
        kernel::trigger_switch(k);
        r
    })
    // Execution resumes here once the delay expired
}

/// Delay the current task for hours, minutes, seconds, milliseconds
pub fn os_time_dly_hmsm(hours: u16, minutes: u8, seconds: u8, milliseconds: u16) -> OsResult<()> {
    if minutes > 59 || seconds > 59 || milliseconds > 999 {
        return Err(OsError::InvalidParameter);
    }

    let total_ms = (hours as u64) * 3_600_000
        + (minutes as u64) * 60_000
        + (seconds as u64) * 1000
        + (milliseconds as u64);
    let ticks = (total_ms * CFG_TICK_RATE_HZ as u64 + 500) / 1000;

    os_time_dly(ticks as OsTick)
}

/// Re-arm or cut short a task's delay on the global kernel
pub fn os_time_dly_resume(id: OsTaskId) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.reset_task_delay(id, 0);
        kernel::trigger_switch(k);
        r
    })
}

/// Current system tick count
pub fn os_time_get() -> u64 {
    kernel::with(|k| k.tick_count())
}

/// System tick entry point
///
/// Wire the tick interrupt here; it brackets the kernel tick with the ISR
/// nesting accounting and triggers a context switch at the outermost exit.
pub fn os_tick_handler() {
    kernel::with(|k| {
        k.isr_enter();
        k.tick();
        TICKS.store(k.tick_cnt as u32, Ordering::Relaxed);
        k.isr_exit();
        kernel::trigger_switch(k);
    });
}

/// SysTick interrupt handler
#[cfg(target_arch = "arm")]
#[no_mangle]
pub extern "C" fn SysTick() {
    os_tick_handler();
}

//! CoOS RTOS kernel in Rust
//!
//! A fixed-size-resource, priority-based real-time kernel for single-core
//! microcontrollers, providing:
//! - Priority-based preemptive scheduling with a scheduler lock
//! - Synchronization primitives (semaphores, mailboxes, priority-inheritance
//!   mutexes)
//! - A delta-encoded delay list for tick-based timeouts
//! - An ISR service-request queue for deferred posts from interrupts
//! - Context switching for ARM Cortex-M

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod port;
pub mod sync;

// ============ Re-exports ============

pub use core::config;
pub use core::config::*;
pub use core::critical;
pub use core::error;
pub use core::error::{OsError, OsResult};
pub use core::kernel;
pub use core::kernel::{
    os_init, os_init_with, os_int_enter, os_int_exit, os_sched_lock, os_sched_unlock, os_start,
    Kernel,
};
pub use core::prio;
pub use core::sched;
pub use core::sched::os_sched_yield;
pub use core::task;
pub use core::task::{os_set_prio, os_task_create, os_task_del};
pub use core::time;
pub use core::time::{os_tick_handler, os_time_dly, os_time_dly_hmsm, os_time_get};
pub use core::types;
pub use core::types::*;

pub use sync::event;

#[cfg(feature = "mbox")]
pub use sync::mbox;
#[cfg(feature = "mutex")]
pub use sync::mutex;
#[cfg(feature = "sem")]
pub use sync::sem;

//! Port layer - CPU-specific implementations
//!
//! Hardware abstraction for context switching, tick timer setup and task
//! stack frame initialization. The kernel core only ever records which
//! task should run next; this layer performs the actual stack swap.

#[cfg(target_arch = "arm")]
pub mod cortex_m;

#[cfg(target_arch = "arm")]
pub use self::cortex_m::*;

// Stub implementations for non-ARM targets. Host tests drive context
// switches through `Kernel::commit_switch` instead.
#[cfg(not(target_arch = "arm"))]
pub mod stub {
    use crate::task::OsTaskFn;
    use crate::types::OsStkElement;

    pub unsafe fn os_start_high_rdy() {
        unreachable!("os_start_high_rdy not available on this platform");
    }

    pub fn os_ctx_sw() {}

    pub fn os_cpu_systick_init(_reload: u32) {}

    pub unsafe fn os_task_stk_init(
        _entry: OsTaskFn,
        _arg: *mut (),
        stk_base: *mut OsStkElement,
        stk_size: usize,
    ) -> *mut OsStkElement {
        if stk_base.is_null() {
            return stk_base;
        }
        unsafe { stk_base.add(stk_size.saturating_sub(1)) }
    }
}

#[cfg(not(target_arch = "arm"))]
pub use stub::*;

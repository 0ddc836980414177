//! Critical section handling
//!
//! The kernel's list manipulation is serialized by the scheduler lock; the
//! short sections that touch state shared with interrupt handlers are
//! bracketed by these primitives, which disable interrupts on ARM targets
//! and degrade to plain calls on the host.

use portable_atomic::{AtomicBool, Ordering};

/// Tracks whether a critical section is currently open
static IN_CRITICAL: AtomicBool = AtomicBool::new(false);

/// RAII guard for critical sections
///
/// Creating the guard disables interrupts; dropping it re-enables them.
pub struct CriticalSection {
    _private: (),
}

impl CriticalSection {
    /// Enter a critical section by disabling interrupts
    #[inline(always)]
    pub fn enter() -> Self {
        #[cfg(target_arch = "arm")]
        cortex_m::interrupt::disable();

        IN_CRITICAL.store(true, Ordering::Release);
        CriticalSection { _private: () }
    }

    /// Check whether a critical section is currently open
    #[inline(always)]
    pub fn is_active() -> bool {
        IN_CRITICAL.load(Ordering::Acquire)
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        IN_CRITICAL.store(false, Ordering::Release);

        #[cfg(target_arch = "arm")]
        unsafe {
            cortex_m::interrupt::enable()
        };
    }
}

/// Execute a closure with interrupts disabled
///
/// The closure receives the guard, which unlocks access to
/// [`CsCell`](crate::core::cs_cell::CsCell)-protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// Check whether the CPU is currently executing an exception handler
///
/// Reads IPSR on ARM; always false on the host, where ISR context is
/// modeled through the kernel's own nesting counter instead.
#[inline]
pub fn in_exception() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}

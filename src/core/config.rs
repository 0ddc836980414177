//! Compile-time configuration for the CoOS kernel
//!
//! The `CFG_*` constants fix the kernel table sizes at build time; there is
//! no dynamic growth. Runtime-selectable behavior lives in [`KernelConfig`],
//! which every kernel instance carries.

/// Maximum number of priority levels
pub const CFG_PRIO_MAX: usize = 64;

/// Idle task priority (lowest)
pub const CFG_PRIO_IDLE: u8 = (CFG_PRIO_MAX - 1) as u8;

/// Maximum number of user tasks
pub const CFG_MAX_USER_TASKS: usize = 16;

/// Number of system tasks (the idle task)
pub const SYS_TASK_NUM: usize = 1;

/// Total TCB arena size
pub const CFG_MAX_TASKS: usize = CFG_MAX_USER_TASKS + SYS_TASK_NUM;

/// Maximum number of event control blocks (semaphores + mailboxes)
pub const CFG_MAX_EVENT: usize = 16;

/// Maximum number of mutexes
pub const CFG_MAX_MUTEX: usize = 8;

/// Capacity of the ISR service-request queue
pub const CFG_MAX_SERVICE_REQUEST: usize = 8;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Minimum task stack size in words
pub const CFG_STK_SIZE_MIN: usize = 64;

/// Idle task stack size in words (global kernel instance)
pub const CFG_IDLE_STACK_SIZE: usize = 128;

/// Default time quanta for round-robin scheduling, in ticks
pub const CFG_TIME_QUANTA_DEFAULT: u32 = 10;

/// Runtime kernel configuration
///
/// CoOS toggled argument-range checks with the `CFG_PAR_CHECKOUT_EN`
/// preprocessor flag; here the same size/speed trade-off is a field on the
/// kernel context so both checked and unchecked kernels can run in one
/// test suite.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Validate handles and argument ranges on every call
    pub par_check: bool,
    /// Rotate equal-priority tasks when their time quanta expire
    pub round_robin: bool,
}

impl KernelConfig {
    pub const fn new() -> Self {
        KernelConfig {
            par_check: true,
            round_robin: true,
        }
    }

    /// Configuration with argument checking compiled out of the hot path
    pub const fn unchecked() -> Self {
        KernelConfig {
            par_check: false,
            round_robin: true,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! Error types for the CoOS kernel
//!
//! Uses Rust's Result pattern instead of C-style status codes. Every
//! fallible kernel operation returns one of these synchronously; there is
//! no other error channel.

/// Kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsError {
    // ============ Handle / parameter errors ============
    /// Handle out of table range, or object type does not match the call
    InvalidId = 1,
    /// Malformed argument (bad sort type, counter above ceiling, ...)
    InvalidParameter = 2,

    // ============ Call context errors ============
    /// Scheduling-sensitive call issued from interrupt context
    CallInIsr = 10,
    /// Blocking call issued while the scheduler lock is held
    SchedInLock = 11,
    /// Unlock requested but the scheduler is not locked
    SchedNotLocked = 12,
    /// Scheduler lock nesting counter would overflow
    LockNestingOvf = 13,

    // ============ Resource exhaustion ============
    /// No free slot in the event table
    NoFreeEvent = 20,
    /// No free slot in the mutex table
    NoFreeMutex = 21,
    /// No free TCB in the task arena
    NoFreeTcb = 22,
    /// ISR service-request queue is full
    SrqFull = 23,

    // ============ Capacity violations ============
    /// Mailbox already holds a message
    MboxFull = 30,
    /// Mailbox is empty
    MboxEmpty = 31,
    /// Semaphore counter is at its ceiling
    SemFull = 32,
    /// Semaphore counter is zero
    SemEmpty = 33,

    // ============ Blocking outcomes ============
    /// Timeout elapsed before the awaited condition occurred
    Timeout = 40,
    /// The awaited object was deleted while pending
    ObjDel = 41,

    // ============ Object state errors ============
    /// Deletion refused: tasks are still waiting on the object
    TaskWaiting = 50,
    /// Caller does not own the mutex
    NotMutexOwner = 51,
    /// Caller already owns the mutex
    MutexOwner = 52,
    /// Operation refused on the idle task
    ProtectedTask = 53,
    /// Task is not on the delay list
    NotInDelayList = 54,

    // ============ Task errors ============
    /// Bad stack pointer or stack below the minimum size
    StkInvalid = 60,
    /// Priority outside the configured range
    PrioInvalid = 61,

    // ============ Kernel lifecycle ============
    /// Kernel has not been initialized
    OsNotInit = 70,
    /// Kernel is already running
    OsRunning = 71,
    /// Kernel is not running
    OsNotRunning = 72,
}

/// Result type alias for kernel operations
pub type OsResult<T> = Result<T, OsError>;

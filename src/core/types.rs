//! Core type definitions for the CoOS kernel
//!
//! These types provide strong typing for kernel primitives. All kernel
//! objects are addressed by small indices into fixed tables, so handles
//! are plain integer aliases and "no object" is expressed with `Option`.

/// Task priority (0 = highest priority)
pub type OsPrio = u8;

/// Tick counter type used for delays and timeouts
pub type OsTick = u32;

/// Task handle: index into the TCB arena
pub type OsTaskId = u8;

/// Event handle: index into the event control block table
pub type OsEventId = u8;

/// Mutex handle: index into the mutex table
pub type OsMutexId = u8;

/// Semaphore counter type
pub type OsSemCtr = u16;

/// Nesting counter (interrupts, scheduler lock)
pub type OsNestingCtr = u8;

/// Stack element type
pub type OsStkElement = u32;

/// Mail payload carried by mailboxes and handed to woken tasks
pub type OsMail = *mut ();

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsTaskState {
    /// TCB slot is free / task was deleted
    Dormant = 0,
    /// Task is on a ready list
    Ready = 1,
    /// Task is the one currently executing
    Running = 2,
    /// Task is blocked on an event, mutex or delay
    Waiting = 3,
}

/// What a waiting task is blocked on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsPendOn {
    Nothing = 0,
    Semaphore = 1,
    Mailbox = 2,
    Mutex = 3,
}

/// Outcome of a pend, recorded in the TCB by whoever woke the task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsPendStatus {
    /// Woken by a post / mutex handoff
    Ok = 0,
    /// Delay expired before the event arrived
    Timeout = 1,
    /// The awaited object was deleted
    Del = 2,
}

/// Kernel object type marker stored in each event control block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsEventType {
    /// Slot is on the free list
    Invalid = 0,
    /// Single-slot mailbox
    Mbox = 1,
    /// Counting semaphore
    Sem = 2,
}

/// Waiting-list ordering for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsSortType {
    /// Waiters served in arrival order
    Fifo = 0,
    /// Waiters served highest priority first
    Prio = 1,
}

/// Event deletion option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsDelOpt {
    /// Delete only when no task is waiting
    NoPend = 0,
    /// Delete unconditionally, waking every waiter
    Anyway = 1,
}

/// Result of starting a blocking pend
///
/// The kernel core never blocks by itself; a `Blocked` return means the
/// caller has been linked onto the waiting structures and the port (or a
/// test harness) must let the scheduler run before completing the pend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsPend {
    /// Resource was available, pend completed immediately
    Acquired,
    /// Caller was queued and a reschedule was requested
    Blocked,
}

/// `OsPend` variant for mailbox pends, carrying the immediate payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsMailPend {
    /// A message was present, returned without blocking
    Mail(OsMail),
    /// Caller was queued and a reschedule was requested
    Blocked,
}

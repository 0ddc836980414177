//! Synchronization primitives: events, semaphores, mailboxes, mutexes and
//! the ISR service-request queue

pub mod event;
pub mod srq;

#[cfg(feature = "mbox")]
pub mod mbox;
#[cfg(feature = "mutex")]
pub mod mutex;
#[cfg(feature = "sem")]
pub mod sem;

//! Mailbox implementation
//!
//! Single-slot message events built on the event control block. The
//! occupied flag lives in the ECB counter and never leaves {0, 1}; a post
//! with a waiter present hands the message straight into the waiter's
//! `pmail` without ever parking it in the slot.

use crate::error::{OsError, OsResult};
use crate::kernel::{self, Kernel};
use crate::types::{
    OsDelOpt, OsEventId, OsEventType, OsMail, OsMailPend, OsPendOn, OsSortType, OsTick,
};

impl Kernel {
    /// Create a mailbox
    pub fn mbox_create(&mut self, sort_type: OsSortType) -> OsResult<OsEventId> {
        self.event_create(OsEventType::Mbox, sort_type)
    }

    /// Delete a mailbox
    pub fn mbox_del(&mut self, id: OsEventId, opt: OsDelOpt) -> OsResult<()> {
        self.event_delete(id, OsEventType::Mbox, opt)
    }

    /// Take the mail without blocking
    pub fn mbox_accept(&mut self, id: OsEventId) -> OsResult<OsMail> {
        self.event_check(id, OsEventType::Mbox)?;

        self.lock();
        let r = if self.events[id as usize].counter == 1 {
            let mail = self.events[id as usize].mail;
            self.events[id as usize].mail = core::ptr::null_mut();
            self.events[id as usize].counter = 0;
            Ok(mail)
        } else {
            Err(OsError::MboxEmpty)
        };
        self.unlock();
        r
    }

    /// Wait for mail
    ///
    /// Consumes a present message immediately; otherwise the current task
    /// blocks for up to `timeout` ticks (0 = wait forever). Complete a
    /// `Blocked` pend with [`Kernel::pend_result`], which yields the mail.
    pub fn mbox_pend(&mut self, id: OsEventId, timeout: OsTick) -> OsResult<OsMailPend> {
        if self.int_nesting > 0 {
            return Err(OsError::CallInIsr);
        }
        if !self.running {
            return Err(OsError::OsNotRunning);
        }
        self.event_check(id, OsEventType::Mbox)?;
        if self.lock_nesting > 0 {
            return Err(OsError::SchedInLock);
        }
        let cur = self.current.ok_or(OsError::OsNotRunning)?;

        self.lock();
        if self.events[id as usize].counter == 1 {
            let mail = self.events[id as usize].mail;
            self.events[id as usize].mail = core::ptr::null_mut();
            self.events[id as usize].counter = 0;
            self.unlock();
            return Ok(OsMailPend::Mail(mail));
        }

        self.event_task_to_wait(id, cur, OsPendOn::Mailbox, timeout);
        self.unlock();
        Ok(OsMailPend::Blocked)
    }

    /// Post mail
    ///
    /// Succeeds only on the empty-to-full transition: either the first
    /// waiter (per sort order) receives the message directly, or the slot
    /// fills. An occupied mailbox fails with `MboxFull` without mutating
    /// anything.
    pub fn mbox_post(&mut self, id: OsEventId, mail: OsMail) -> OsResult<()> {
        self.event_check(id, OsEventType::Mbox)?;

        self.lock();
        if self.events[id as usize].counter != 0 {
            self.unlock();
            return Err(OsError::MboxFull);
        }

        match self.event_wake_first(id) {
            Some(tid) => self.tcbs[tid as usize].pmail = mail,
            None => {
                self.events[id as usize].mail = mail;
                self.events[id as usize].counter = 1;
            }
        }
        self.unlock();
        Ok(())
    }

    /// Post mail from an interrupt handler
    ///
    /// Deferred onto the service-request queue while the scheduler is
    /// locked.
    pub fn isr_mbox_post(&mut self, id: OsEventId, mail: OsMail) -> OsResult<()> {
        if self.lock_nesting > 0 {
            self.srq.push_mbox_post(id, mail)
        } else {
            self.mbox_post(id, mail)
        }
    }
}

// ============ Public API (global instance) ============

/// Create a mailbox on the global kernel
pub fn os_mbox_create(sort_type: OsSortType) -> OsResult<OsEventId> {
    kernel::with(|k| k.mbox_create(sort_type))
}

/// Delete a mailbox on the global kernel
pub fn os_mbox_del(id: OsEventId, opt: OsDelOpt) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.mbox_del(id, opt);
        kernel::trigger_switch(k);
        r
    })
}

/// Take the mail without blocking
pub fn os_mbox_accept(id: OsEventId) -> OsResult<OsMail> {
    kernel::with(|k| k.mbox_accept(id))
}

/// Wait for mail, blocking up to `timeout` ticks (0 = forever)
pub fn os_mbox_pend(id: OsEventId, timeout: OsTick) -> OsResult<OsMail> {
    let pend = kernel::with(|k| {
        let r = k.mbox_pend(id, timeout);
        kernel::trigger_switch(k);
        r
    })?;

    match pend {
        OsMailPend::Mail(mail) => Ok(mail),
        OsMailPend::Blocked => {
            // Execution resumes here after the task was woken
            kernel::with(|k| {
                let cur = k.current_task().ok_or(OsError::OsNotRunning)?;
                k.pend_result(cur)
            })
        }
    }
}

/// Post mail to the mailbox
pub fn os_mbox_post(id: OsEventId, mail: OsMail) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.mbox_post(id, mail);
        kernel::trigger_switch(k);
        r
    })
}

/// Post mail from an ISR
pub fn isr_mbox_post(id: OsEventId, mail: OsMail) -> OsResult<()> {
    kernel::with(|k| {
        let r = k.isr_mbox_post(id, mail);
        kernel::trigger_switch(k);
        r
    })
}

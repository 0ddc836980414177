//! ISR service-request queue
//!
//! Interrupt handlers may not touch the scheduler lists while the
//! scheduler lock is held, so posts issued from ISRs in that window are
//! parked here as (operation, handle, payload) entries, together with a
//! deferred tick-dispose flag. The queue drains when the lock is released.

use crate::config::CFG_MAX_SERVICE_REQUEST;
use crate::error::{OsError, OsResult};
use crate::kernel::Kernel;
use crate::types::{OsEventId, OsMail};

/// A deferred operation requested from interrupt context
#[derive(Debug, Clone, Copy)]
pub enum OsSrvReq {
    /// Semaphore post
    #[cfg(feature = "sem")]
    SemPost(OsEventId),
    /// Mailbox post with its payload
    #[cfg(feature = "mbox")]
    MboxPost(OsEventId, OsMail),
}

/// Fixed-capacity service-request queue
pub struct ServiceReq {
    cells: [Option<OsSrvReq>; CFG_MAX_SERVICE_REQUEST],
    cnt: usize,
    /// A tick expired while the scheduler was locked
    time_req: bool,
    /// Any request is pending
    isr_req: bool,
}

impl ServiceReq {
    pub const fn new() -> Self {
        ServiceReq {
            cells: [None; CFG_MAX_SERVICE_REQUEST],
            cnt: 0,
            time_req: false,
            isr_req: false,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.isr_req
    }

    /// Queue a deferred semaphore post
    #[cfg(feature = "sem")]
    pub fn push_sem_post(&mut self, id: OsEventId) -> OsResult<()> {
        self.push(OsSrvReq::SemPost(id))
    }

    /// Queue a deferred mailbox post
    #[cfg(feature = "mbox")]
    pub fn push_mbox_post(&mut self, id: OsEventId, mail: OsMail) -> OsResult<()> {
        self.push(OsSrvReq::MboxPost(id, mail))
    }

    #[allow(dead_code)]
    fn push(&mut self, req: OsSrvReq) -> OsResult<()> {
        if self.cnt >= CFG_MAX_SERVICE_REQUEST {
            return Err(OsError::SrqFull);
        }
        self.cells[self.cnt] = Some(req);
        self.cnt += 1;
        self.isr_req = true;
        Ok(())
    }

    /// Record that the tick dispose must run at unlock time
    pub fn defer_time_dispose(&mut self) {
        self.time_req = true;
        self.isr_req = true;
    }
}

impl Default for ServiceReq {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for ServiceReq {}
unsafe impl Sync for ServiceReq {}

impl Kernel {
    /// Respond to every queued service request
    ///
    /// Called from the unlock path with the lock still held at one: the
    /// deferred tick dispose runs first, then the queued posts in arrival
    /// order. Post failures (a full mailbox, a deleted event) are dropped,
    /// as the requesting ISR has long returned.
    pub(crate) fn respond_srq(&mut self) {
        if self.srq.time_req {
            self.time_dispose();
            self.srq.time_req = false;
        }

        let mut i = 0;
        while i < self.srq.cnt {
            let req = self.srq.cells[i].take();
            i += 1;
            match req {
                #[cfg(feature = "sem")]
                Some(OsSrvReq::SemPost(id)) => {
                    let _ = self.sem_post(id);
                }
                #[cfg(feature = "mbox")]
                Some(OsSrvReq::MboxPost(id, mail)) => {
                    let _ = self.mbox_post(id, mail);
                }
                _ => {}
            }
        }
        self.srq.cnt = 0;
        self.srq.isr_req = false;
    }
}

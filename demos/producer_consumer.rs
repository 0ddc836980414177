//! Producer/consumer demo - a mailbox between two tasks, fed from the
//! semaphore-paced producer

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use coos::mbox::{os_mbox_create, os_mbox_pend, os_mbox_post};
use coos::os_task_create;
use coos::sem::{os_sem_create, os_sem_pend, os_sem_post};
use coos::time::os_time_dly;
use coos::types::{OsEventId, OsSortType, OsStkElement};

static PRODUCED: AtomicU32 = AtomicU32::new(0);
static CONSUMED: AtomicU32 = AtomicU32::new(0);

static MBOX_ID: AtomicU32 = AtomicU32::new(0);
static SLOTS_ID: AtomicU32 = AtomicU32::new(0);

static mut PRODUCER_STK: [OsStkElement; 512] = [0; 512];
static mut CONSUMER_STK: [OsStkElement; 512] = [0; 512];

fn producer_task(_: *mut ()) -> ! {
    let mbox = MBOX_ID.load(Ordering::Relaxed) as OsEventId;
    let slots = SLOTS_ID.load(Ordering::Relaxed) as OsEventId;

    loop {
        // Wait for the consumer to free the slot
        let _ = os_sem_pend(slots, 0);

        let n = PRODUCED.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = os_mbox_post(mbox, n as *mut ());
        coos::info!("produced #{}", n);

        let _ = os_time_dly(100);
    }
}

fn consumer_task(_: *mut ()) -> ! {
    let mbox = MBOX_ID.load(Ordering::Relaxed) as OsEventId;
    let slots = SLOTS_ID.load(Ordering::Relaxed) as OsEventId;

    loop {
        match os_mbox_pend(mbox, 1000) {
            Ok(mail) => {
                let n = CONSUMED.fetch_add(1, Ordering::Relaxed) + 1;
                coos::info!("consumed #{} (mail {})", n, mail as usize);
                let _ = os_sem_post(slots);
            }
            Err(e) => {
                coos::warn!("consumer timed out: {}", e as u8);
            }
        }
    }
}

#[entry]
fn main() -> ! {
    coos::os_init().expect("OS init failed");

    let mbox = os_mbox_create(OsSortType::Fifo).expect("mbox failed");
    let slots = os_sem_create(1, 1, OsSortType::Fifo).expect("sem failed");
    MBOX_ID.store(mbox as u32, Ordering::Relaxed);
    SLOTS_ID.store(slots as u32, Ordering::Relaxed);

    os_task_create(
        "Producer",
        producer_task,
        core::ptr::null_mut(),
        10,
        unsafe { &mut PRODUCER_STK },
    )
    .expect("producer failed");

    os_task_create(
        "Consumer",
        consumer_task,
        core::ptr::null_mut(),
        5,
        unsafe { &mut CONSUMER_STK },
    )
    .expect("consumer failed");

    coos::os_start().expect("OS start failed");

    loop {
        cortex_m::asm::wfi();
    }
}

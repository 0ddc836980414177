//! Priority inversion demo - mutex priority inheritance
//!
//! Three tasks: High(5), Med(10), Low(15)
//! Low holds the mutex -> High waits -> Low is boosted to prio 5

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use coos::mutex::{os_mutex_create, os_mutex_enter, os_mutex_leave};
use coos::os_task_create;
use coos::time::os_time_dly;
use coos::types::{OsMutexId, OsStkElement};

static HIGH_RUNS: AtomicU32 = AtomicU32::new(0);
static LOW_RUNS: AtomicU32 = AtomicU32::new(0);
static MTX_ID: AtomicU32 = AtomicU32::new(0);

static mut HIGH_STK: [OsStkElement; 256] = [0; 256];
static mut MED_STK: [OsStkElement; 256] = [0; 256];
static mut LOW_STK: [OsStkElement; 256] = [0; 256];

/// High priority task (prio=5)
fn high_task_fn(_arg: *mut ()) -> ! {
    let mtx = MTX_ID.load(Ordering::Relaxed) as OsMutexId;
    let _ = os_time_dly(50);

    loop {
        let n = HIGH_RUNS.fetch_add(1, Ordering::Relaxed) + 1;

        let _ = os_mutex_enter(mtx);
        coos::info!("[HIGH] acquired #{}", n);

        for _ in 0..1_000 {
            cortex_m::asm::nop();
        }

        let _ = os_mutex_leave(mtx);
        let _ = os_time_dly(100);
    }
}

/// Medium priority task (prio=10) - CPU bound
fn med_task_fn(_arg: *mut ()) -> ! {
    loop {
        for _ in 0..50_000 {
            cortex_m::asm::nop();
        }
        let _ = os_time_dly(10);
    }
}

/// Low priority task (prio=15) - holds the mutex long
fn low_task_fn(_arg: *mut ()) -> ! {
    let mtx = MTX_ID.load(Ordering::Relaxed) as OsMutexId;

    loop {
        let n = LOW_RUNS.fetch_add(1, Ordering::Relaxed) + 1;

        let _ = os_mutex_enter(mtx);
        coos::info!("[LOW] holding #{}", n);

        for _ in 0..100_000 {
            cortex_m::asm::nop();
        }

        let _ = os_mutex_leave(mtx);
        let _ = os_time_dly(200);
    }
}

#[entry]
fn main() -> ! {
    coos::info!("priority inversion demo: H(5) M(10) L(15)");

    coos::os_init().expect("OS init failed");
    let mtx = os_mutex_create().expect("mutex failed");
    MTX_ID.store(mtx as u32, Ordering::Relaxed);

    os_task_create("L", low_task_fn, core::ptr::null_mut(), 15, unsafe {
        &mut LOW_STK
    })
    .unwrap();
    os_task_create("M", med_task_fn, core::ptr::null_mut(), 10, unsafe {
        &mut MED_STK
    })
    .unwrap();
    os_task_create("H", high_task_fn, core::ptr::null_mut(), 5, unsafe {
        &mut HIGH_STK
    })
    .unwrap();

    coos::info!("starting...");
    coos::os_start().expect("OS start failed");

    loop {
        cortex_m::asm::wfi();
    }
}

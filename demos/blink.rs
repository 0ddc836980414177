//! Blink demo - LED blinking under the kernel on STM32F401

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use cortex_m_rt::entry;
use coos::os_task_create;
use coos::time::os_time_dly;
use coos::types::OsStkElement;
use stm32f4xx_hal::{gpio::GpioExt, pac};

// ============ Task Storage ============

static mut BLINK_STK: [OsStkElement; 512] = [0; 512];
static mut REPORT_STK: [OsStkElement; 512] = [0; 512];

// ============ Tasks ============

fn blink_task(_: *mut ()) -> ! {
    let dp = unsafe { pac::Peripherals::steal() };
    let gpioa = dp.GPIOA.split();
    let mut led = gpioa.pa5.into_push_pull_output();

    coos::info!("blink task started");
    loop {
        led.set_high();
        let _ = os_time_dly(500);

        led.set_low();
        let _ = os_time_dly(500);
    }
}

fn report_task(_: *mut ()) -> ! {
    loop {
        coos::info!("tick {}", coos::os_time_get() as u32);
        let _ = os_time_dly(1000);
    }
}

// ============ Main ============

#[entry]
fn main() -> ! {
    coos::os_init().expect("OS init failed");

    os_task_create("Blink", blink_task, core::ptr::null_mut(), 5, unsafe {
        &mut BLINK_STK
    })
    .expect("blink task failed");

    os_task_create("Report", report_task, core::ptr::null_mut(), 6, unsafe {
        &mut REPORT_STK
    })
    .expect("report task failed");

    coos::info!("starting kernel");
    coos::os_start().expect("OS start failed");

    loop {
        cortex_m::asm::nop();
    }
}

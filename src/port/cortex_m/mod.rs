//! Cortex-M port implementation
//!
//! Context switching via the PendSV exception. PendSV runs at the lowest
//! priority so a switch requested from a task or an ISR is taken only once
//! every other exception has unwound.

#![allow(named_asm_labels)]

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;

use crate::kernel::OS;
use crate::task::OsTaskFn;
use crate::types::OsStkElement;

/// Interrupt stack for MSP
#[no_mangle]
static mut INTERRUPT_STACK: [u64; 256] = [0xDEADBEEF_DEADBEEF; 256];

/// Initialize the SysTick timer for system tick generation
///
/// `reload` is the core-clock divider, e.g. 16 MHz / 1000 Hz = 16_000.
pub fn os_cpu_systick_init(reload: u32) {
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.SYST.set_reload(reload - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Restore the context of the first task
///
/// PSP is cleared so the first PendSV skips the save phase.
#[no_mangle]
#[allow(static_mut_refs)]
pub unsafe extern "C" fn os_start_high_rdy() {
    unsafe {
        let mut scb = cortex_m::Peripherals::steal().SCB;

        scb.set_priority(SystemHandler::PendSV, 0xF0);
        scb.set_priority(SystemHandler::SysTick, 0xF0);

        let msp_top = &INTERRUPT_STACK as *const _ as u32
            + core::mem::size_of_val(&INTERRUPT_STACK) as u32;

        asm!("msr msp, {0}", in(reg) msp_top);
        asm!("msr psp, {0}", in(reg) 0);

        cortex_m::interrupt::enable();
        cortex_m::peripheral::SCB::set_pendsv();

        loop {
            cortex_m::asm::wfi();
        }
    }
}

/// Trigger a context switch
#[inline(always)]
pub fn os_ctx_sw() {
    cortex_m::peripheral::SCB::set_pendsv();
}

/// Context structure stored on the task stack
#[repr(C, align(4))]
struct CtxStk {
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
    exc_return: u32,
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}
const CTX_STACK_WORDS: usize = 17;

/// Build the initial stack frame for a new task
pub unsafe fn os_task_stk_init(
    entry: OsTaskFn,
    arg: *mut (),
    stk_base: *mut OsStkElement,
    stk_size: usize,
) -> *mut OsStkElement {
    unsafe {
        let stk_top = stk_base.add(stk_size);
        let stk_aligned = ((stk_top as usize) & !7) as *mut u32;

        let frame_ptr = stk_aligned.sub(CTX_STACK_WORDS) as *mut CtxStk;

        (*frame_ptr) = CtxStk {
            r4: 0x04040404,
            r5: 0x05050505,
            r6: 0x06060606,
            r7: 0x07070707,
            r8: 0x08080808,
            r9: 0x09090909,
            r10: 0x10101010,
            r11: 0x11111111,
            exc_return: 0xFFFF_FFFD,
            r0: arg as u32,
            r1: 0,
            r2: 0,
            r3: 0,
            r12: 0,
            lr: os_task_return as *const () as u32,
            pc: (entry as usize as u32) | 1,
            xpsr: 0x0100_0000,
        };

        // One word below the frame to match PendSV's "add r0, r0, #4"
        (frame_ptr as *mut u32).sub(1) as *mut OsStkElement
    }
}

/// Save the outgoing stack pointer, commit the pending switch and return
/// the incoming task's stack pointer
#[inline(never)]
#[no_mangle]
unsafe extern "C" fn pendsv_switch_context(cur_sp: *mut u32) -> *mut u32 {
    unsafe {
        let k = OS.get_unchecked();

        if !cur_sp.is_null() {
            if let Some(cur) = k.current_task() {
                k.tcbs[cur as usize].stk_ptr = cur_sp;
            }
        }

        let running = k.commit_switch().or(k.current_task());
        match running {
            Some(id) => k.tcbs[id as usize].stk_ptr,
            None => core::ptr::null_mut(),
        }
    }
}

/// PendSV exception handler - performs the full context switch
///
/// 1. Save R4-R11, LR onto the current task's PSP (skipped for the very
///    first switch, where PSP is still zero)
/// 2. Commit the switch in the kernel
/// 3. Restore R4-R11, LR from the new task's stack
/// 4. Exception return
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "dsb",
        "isb",
        "mrs r0, psp",
        "cbz r0, 1f",
        "stmdb r0!, {{r4-r11, lr}}",
        "sub r0, r0, #4",
        "1:",
        "bl pendsv_switch_context",
        "cbz r0, 2f",
        "add r0, r0, #4",
        "ldmia r0!, {{r4-r11, lr}}",
        "msr psp, r0",
        "2:",
        "cpsie i",
        "dsb",
        "isb",
        "bx lr",
    );
}

/// Task return handler; tasks never return, this parks the CPU
#[no_mangle]
fn os_task_return() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

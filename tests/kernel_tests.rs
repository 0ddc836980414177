//! Kernel integration tests
//!
//! Each test builds a private kernel instance and drives it as the CPU
//! would: blocking calls return `Blocked`, the test commits the pending
//! context switch, and `pend_result` completes the pend once the task was
//! woken. Ticks are fed by calling `tick()` directly.

use coos::config::{CFG_MAX_EVENT, CFG_MAX_MUTEX, CFG_MAX_SERVICE_REQUEST, CFG_MAX_USER_TASKS};
use coos::error::OsError;
use coos::kernel::Kernel;
use coos::types::{
    OsDelOpt, OsMailPend, OsPend, OsPrio, OsSortType, OsStkElement, OsTaskId, OsTaskState,
};
use coos::KernelConfig;

// ============ Harness ============

fn task_body(_: *mut ()) -> ! {
    unreachable!("task bodies never run on the host");
}

fn leak_stack() -> (*mut OsStkElement, usize) {
    let stk: &'static mut [OsStkElement; 64] = Box::leak(Box::new([0; 64]));
    (stk.as_mut_ptr(), stk.len())
}

fn new_kernel() -> Kernel {
    new_kernel_with(KernelConfig::new())
}

fn new_kernel_with(cfg: KernelConfig) -> Kernel {
    let mut k = Kernel::new();
    let (base, size) = leak_stack();
    k.init(cfg, task_body, base, size).expect("init failed");
    k
}

fn spawn(k: &mut Kernel, name: &'static str, prio: OsPrio) -> OsTaskId {
    let (base, size) = leak_stack();
    k.task_create(name, task_body, core::ptr::null_mut(), prio, base, size)
        .expect("task create failed")
}

fn mail(v: usize) -> *mut () {
    v as *mut ()
}

// ============ Lifecycle ============

#[test]
fn init_creates_idle_and_start_picks_highest() {
    let mut k = new_kernel();
    let t = spawn(&mut k, "a", 10);

    assert!(k.is_initialized());
    k.start().unwrap();
    assert!(k.is_running());
    assert_eq!(k.current_task(), Some(t));
    assert_eq!(k.task_state(t).unwrap(), OsTaskState::Running);

    assert_eq!(k.start(), Err(OsError::OsRunning));
}

#[test]
fn start_with_only_idle_runs_idle() {
    let mut k = new_kernel();
    k.start().unwrap();
    let idle = k.current_task().unwrap();
    assert_eq!(k.task_prio(idle).unwrap(), coos::config::CFG_PRIO_IDLE);
}

#[test]
fn higher_priority_creation_preempts() {
    let mut k = new_kernel();
    let low = spawn(&mut k, "low", 20);
    k.start().unwrap();
    assert_eq!(k.current_task(), Some(low));

    let high = spawn(&mut k, "high", 5);
    assert!(k.switch_pending());
    k.commit_switch();
    assert_eq!(k.current_task(), Some(high));
    assert_eq!(k.task_state(low).unwrap(), OsTaskState::Ready);
}

// ============ Mailbox ============

#[test]
fn mailbox_single_slot_invariant() {
    let mut k = new_kernel();
    k.start().unwrap();
    let mb = k.mbox_create(OsSortType::Fifo).unwrap();

    assert_eq!(k.event_counter(mb).unwrap(), 0);
    assert_eq!(k.mbox_accept(mb), Err(OsError::MboxEmpty));

    k.mbox_post(mb, mail(1)).unwrap();
    assert_eq!(k.event_counter(mb).unwrap(), 1);

    // Full mailbox refuses without mutating
    assert_eq!(k.mbox_post(mb, mail(2)), Err(OsError::MboxFull));
    assert_eq!(k.event_counter(mb).unwrap(), 1);

    assert_eq!(k.mbox_accept(mb).unwrap(), mail(1));
    assert_eq!(k.event_counter(mb).unwrap(), 0);
    assert_eq!(k.mbox_accept(mb), Err(OsError::MboxEmpty));
}

#[test]
fn scenario_a_mailbox_handoff() {
    let mut k = new_kernel();
    let low = spawn(&mut k, "L", 10);
    k.start().unwrap();
    let mb = k.mbox_create(OsSortType::Fifo).unwrap();

    // L pends forever (timeout 0): no delay-list membership
    assert_eq!(k.current_task(), Some(low));
    assert_eq!(k.mbox_pend(mb, 0).unwrap(), OsMailPend::Blocked);
    assert_eq!(k.task_state(low).unwrap(), OsTaskState::Waiting);
    assert_eq!(k.delay_remaining(low), None);
    k.commit_switch();

    // H is created later but runs first by priority
    let high = spawn(&mut k, "H", 5);
    k.commit_switch();
    assert_eq!(k.current_task(), Some(high));

    k.mbox_post(mb, mail(0x58)).unwrap();

    // L wakes with the payload; the slot never shows occupied
    assert_eq!(k.task_state(low).unwrap(), OsTaskState::Ready);
    assert_eq!(k.event_counter(mb).unwrap(), 0);
    assert_eq!(k.pend_result(low).unwrap(), mail(0x58));
}

#[test]
fn mailbox_pend_immediate_when_full() {
    let mut k = new_kernel();
    let _t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let mb = k.mbox_create(OsSortType::Fifo).unwrap();

    k.mbox_post(mb, mail(7)).unwrap();
    assert_eq!(k.mbox_pend(mb, 0).unwrap(), OsMailPend::Mail(mail(7)));
    assert_eq!(k.event_counter(mb).unwrap(), 0);
}

// ============ Semaphore ============

#[test]
fn semaphore_bound_invariant() {
    let mut k = new_kernel();
    k.start().unwrap();
    let sem = k.sem_create(1, 2, OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_count(sem).unwrap(), 1);
    k.sem_accept(sem).unwrap();
    assert_eq!(k.sem_count(sem).unwrap(), 0);

    // Empty semaphore refuses without mutating
    assert_eq!(k.sem_accept(sem), Err(OsError::SemEmpty));
    assert_eq!(k.sem_count(sem).unwrap(), 0);

    k.sem_post(sem).unwrap();
    k.sem_post(sem).unwrap();
    assert_eq!(k.sem_count(sem).unwrap(), 2);

    // Ceiling refuses without mutating
    assert_eq!(k.sem_post(sem), Err(OsError::SemFull));
    assert_eq!(k.sem_count(sem).unwrap(), 2);
}

#[test]
fn sem_create_validates_counts() {
    let mut k = new_kernel();
    assert_eq!(
        k.sem_create(3, 2, OsSortType::Fifo),
        Err(OsError::InvalidParameter)
    );
}

#[test]
fn scenario_b_semaphore_timeout() {
    let mut k = new_kernel();
    let t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_pend(sem, 5).unwrap(), OsPend::Blocked);
    k.commit_switch();

    for tick in 1..=5u32 {
        assert_eq!(
            k.task_state(t).unwrap(),
            OsTaskState::Waiting,
            "woke early at tick {}",
            tick - 1
        );
        k.tick();
    }

    assert_eq!(k.task_state(t).unwrap(), OsTaskState::Ready);
    assert_eq!(k.pend_result(t), Err(OsError::Timeout));
    assert_eq!(k.sem_count(sem).unwrap(), 0);
}

#[test]
fn timeout_race_post_before_expiry() {
    let mut k = new_kernel();
    let t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_pend(sem, 5).unwrap(), OsPend::Blocked);
    assert!(k.delay_remaining(t).is_some());
    k.commit_switch();

    for _ in 0..4 {
        k.tick();
    }
    // Post wins the race at tick T-1
    k.sem_post(sem).unwrap();

    assert_eq!(k.task_state(t).unwrap(), OsTaskState::Ready);
    // Delay-list linkage was torn down by the wake path
    assert_eq!(k.delay_remaining(t), None);
    assert!(k.pend_result(t).is_ok());
    // The token was handed over, not accumulated
    assert_eq!(k.sem_count(sem).unwrap(), 0);

    // The expiry tick must not wake anything twice
    k.tick();
    assert_eq!(k.task_state(t).unwrap(), OsTaskState::Ready);
}

#[test]
fn timeout_race_post_after_expiry() {
    let mut k = new_kernel();
    let t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_pend(sem, 5).unwrap(), OsPend::Blocked);
    k.commit_switch();

    for _ in 0..5 {
        k.tick();
    }
    // The dispose already fired; the post finds no waiter
    k.sem_post(sem).unwrap();

    assert_eq!(k.pend_result(t), Err(OsError::Timeout));
    assert_eq!(k.sem_count(sem).unwrap(), 1);
}

#[test]
fn sem_wake_order_fifo_vs_prio() {
    for (sort, expect_first) in [(OsSortType::Fifo, 0usize), (OsSortType::Prio, 1usize)] {
        let mut k = new_kernel();
        let slow = spawn(&mut k, "slow", 10);
        k.start().unwrap();
        let sem = k.sem_create(0, 1, sort).unwrap();

        // The low-priority task arrives first
        assert_eq!(k.current_task(), Some(slow));
        assert_eq!(k.sem_pend(sem, 0).unwrap(), OsPend::Blocked);
        k.commit_switch();

        let fast = spawn(&mut k, "fast", 5);
        k.commit_switch();
        assert_eq!(k.current_task(), Some(fast));
        assert_eq!(k.sem_pend(sem, 0).unwrap(), OsPend::Blocked);
        k.commit_switch();

        k.sem_post(sem).unwrap();

        let tasks = [slow, fast];
        let woken = tasks[expect_first];
        let still = tasks[1 - expect_first];
        assert_eq!(k.task_state(woken).unwrap(), OsTaskState::Ready, "{:?}", sort);
        assert_eq!(k.task_state(still).unwrap(), OsTaskState::Waiting, "{:?}", sort);
    }
}

// ============ Delay list ============

#[test]
fn delay_list_delta_invariant() {
    let timeouts: [u32; 8] = [37, 12, 90, 12, 55, 3, 70, 21];

    let mut k = new_kernel();
    let tasks: Vec<OsTaskId> = (0..timeouts.len())
        .map(|i| spawn(&mut k, "d", (i + 1) as OsPrio))
        .collect();
    k.start().unwrap();

    // Highest priority runs first, so tasks block in creation order
    for (i, &t) in tasks.iter().enumerate() {
        assert_eq!(k.current_task(), Some(t));
        k.tick_delay(timeouts[i]).unwrap();
        k.commit_switch();
    }

    // Partial delta sums equal absolute remaining ticks for every node
    for (i, &t) in tasks.iter().enumerate() {
        assert_eq!(k.delay_remaining(t), Some(timeouts[i]), "task {}", i);
    }

    // Advance the clock; wake ticks must match the sorted timeouts
    let max = *timeouts.iter().max().unwrap();
    let mut wake_tick = vec![0u32; tasks.len()];
    for now in 1..=max {
        k.tick();
        for (i, &t) in tasks.iter().enumerate() {
            if wake_tick[i] == 0 && k.task_state(t).unwrap() == OsTaskState::Ready {
                wake_tick[i] = now;
            }
            // Invariant holds at every stable point for still-delayed tasks
            if k.task_state(t).unwrap() == OsTaskState::Waiting {
                assert_eq!(k.delay_remaining(t), Some(timeouts[i] - now));
            }
        }
    }

    assert_eq!(wake_tick, timeouts.to_vec());
}

#[test]
fn delay_remove_folds_delta_into_successor() {
    let mut k = new_kernel();
    let a = spawn(&mut k, "a", 1);
    let b = spawn(&mut k, "b", 2);
    let c = spawn(&mut k, "c", 3);
    k.start().unwrap();

    k.tick_delay(10).unwrap();
    k.commit_switch();
    k.tick_delay(20).unwrap();
    k.commit_switch();
    k.tick_delay(30).unwrap();
    k.commit_switch();

    // Cut the middle task's delay short; the others keep their deadlines
    k.reset_task_delay(b, 0).unwrap();
    assert_eq!(k.task_state(b).unwrap(), OsTaskState::Ready);
    assert_eq!(k.delay_remaining(a), Some(10));
    assert_eq!(k.delay_remaining(c), Some(30));

    // Re-arm works too
    k.reset_task_delay(a, 25).unwrap();
    assert_eq!(k.delay_remaining(a), Some(25));
    assert_eq!(k.delay_remaining(c), Some(30));

    assert_eq!(k.reset_task_delay(b, 5), Err(OsError::NotInDelayList));
}

#[test]
fn tick_delay_rejects_bad_contexts() {
    let mut k = new_kernel();
    let _t = spawn(&mut k, "t", 10);
    k.start().unwrap();

    assert_eq!(k.tick_delay(0), Ok(()));

    k.sched_lock().unwrap();
    assert_eq!(k.tick_delay(5), Err(OsError::SchedInLock));
    k.sched_unlock().unwrap();

    k.isr_enter();
    assert_eq!(k.tick_delay(5), Err(OsError::CallInIsr));
    k.isr_exit();
}

// ============ Mutex ============

#[test]
fn scenario_c_priority_inheritance() {
    let mut k = new_kernel();
    let owner = spawn(&mut k, "owner", 5);
    k.start().unwrap();
    let m = k.mutex_create().unwrap();

    assert_eq!(k.current_task(), Some(owner));
    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Acquired);
    assert_eq!(k.mutex_owner(m).unwrap(), Some(owner));

    let acquirer = spawn(&mut k, "acq", 1);
    k.commit_switch();
    assert_eq!(k.current_task(), Some(acquirer));

    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Blocked);
    // Owner promoted to the acquirer's priority immediately
    assert_eq!(k.task_prio(owner).unwrap(), 1);
    assert_eq!(k.mutex_owner_prio(m).unwrap(), Some(1));
    k.commit_switch();
    assert_eq!(k.current_task(), Some(owner));

    k.mutex_leave(m).unwrap();
    // Owner restored exactly; the acquirer owns the mutex at its own prio
    assert_eq!(k.task_prio(owner).unwrap(), 5);
    assert_eq!(k.mutex_owner(m).unwrap(), Some(acquirer));
    assert_eq!(k.task_prio(acquirer).unwrap(), 1);
    assert!(k.pend_result(acquirer).is_ok());
}

#[test]
fn mutual_exclusion_single_owner() {
    let mut k = new_kernel();
    let a = spawn(&mut k, "a", 10);
    k.start().unwrap();
    let m = k.mutex_create().unwrap();

    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Acquired);
    // Re-entry by the owner is rejected, not deadlocked
    assert_eq!(k.mutex_enter(m), Err(OsError::MutexOwner));

    let b = spawn(&mut k, "b", 5);
    k.commit_switch();
    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Blocked);
    k.commit_switch();

    // At most one task is ever the owner
    assert_eq!(k.mutex_owner(m).unwrap(), Some(a));
    assert_eq!(k.task_state(b).unwrap(), OsTaskState::Waiting);

    k.mutex_leave(m).unwrap();
    assert_eq!(k.mutex_owner(m).unwrap(), Some(b));

    // Leaving a mutex one does not own fails
    assert_eq!(k.mutex_leave(m), Err(OsError::NotMutexOwner));
}

#[test]
fn mutex_handoff_is_fifo_with_tracked_priority() {
    let mut k = new_kernel();
    let owner = spawn(&mut k, "owner", 10);
    k.start().unwrap();
    let m = k.mutex_create().unwrap();

    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Acquired);

    // First waiter at priority 3, second at priority 1
    let w1 = spawn(&mut k, "w1", 3);
    k.commit_switch();
    assert_eq!(k.current_task(), Some(w1));
    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Blocked);
    assert_eq!(k.task_prio(owner).unwrap(), 3);
    k.commit_switch();

    let w2 = spawn(&mut k, "w2", 1);
    k.commit_switch();
    assert_eq!(k.current_task(), Some(w2));
    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Blocked);
    assert_eq!(k.task_prio(owner).unwrap(), 1);
    k.commit_switch();
    assert_eq!(k.current_task(), Some(owner));

    k.mutex_leave(m).unwrap();
    // Arrival order decides the next owner; it runs at the priority of
    // the highest waiter so it cannot be starved underneath w2
    assert_eq!(k.mutex_owner(m).unwrap(), Some(w1));
    assert_eq!(k.task_prio(w1).unwrap(), 1);
    assert_eq!(k.task_prio(owner).unwrap(), 10);

    k.commit_switch();
    assert_eq!(k.current_task(), Some(w1));
    k.mutex_leave(m).unwrap();
    assert_eq!(k.mutex_owner(m).unwrap(), Some(w2));
    // w1 drops back to its own priority once it releases
    assert_eq!(k.task_prio(w1).unwrap(), 3);
    assert_eq!(k.task_prio(w2).unwrap(), 1);
}

#[test]
fn deleted_waiter_reapplies_inheritance() {
    let mut k = new_kernel();
    let owner = spawn(&mut k, "owner", 10);
    k.start().unwrap();
    let m = k.mutex_create().unwrap();
    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Acquired);

    let b = spawn(&mut k, "b", 1);
    k.commit_switch();
    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Blocked);
    assert_eq!(k.task_prio(owner).unwrap(), 1);
    k.commit_switch();
    assert_eq!(k.current_task(), Some(owner));

    // Park the owner on the delay list so a third task can block too
    k.tick_delay(10).unwrap();
    k.commit_switch();

    let c = spawn(&mut k, "c", 3);
    k.commit_switch();
    assert_eq!(k.current_task(), Some(c));
    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Blocked);
    k.commit_switch();

    // Deleting the tracked highest waiter demotes the owner to the
    // next-highest waiter's priority
    k.task_del(b).unwrap();
    assert_eq!(k.task_prio(owner).unwrap(), 3);

    for _ in 0..10 {
        k.tick();
    }
    assert_eq!(k.task_state(owner).unwrap(), OsTaskState::Ready);
    k.commit_switch();
    assert_eq!(k.current_task(), Some(owner));

    k.mutex_leave(m).unwrap();
    assert_eq!(k.task_prio(owner).unwrap(), 10);
    assert_eq!(k.mutex_owner(m).unwrap(), Some(c));
    assert_eq!(k.task_prio(c).unwrap(), 3);
}

#[test]
fn mutex_rejects_isr_and_lock_contexts() {
    let mut k = new_kernel();
    let _t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let m = k.mutex_create().unwrap();

    k.isr_enter();
    assert_eq!(k.mutex_enter(m), Err(OsError::CallInIsr));
    assert_eq!(k.mutex_leave(m), Err(OsError::CallInIsr));
    k.isr_exit();

    k.sched_lock().unwrap();
    assert_eq!(k.mutex_enter(m), Err(OsError::SchedInLock));
    k.sched_unlock().unwrap();

    assert_eq!(k.mutex_enter(99), Err(OsError::InvalidId));
}

// ============ Scheduler lock & ISR service requests ============

#[test]
fn sched_lock_nests_and_defers_dispatch() {
    let mut k = new_kernel();
    let low = spawn(&mut k, "low", 20);
    k.start().unwrap();
    assert_eq!(k.current_task(), Some(low));

    k.sched_lock().unwrap();
    k.sched_lock().unwrap();

    // A higher-priority task becoming ready must not dispatch yet
    let high = spawn(&mut k, "high", 5);
    assert_eq!(k.task_state(high).unwrap(), OsTaskState::Ready);
    assert!(!k.switch_pending());

    k.sched_unlock().unwrap();
    assert!(!k.switch_pending());
    k.sched_unlock().unwrap();
    assert!(k.switch_pending());
    k.commit_switch();
    assert_eq!(k.current_task(), Some(high));

    assert_eq!(k.sched_unlock(), Err(OsError::SchedNotLocked));
}

#[test]
fn blocking_calls_rejected_under_sched_lock() {
    let mut k = new_kernel();
    let _t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let sem = k.sem_create(1, 1, OsSortType::Fifo).unwrap();
    let mb = k.mbox_create(OsSortType::Fifo).unwrap();

    k.sched_lock().unwrap();
    assert_eq!(k.sem_pend(sem, 0), Err(OsError::SchedInLock));
    assert_eq!(k.mbox_pend(mb, 0), Err(OsError::SchedInLock));
    k.sched_unlock().unwrap();
}

#[test]
fn blocking_calls_rejected_in_isr() {
    let mut k = new_kernel();
    let _t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let sem = k.sem_create(1, 1, OsSortType::Fifo).unwrap();
    let mb = k.mbox_create(OsSortType::Fifo).unwrap();

    k.isr_enter();
    assert_eq!(k.sem_pend(sem, 0), Err(OsError::CallInIsr));
    assert_eq!(k.mbox_pend(mb, 0), Err(OsError::CallInIsr));
    assert_eq!(k.sched_lock(), Err(OsError::CallInIsr));
    k.isr_exit();
}

#[test]
fn isr_post_defers_until_unlock() {
    let mut k = new_kernel();
    let waiter = spawn(&mut k, "w", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_pend(sem, 0).unwrap(), OsPend::Blocked);
    k.commit_switch();

    k.sched_lock().unwrap();
    k.isr_sem_post(sem).unwrap();
    // Deferred: the waiter must not be touched while the lock is held
    assert_eq!(k.task_state(waiter).unwrap(), OsTaskState::Waiting);

    k.sched_unlock().unwrap();
    // The drain delivered the post
    assert_eq!(k.task_state(waiter).unwrap(), OsTaskState::Ready);
    assert!(k.pend_result(waiter).is_ok());
}

#[test]
fn isr_mbox_post_defers_payload() {
    let mut k = new_kernel();
    let waiter = spawn(&mut k, "w", 10);
    k.start().unwrap();
    let mb = k.mbox_create(OsSortType::Fifo).unwrap();

    assert_eq!(k.mbox_pend(mb, 0).unwrap(), OsMailPend::Blocked);
    k.commit_switch();

    k.sched_lock().unwrap();
    k.isr_mbox_post(mb, mail(0x77)).unwrap();
    assert_eq!(k.task_state(waiter).unwrap(), OsTaskState::Waiting);
    k.sched_unlock().unwrap();

    assert_eq!(k.pend_result(waiter).unwrap(), mail(0x77));
}

#[test]
fn isr_post_without_lock_is_immediate() {
    let mut k = new_kernel();
    k.start().unwrap();
    let sem = k.sem_create(0, 2, OsSortType::Fifo).unwrap();

    k.isr_enter();
    k.isr_sem_post(sem).unwrap();
    k.isr_exit();
    assert_eq!(k.sem_count(sem).unwrap(), 1);
}

#[test]
fn service_request_queue_overflows() {
    let mut k = new_kernel();
    k.start().unwrap();
    let sem = k
        .sem_create(0, CFG_MAX_SERVICE_REQUEST as u16 + 4, OsSortType::Fifo)
        .unwrap();

    k.sched_lock().unwrap();
    for _ in 0..CFG_MAX_SERVICE_REQUEST {
        k.isr_sem_post(sem).unwrap();
    }
    assert_eq!(k.isr_sem_post(sem), Err(OsError::SrqFull));
    k.sched_unlock().unwrap();

    assert_eq!(k.sem_count(sem).unwrap(), CFG_MAX_SERVICE_REQUEST as u16);
}

#[test]
fn tick_dispose_deferred_under_lock() {
    let mut k = new_kernel();
    let t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_pend(sem, 1).unwrap(), OsPend::Blocked);
    k.commit_switch();

    k.sched_lock().unwrap();
    k.tick();
    // The delay expired but the dispose must wait for the unlock
    assert_eq!(k.task_state(t).unwrap(), OsTaskState::Waiting);

    k.sched_unlock().unwrap();
    assert_eq!(k.task_state(t).unwrap(), OsTaskState::Ready);
    assert_eq!(k.pend_result(t), Err(OsError::Timeout));
}

// ============ Event deletion ============

#[test]
fn delete_refuses_with_waiters_unless_forced() {
    let mut k = new_kernel();
    let w = spawn(&mut k, "w", 10);
    k.start().unwrap();
    let mb = k.mbox_create(OsSortType::Fifo).unwrap();

    assert_eq!(k.mbox_pend(mb, 0).unwrap(), OsMailPend::Blocked);
    k.commit_switch();

    assert_eq!(k.mbox_del(mb, OsDelOpt::NoPend), Err(OsError::TaskWaiting));
    assert_eq!(k.task_state(w).unwrap(), OsTaskState::Waiting);

    k.mbox_del(mb, OsDelOpt::Anyway).unwrap();
    assert_eq!(k.task_state(w).unwrap(), OsTaskState::Ready);
    assert_eq!(k.pend_result(w), Err(OsError::ObjDel));

    // The slot is recyclable afterwards
    let again = k.mbox_create(OsSortType::Fifo).unwrap();
    assert_eq!(again, mb);
}

#[test]
fn delete_tears_down_delay_membership() {
    let mut k = new_kernel();
    let w = spawn(&mut k, "w", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_pend(sem, 50).unwrap(), OsPend::Blocked);
    assert!(k.delay_remaining(w).is_some());
    k.commit_switch();

    k.sem_del(sem, OsDelOpt::Anyway).unwrap();
    assert_eq!(k.delay_remaining(w), None);
    assert_eq!(k.pend_result(w), Err(OsError::ObjDel));
}

// ============ Priority changes ============

#[test]
fn set_prio_moves_ready_task() {
    let mut k = new_kernel();
    let a = spawn(&mut k, "a", 10);
    let b = spawn(&mut k, "b", 12);
    k.start().unwrap();
    assert_eq!(k.current_task(), Some(a));

    k.set_prio(b, 4).unwrap();
    assert_eq!(k.task_prio(b).unwrap(), 4);
    assert!(k.switch_pending());
    k.commit_switch();
    assert_eq!(k.current_task(), Some(b));
}

#[test]
fn set_prio_resorts_prio_ordered_waiters() {
    let mut k = new_kernel();
    let w1 = spawn(&mut k, "w1", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Prio).unwrap();

    assert_eq!(k.sem_pend(sem, 0).unwrap(), OsPend::Blocked);
    k.commit_switch();

    let w2 = spawn(&mut k, "w2", 5);
    k.commit_switch();
    assert_eq!(k.sem_pend(sem, 0).unwrap(), OsPend::Blocked);
    k.commit_switch();

    // w2 heads the queue; promoting w1 past it reorders the list
    k.set_prio(w1, 2).unwrap();
    k.sem_post(sem).unwrap();
    assert_eq!(k.task_state(w1).unwrap(), OsTaskState::Ready);
    assert_eq!(k.task_state(w2).unwrap(), OsTaskState::Waiting);
}

#[test]
fn set_prio_on_boosted_owner_is_deferred() {
    let mut k = new_kernel();
    let owner = spawn(&mut k, "owner", 5);
    k.start().unwrap();
    let m = k.mutex_create().unwrap();
    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Acquired);

    let b = spawn(&mut k, "b", 1);
    k.commit_switch();
    assert_eq!(k.mutex_enter(m).unwrap(), OsPend::Blocked);
    assert_eq!(k.task_prio(owner).unwrap(), 1);
    k.commit_switch();

    // Demoting the boosted owner only updates the restore priority
    k.set_prio(owner, 8).unwrap();
    assert_eq!(k.task_prio(owner).unwrap(), 1);

    k.mutex_leave(m).unwrap();
    assert_eq!(k.task_prio(owner).unwrap(), 8);
}

#[test]
fn idle_task_is_protected() {
    let mut k = new_kernel();
    k.start().unwrap();
    let idle = k.current_task().unwrap();

    assert_eq!(k.set_prio(idle, 5), Err(OsError::ProtectedTask));
    assert_eq!(k.task_del(idle), Err(OsError::ProtectedTask));
}

// ============ Task lifecycle ============

#[test]
fn task_delete_recycles_tcb() {
    let mut k = new_kernel();
    let a = spawn(&mut k, "a", 10);
    k.start().unwrap();

    k.task_del(a).unwrap();
    assert_eq!(k.task_state(a).unwrap(), OsTaskState::Dormant);

    // The slot comes back for the next creation
    let b = spawn(&mut k, "b", 11);
    assert_eq!(b, a);

    assert_eq!(k.task_del(99), Err(OsError::InvalidId));
}

#[test]
fn deleting_current_task_reschedules() {
    let mut k = new_kernel();
    let a = spawn(&mut k, "a", 10);
    let b = spawn(&mut k, "b", 12);
    k.start().unwrap();
    assert_eq!(k.current_task(), Some(a));

    k.task_del(a).unwrap();
    assert!(k.switch_pending());
    k.commit_switch();
    assert_eq!(k.current_task(), Some(b));
}

#[test]
fn deleting_delayed_waiter_unlinks_everywhere() {
    let mut k = new_kernel();
    let w = spawn(&mut k, "w", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_pend(sem, 50).unwrap(), OsPend::Blocked);
    k.commit_switch();

    k.task_del(w).unwrap();
    assert_eq!(k.delay_remaining(w), None);

    // Nothing left to wake: the post lands in the counter
    k.sem_post(sem).unwrap();
    assert_eq!(k.sem_count(sem).unwrap(), 1);
    for _ in 0..50 {
        k.tick();
    }
}

#[test]
fn resource_exhaustion_errors() {
    let mut k = new_kernel();

    for i in 0..CFG_MAX_USER_TASKS {
        spawn(&mut k, "t", (i + 1) as OsPrio);
    }
    let (base, size) = leak_stack();
    assert_eq!(
        k.task_create("extra", task_body, core::ptr::null_mut(), 30, base, size),
        Err(OsError::NoFreeTcb)
    );

    for _ in 0..CFG_MAX_EVENT {
        k.mbox_create(OsSortType::Fifo).unwrap();
    }
    assert_eq!(k.mbox_create(OsSortType::Fifo), Err(OsError::NoFreeEvent));

    for _ in 0..CFG_MAX_MUTEX {
        k.mutex_create().unwrap();
    }
    assert_eq!(k.mutex_create(), Err(OsError::NoFreeMutex));
}

#[test]
fn parameter_checks_catch_bad_handles() {
    let mut k = new_kernel();
    let _t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Fifo).unwrap();
    let mb = k.mbox_create(OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_post(200), Err(OsError::InvalidId));
    assert_eq!(k.mbox_post(200, mail(1)), Err(OsError::InvalidId));

    // Type mismatches are invalid handles
    assert_eq!(k.sem_post(mb), Err(OsError::InvalidId));
    assert_eq!(k.mbox_post(sem, mail(1)), Err(OsError::InvalidId));

    let (base, size) = leak_stack();
    assert_eq!(
        k.task_create("bad", task_body, core::ptr::null_mut(), 63, base, size),
        Err(OsError::PrioInvalid)
    );
    assert_eq!(
        k.task_create("bad", task_body, core::ptr::null_mut(), 5, base, 8),
        Err(OsError::StkInvalid)
    );
}

#[test]
fn unchecked_kernel_still_schedules() {
    let mut k = new_kernel_with(KernelConfig::unchecked());
    let t = spawn(&mut k, "t", 10);
    k.start().unwrap();
    let sem = k.sem_create(0, 1, OsSortType::Fifo).unwrap();

    assert_eq!(k.sem_pend(sem, 3).unwrap(), OsPend::Blocked);
    k.commit_switch();
    k.sem_post(sem).unwrap();
    assert_eq!(k.task_state(t).unwrap(), OsTaskState::Ready);
    assert!(k.pend_result(t).is_ok());
}

// ============ Round robin ============

#[test]
fn round_robin_rotates_equal_priorities() {
    let mut k = new_kernel();
    let p = spawn(&mut k, "p", 5);
    let q = spawn(&mut k, "q", 5);
    k.start().unwrap();
    assert_eq!(k.current_task(), Some(p));

    for _ in 0..coos::config::CFG_TIME_QUANTA_DEFAULT {
        k.tick();
    }
    assert!(k.switch_pending());
    k.commit_switch();
    assert_eq!(k.current_task(), Some(q));
}

#[test]
fn tick_counts_monotonically() {
    let mut k = new_kernel();
    k.start().unwrap();
    assert_eq!(k.tick_count(), 0);
    for _ in 0..7 {
        k.tick();
    }
    assert_eq!(k.tick_count(), 7);
}

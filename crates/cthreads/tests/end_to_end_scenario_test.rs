//! Whole-surface scenarios combining threads, one-time initialization,
//! semaphore-guarded shared state, and per-thread storage with destructors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex as StdMutex, OnceLock};
use std::time::Duration;

use cthreads::{OnceFlag, Semaphore, SleepOutcome, TssKey, spawn, thread as cthread, tss};

static INIT: OnceFlag = OnceFlag::new();
static INIT_RUNS: AtomicUsize = AtomicUsize::new(0);
static COUNTER_SEM: OnceLock<Semaphore> = OnceLock::new();
static COUNTER: AtomicUsize = AtomicUsize::new(0);
static SCRATCH_KEY: StdMutex<Option<TssKey>> = StdMutex::new(None);
static SCRATCH_FREED: AtomicUsize = AtomicUsize::new(0);

fn free_scratch(value: usize) {
    // SAFETY: workers store only Box::into_raw pointers in this key.
    drop(unsafe { Box::from_raw(value as *mut u64) });
    SCRATCH_FREED.fetch_add(1, Ordering::SeqCst);
}

fn shared_init() {
    INIT_RUNS.fetch_add(1, Ordering::SeqCst);
    COUNTER_SEM
        .set(Semaphore::new(1, 1).unwrap())
        .unwrap_or_else(|_| unreachable!("initializer ran twice"));
    *SCRATCH_KEY.lock().unwrap() = Some(tss::create_key(Some(free_scratch)).unwrap());
}

fn worker(rounds: usize) -> i32 {
    INIT.call_once(shared_init);
    let sem = COUNTER_SEM.get().unwrap();
    let key = SCRATCH_KEY.lock().unwrap().unwrap();

    // Per-thread scratch the drain must reclaim after this worker exits.
    let scratch = Box::into_raw(Box::new(0u64));
    tss::set(key, scratch as usize).unwrap();

    for _ in 0..rounds {
        sem.wait();
        let before = COUNTER.load(Ordering::SeqCst);
        // Widen the window: an unguarded increment would routinely tear.
        assert_eq!(cthread::sleep(Duration::from_millis(1)), SleepOutcome::Completed);
        COUNTER.store(before + 1, Ordering::SeqCst);
        // SAFETY: scratch was stored above and only this thread reads it.
        unsafe { *(tss::get(key) as *mut u64) += 1 };
        sem.post().unwrap();
    }
    rounds as i32
}

#[test]
fn counter_under_semaphore_is_exact() {
    const WORKERS: usize = 4;
    const ROUNDS: usize = 5;

    let mut threads = Vec::new();
    for _ in 0..WORKERS {
        threads.push(spawn(worker, ROUNDS).unwrap());
    }
    for thread in threads {
        assert_eq!(thread.join().unwrap(), ROUNDS as i32);
    }

    // Every read-sleep-write round landed: the semaphore serialized them.
    assert_eq!(COUNTER.load(Ordering::SeqCst), WORKERS * ROUNDS);
    // The initializer ran once despite every worker racing to call it.
    assert_eq!(INIT_RUNS.load(Ordering::SeqCst), 1);
    assert!(INIT.has_run());
    // Each worker's scratch allocation was reclaimed before its join.
    assert_eq!(SCRATCH_FREED.load(Ordering::SeqCst), WORKERS);
    // The semaphore returned to its resting count.
    assert_eq!(COUNTER_SEM.get().unwrap().count(), 1);
}

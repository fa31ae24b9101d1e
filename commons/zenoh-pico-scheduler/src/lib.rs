//
// Copyright (c) 2023 ZettaScale Technology
//
// This program and the accompanying materials are made available under the
// terms of the Eclipse Public License 2.0 which is available at
// http://www.eclipse.org/legal/epl-2.0, or the Apache License, Version 2.0
// which is available at https://www.apache.org/licenses/LICENSE-2.0.
//
// SPDX-License-Identifier: EPL-2.0 OR Apache-2.0
//
// Contributors:
//   ZettaScale Zenoh Team, <zenoh@zettascale.tech>
//
//! The periodic task scheduler (spec §4.6): keep-alives, leases and
//! pending-query timeouts are all one-shot-or-recurring tasks kept in a
//! list ordered by `next_due_ms`. A background thread (the multi-threaded
//! build) or an explicit [`Scheduler::tick`] call (the single-threaded
//! build) pops the head task once it is due, releases the lock before
//! invoking the callback, and re-inserts it ahead of "now" — missed ticks
//! coalesce rather than firing a backlog.
//!
//! Task storage is a [`zenoh_pico_collections::Slist`] kept sorted by
//! `next_due_ms` via `push_sorted`, exactly the use case that collections
//! crate's doc comment calls out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use thiserror::Error;
use zenoh_pico_collections::Slist;

/// Compile-time-ish cap on the number of live tasks; a constructor
/// parameter rather than a hardcoded constant so tests can exercise the
/// capacity-error path without spinning up 64+ real tasks.
pub const DEFAULT_MAX_TASKS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is at capacity ({0} tasks)")]
    Capacity(usize),
    #[error("no such task")]
    UnknownTask,
}

/// A time source, injected so tests can drive the scheduler with a fake
/// clock instead of wall time (spec §4.6: "a time-source hook is accepted
/// for deterministic testing").
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// The default clock: milliseconds since the scheduler process started.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

struct Task {
    id: TaskId,
    next_due_ms: u64,
    period_ms: u64,
    cancelled: Arc<AtomicBool>,
    callback: Box<dyn FnMut() + Send>,
}

struct State {
    tasks: Slist<Task>,
    running: std::collections::HashMap<u64, Arc<AtomicBool>>,
    next_id: u64,
    count: usize,
}

/// The periodic scheduler. Cheap to share: clone the `Arc<Scheduler>` into
/// whatever spawns the background thread and into whichever module (the
/// transport engine's keep-alive/lease loop, the query engine's timeout
/// registration) needs to add or cancel tasks.
pub struct Scheduler {
    state: Mutex<State>,
    wake: Condvar,
    max_tasks: usize,
    clock: Arc<dyn Clock>,
    stopping: AtomicBool,
    /// Ticks since construction; exposed only for tests asserting the
    /// background thread actually ran.
    ticks: AtomicU64,
}

impl Scheduler {
    pub fn new(max_tasks: usize) -> Arc<Self> {
        Self::with_clock(max_tasks, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(max_tasks: usize, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Scheduler {
            state: Mutex::new(State {
                tasks: Slist::new(),
                running: std::collections::HashMap::new(),
                next_id: 1,
                count: 0,
            }),
            wake: Condvar::new(),
            max_tasks,
            clock,
            stopping: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
        })
    }

    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Registers a recurring task firing every `period_ms`, first due at
    /// `now + period_ms`. `period_ms == 0` registers a one-shot task (it is
    /// never automatically re-armed; `callback` should call
    /// [`Scheduler::remove`] on itself via a captured id if it wants to
    /// stop, or just let the caller drop the returned `TaskId`).
    pub fn add<F>(&self, period_ms: u64, callback: F) -> Result<TaskId, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        let mut state = self.state.lock().unwrap();
        if state.count >= self.max_tasks {
            return Err(SchedulerError::Capacity(self.max_tasks));
        }
        let id = TaskId(state.next_id);
        state.next_id += 1;
        let next_due_ms = self.now() + period_ms;
        let task = Task {
            id,
            next_due_ms,
            period_ms,
            cancelled: Arc::new(AtomicBool::new(false)),
            callback: Box::new(callback),
        };
        let notify_head = state
            .tasks
            .front()
            .map(|t| next_due_ms < t.next_due_ms)
            .unwrap_or(true);
        state.tasks.push_sorted(task, |a, b| a.next_due_ms.cmp(&b.next_due_ms));
        state.count += 1;
        drop(state);
        if notify_head {
            self.wake.notify_one();
        }
        trace!("scheduler: added task {} (period {}ms)", id.0, period_ms);
        Ok(id)
    }

    /// Cancels `id`. A not-yet-run task is removed outright; a task whose
    /// callback is currently executing is marked cancelled so the
    /// scheduler drops it instead of re-inserting once the callback
    /// returns (spec §4.6).
    pub fn remove(&self, id: TaskId) -> Result<(), SchedulerError> {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.tasks.drop_first_filter(|t| t.id == id) {
            state.count -= 1;
            drop(task);
            return Ok(());
        }
        if let Some(flag) = state.running.get(&id.0) {
            flag.store(true, Ordering::SeqCst);
            return Ok(());
        }
        Err(SchedulerError::UnknownTask)
    }

    fn run_due(&self) -> usize {
        let now = self.now();
        let mut ran = 0;
        loop {
            let mut state = self.state.lock().unwrap();
            let due = matches!(state.tasks.front(), Some(t) if t.next_due_ms <= now);
            if !due {
                return ran;
            }
            let mut task = state.tasks.pop().expect("front() said a task was due");
            state.count -= 1;
            let cancel_flag = task.cancelled.clone();
            state.running.insert(task.id.0, cancel_flag.clone());
            drop(state);

            (task.callback)();
            ran += 1;

            let mut state = self.state.lock().unwrap();
            state.running.remove(&task.id.0);
            if cancel_flag.load(Ordering::SeqCst) {
                trace!("scheduler: task {} cancelled during execution", task.id.0);
                drop(state);
                continue;
            }
            if task.period_ms == 0 {
                // One-shot: never re-armed.
                drop(state);
                continue;
            }
            let now2 = self.now();
            let mut next = task.next_due_ms + task.period_ms;
            while next <= now2 {
                next += task.period_ms;
            }
            task.next_due_ms = next;
            if state.count >= self.max_tasks {
                warn!("scheduler: dropping task {} on reschedule, at capacity", task.id.0);
                drop(state);
                continue;
            }
            state.count += 1;
            state.tasks.push_sorted(task, |a, b| a.next_due_ms.cmp(&b.next_due_ms));
        }
    }

    /// Single-threaded entry point: runs every task currently due and
    /// returns immediately. The host loop calls this periodically (spec
    /// §5: "a `tick()` entry point is exposed" for single-threaded builds).
    pub fn tick(&self) -> usize {
        let ran = self.run_due();
        self.ticks.fetch_add(ran as u64, Ordering::Relaxed);
        ran
    }

    #[cfg(test)]
    fn ticks_run(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Spawns the background thread for the multi-threaded build: wakes
    /// when the head task is due or when [`Scheduler::add`]/[`stop`]
    /// shortens the wait, per spec §5 ("the scheduler blocks on a
    /// condition variable with a timeout of min(lease/4,
    /// next-scheduled-deadline)" — here just next-scheduled-deadline, the
    /// lease side of that `min` is the transport engine's own concern).
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        std::thread::Builder::new()
            .name("zenoh-pico-scheduler".into())
            .spawn(move || this.run_loop())
            .expect("failed to spawn scheduler thread")
    }

    fn run_loop(&self) {
        debug!("scheduler thread started");
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            self.run_due();
            let wait_ms = {
                let state = self.state.lock().unwrap();
                match state.tasks.front() {
                    Some(t) => t.next_due_ms.saturating_sub(self.now()).max(1),
                    None => 60_000,
                }
            };
            let state = self.state.lock().unwrap();
            let _ = self.wake.wait_timeout(state, Duration::from_millis(wait_ms)).unwrap();
        }
        debug!("scheduler thread stopped");
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.wake.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FakeClock(AtomicU64);
    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }
    impl FakeClock {
        fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    #[test]
    fn tick_runs_only_due_tasks_and_reschedules() {
        let clock = Arc::new(FakeClock(AtomicU64::new(0)));
        let sched = Scheduler::with_clock(DEFAULT_MAX_TASKS, clock.clone());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        sched.add(10, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(sched.tick(), 0);
        clock.advance(10);
        assert_eq!(sched.tick(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // immediately re-ticking before the next period elapses does nothing
        assert_eq!(sched.tick(), 0);
        clock.advance(10);
        assert_eq!(sched.tick(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missed_ticks_coalesce_without_backlog() {
        let clock = Arc::new(FakeClock(AtomicU64::new(0)));
        let sched = Scheduler::with_clock(DEFAULT_MAX_TASKS, clock.clone());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        sched.add(10, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        // Five periods elapse with no intermediate tick() call.
        clock.advance(55);
        assert_eq!(sched.tick(), 1, "coalesced catch-up fires the task exactly once");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_cancels_not_yet_run_task() {
        let sched = Scheduler::new(DEFAULT_MAX_TASKS);
        let id = sched.add(1000, || {}).unwrap();
        assert_eq!(sched.len(), 1);
        sched.remove(id).unwrap();
        assert_eq!(sched.len(), 0);
        assert_eq!(sched.remove(id), Err(SchedulerError::UnknownTask));
    }

    #[test]
    fn remove_during_execution_prevents_reschedule() {
        let clock = Arc::new(FakeClock(AtomicU64::new(0)));
        let sched = Scheduler::with_clock(DEFAULT_MAX_TASKS, clock.clone());
        let sched_for_cb = sched.clone();
        let id_holder: Arc<Mutex<Option<TaskId>>> = Arc::new(Mutex::new(None));
        let id_holder2 = id_holder.clone();
        let id = sched
            .add(10, move || {
                let id = *id_holder2.lock().unwrap();
                if let Some(id) = id {
                    sched_for_cb.remove(id).ok();
                }
            })
            .unwrap();
        *id_holder.lock().unwrap() = Some(id);

        clock.advance(10);
        sched.tick();
        assert_eq!(sched.len(), 0, "self-cancelling task must not be rearmed");
    }

    #[test]
    fn add_beyond_capacity_is_an_error() {
        let sched = Scheduler::new(1);
        sched.add(1000, || {}).unwrap();
        assert_eq!(sched.add(1000, || {}), Err(SchedulerError::Capacity(1)));
    }

    #[test]
    fn three_periods_fire_proportionally_over_200ms() {
        let clock = Arc::new(FakeClock(AtomicU64::new(0)));
        let sched = Scheduler::with_clock(DEFAULT_MAX_TASKS, clock.clone());
        let counts = [
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
        ];
        for (period, counter) in [10u64, 20, 50].into_iter().zip(counts.iter().cloned()) {
            sched.add(period, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        for _ in 0..200 {
            clock.advance(1);
            sched.tick();
        }
        assert_eq!(counts[0].load(Ordering::SeqCst), 20);
        assert_eq!(counts[1].load(Ordering::SeqCst), 10);
        assert_eq!(counts[2].load(Ordering::SeqCst), 4);
    }
}

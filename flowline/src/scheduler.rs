//! Virtual clock and timer queue.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crossbeam_utils::atomic::AtomicCell;

use crate::time::SimTime;
use crate::util::lock;
use crate::util::priority_queue::PriorityQueue;

thread_local! {
    /// Scheduler of the session currently being stepped on this thread.
    static CURRENT: RefCell<Option<Scheduler>> = const { RefCell::new(None) };
}

/// A handle to the virtual clock shared by all processes of a session.
///
/// The clock only moves forward, and only when the session is stepped: a
/// process suspended with [`timeout`](Scheduler::timeout) resumes once the
/// session reaches the requested deadline. Processes waking up at the same
/// simulated instant resume in the order their timeouts were requested.
#[derive(Clone)]
pub(crate) struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    time: AtomicCell<f64>,
    timers: Mutex<PriorityQueue<SimTime, Arc<TimerSlot>>>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                time: AtomicCell::new(0.0),
                timers: Mutex::new(PriorityQueue::new()),
            }),
        }
    }

    /// Returns the current simulation time.
    pub(crate) fn now(&self) -> f64 {
        self.inner.time.load()
    }

    /// Returns a future that completes once `delta` units of simulated time
    /// have elapsed.
    ///
    /// Negative or non-finite durations are treated as zero: the process is
    /// rescheduled at the current instant, after all processes already
    /// scheduled for that instant.
    pub(crate) fn timeout(&self, delta: f64) -> Timeout {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };

        Timeout {
            scheduler: self.clone(),
            deadline: SimTime::new(self.now() + delta),
            slot: None,
        }
    }

    /// Returns the deadline of the earliest pending timer.
    pub(crate) fn next_deadline(&self) -> Option<f64> {
        lock(&self.inner.timers).peek_key().map(SimTime::as_f64)
    }

    /// Returns the number of pending timers.
    pub(crate) fn pending_timers(&self) -> usize {
        lock(&self.inner.timers).len()
    }

    /// Moves the clock to `deadline` and fires, in scheduling order, every
    /// timer due at that instant.
    ///
    /// The deadline must be that of the earliest pending timer.
    pub(crate) fn fire_next(&self, deadline: f64) {
        let key = SimTime::new(deadline);
        self.set_time(key.as_f64());

        let mut fired = Vec::new();
        {
            let mut timers = lock(&self.inner.timers);
            while let Some(slot) = timers.pull_if_key(key) {
                fired.push(slot);
            }
        }
        tracing::trace!(time = deadline, count = fired.len(), "firing timers");

        // Wake outside the lock: the executor's run queue preserves the order.
        for slot in fired {
            slot.fire();
        }
    }

    /// Moves the clock forward; never moves it backward.
    pub(crate) fn set_time(&self, time: f64) {
        if time > self.now() {
            self.inner.time.store(time);
        }
    }

    /// Runs a closure with this scheduler registered as the current one, which
    /// is what simulation-time log timestamps read.
    pub(crate) fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = CURRENT.with(|current| current.borrow_mut().replace(self.clone()));
        let result = f();
        CURRENT.with(|current| *current.borrow_mut() = previous);

        result
    }

    /// Returns the simulation time of the session being stepped on this
    /// thread, if any.
    #[cfg_attr(not(feature = "tracing-subscriber"), allow(dead_code))]
    pub(crate) fn current_time() -> Option<f64> {
        CURRENT.with(|current| current.borrow().as_ref().map(Scheduler::now))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("time", &self.now())
            .finish_non_exhaustive()
    }
}

struct TimerSlot {
    fired: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl TimerSlot {
    fn fire(&self) {
        self.fired.store(true, Ordering::Release);
        if let Some(waker) = lock(&self.waker).take() {
            waker.wake();
        }
    }
}

/// Future returned by [`Scheduler::timeout`].
pub(crate) struct Timeout {
    scheduler: Scheduler,
    deadline: SimTime,
    slot: Option<Arc<TimerSlot>>,
}

impl Future for Timeout {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(slot) = &self.slot {
            if slot.fired.load(Ordering::Acquire) {
                return Poll::Ready(());
            }
            *lock(&slot.waker) = Some(cx.waker().clone());

            return Poll::Pending;
        }

        let slot = Arc::new(TimerSlot {
            fired: AtomicBool::new(false),
            waker: Mutex::new(Some(cx.waker().clone())),
        });
        lock(&self.scheduler.inner.timers).insert(self.deadline, slot.clone());
        self.slot = Some(slot);

        Poll::Pending
    }
}

//! Single-threaded `async` executor.
//!
//! Every node of a flow runs as a long-lived task on this executor. Tasks are
//! polled one at a time in FIFO wake-up order, so a task runs uninterrupted
//! between two suspension points.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::Context;

use futures_task::{waker_ref, ArcWake};
use slab::Slab;

use crate::util::lock;

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A single-threaded `async` executor.
pub(crate) struct Executor {
    /// Live tasks.
    tasks: Slab<Task>,
    /// State shared with wakers and spawners.
    shared: Arc<Shared>,
}

impl Executor {
    /// Creates an executor with no tasks.
    pub(crate) fn new() -> Self {
        Self {
            tasks: Slab::new(),
            shared: Arc::new(Shared {
                ready: Mutex::new(VecDeque::new()),
                spawned: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns a handle that can spawn tasks from within running tasks.
    pub(crate) fn spawner(&self) -> Spawner {
        Spawner {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Spawns a task which output will never be retrieved.
    ///
    /// Note that spawned tasks are not executed until [`run()`](Executor::run)
    /// is called.
    pub(crate) fn spawn_and_forget<T>(&self, future: T)
    where
        T: Future<Output = ()> + Send + 'static,
    {
        lock(&self.shared.spawned).push(Box::pin(future));
    }

    /// Returns the number of tasks that have not completed yet.
    pub(crate) fn task_count(&self) -> usize {
        self.tasks.len() + lock(&self.shared.spawned).len()
    }

    /// Polls woken and newly spawned tasks until all of them are blocked or
    /// completed.
    pub(crate) fn run(&mut self) {
        loop {
            self.admit_spawned();

            let key = match lock(&self.shared.ready).pop_front() {
                Some(key) => key,
                None => {
                    if lock(&self.shared.spawned).is_empty() {
                        return;
                    }
                    continue;
                }
            };

            // The task may have completed already, in which case this is a
            // stale wake-up.
            let Some(task) = self.tasks.get_mut(key) else {
                continue;
            };
            task.waker.scheduled.store(false, Ordering::Release);

            let completed = {
                let waker = waker_ref(&task.waker);
                let mut cx = Context::from_waker(&waker);
                task.future.as_mut().poll(&mut cx).is_ready()
            };
            if completed {
                self.tasks.remove(key);
            }
        }
    }

    /// Moves tasks spawned since the last call into the slab and schedules
    /// them in spawning order.
    fn admit_spawned(&mut self) {
        let spawned: Vec<_> = lock(&self.shared.spawned).drain(..).collect();
        let mut ready = lock(&self.shared.ready);
        for future in spawned {
            let entry = self.tasks.vacant_entry();
            let key = entry.key();
            entry.insert(Task {
                future,
                waker: Arc::new(TaskWaker {
                    key,
                    scheduled: AtomicBool::new(true),
                    shared: Arc::downgrade(&self.shared),
                }),
            });
            ready.push_back(key);
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // Dropping the futures releases whatever they hold (permits, claims)
        // and unwinds every pending wait.
        self.tasks.clear();
        lock(&self.shared.spawned).clear();
        lock(&self.shared.ready).clear();
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

/// A handle to spawn fire-and-forget tasks on an executor.
///
/// Tasks spawned after the executor was dropped are silently discarded.
#[derive(Clone)]
pub(crate) struct Spawner {
    shared: Weak<Shared>,
}

impl Spawner {
    /// Spawns a task which will be polled by the executor during the current
    /// or next call to `run()`.
    pub(crate) fn spawn<T>(&self, future: T)
    where
        T: Future<Output = ()> + Send + 'static,
    {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.spawned).push(Box::pin(future));
        }
    }
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner").finish_non_exhaustive()
    }
}

struct Shared {
    /// Keys of the tasks to be polled, in wake-up order.
    ready: Mutex<VecDeque<usize>>,
    /// Tasks spawned but not yet admitted.
    spawned: Mutex<Vec<BoxedTask>>,
}

struct Task {
    future: BoxedTask,
    waker: Arc<TaskWaker>,
}

struct TaskWaker {
    key: usize,
    /// Set while the key sits in the ready queue, to avoid duplicate polls.
    scheduled: AtomicBool,
    shared: Weak<Shared>,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if arc_self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(shared) = arc_self.shared.upgrade() {
            lock(&shared.ready).push_back(arc_self.key);
        }
    }
}

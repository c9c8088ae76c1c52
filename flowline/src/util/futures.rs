//! Futures and future-related functions.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future which polls a collection of futures and resolves as soon as at
/// least one of them is ready.
///
/// Unlike a conventional `select`, all futures are polled on each poll and the
/// output of *every* future that completed during that poll is returned,
/// tagged with its index. This matters when the futures have side effects upon
/// completion (e.g. popping an item from a buffer): the caller gets to decide
/// what to do with all of them.
///
/// Futures that did not complete are dropped together with the `SelectReady`.
pub(crate) struct SelectReady<'a, T> {
    inner: Vec<Pin<Box<dyn Future<Output = T> + Send + 'a>>>,
}

impl<'a, T> SelectReady<'a, T> {
    /// Creates a new, empty `SelectReady`.
    pub(crate) fn new() -> Self {
        Self { inner: Vec::new() }
    }

    /// Appends a future.
    pub(crate) fn push<F>(&mut self, future: F)
    where
        F: Future<Output = T> + Send + 'a,
    {
        self.inner.push(Box::pin(future));
    }
}

impl<'a, T> Future for SelectReady<'a, T> {
    type Output = Vec<(usize, T)>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut ready = Vec::new();
        for (idx, fut) in self.inner.iter_mut().enumerate() {
            if let Poll::Ready(output) = fut.as_mut().poll(cx) {
                ready.push((idx, output));
            }
        }

        if ready.is_empty() {
            Poll::Pending
        } else {
            // Prevent accidental re-polling of completed futures.
            self.inner.clear();

            Poll::Ready(ready)
        }
    }
}

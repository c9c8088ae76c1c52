//! Counting permit with a FIFO wait queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_event::Event;

use crate::error::ResourceError;
use crate::util::lock;

/// A resource that can be held by at most `capacity` processes at a time.
///
/// Waiters are served strictly in request order: a waiter never overtakes an
/// earlier one, even if a slot is free when it arrives.
pub(crate) struct Resource {
    capacity: usize,
    state: Mutex<ResourceState>,
    released: Event,
}

#[derive(Default)]
struct ResourceState {
    holders: usize,
    queue: VecDeque<u64>,
    next_ticket: u64,
    closed: bool,
}

impl Resource {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(ResourceState::default()),
            released: Event::new(),
        }
    }

    /// Number of current holders.
    pub(crate) fn count(&self) -> usize {
        lock(&self.state).holders
    }

    /// Number of pending requests.
    pub(crate) fn queue_len(&self) -> usize {
        lock(&self.state).queue.len()
    }

    /// Waits for a slot and returns a permit that releases it when dropped.
    pub(crate) async fn acquire(self: &Arc<Self>) -> Result<Permit, ResourceError> {
        let mut ticket = Ticket::new(self);
        let id = ticket.id;

        self.released
            .wait_until(|| {
                let mut state = lock(&self.state);
                if state.closed {
                    return Some(Err(ResourceError::Closed));
                }
                if state.queue.front() != Some(&id) || state.holders >= self.capacity {
                    return None;
                }
                state.queue.pop_front();
                state.holders += 1;

                Some(Ok(()))
            })
            .await?;
        ticket.served = true;

        // The next waiter may fit as well if capacity is above one.
        self.released.notify_all();

        Ok(Permit {
            resource: self.clone(),
        })
    }

    /// Makes all pending and future requests fail.
    pub(crate) fn close(&self) {
        lock(&self.state).closed = true;
        self.released.notify_all();
    }

    /// Forgets all holders and requests and reopens the resource.
    pub(crate) fn reset(&self) {
        *lock(&self.state) = ResourceState::default();
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("capacity", &self.capacity)
            .field("holders", &self.count())
            .finish_non_exhaustive()
    }
}

/// A place in the wait queue, removed if the request is abandoned.
struct Ticket<'a> {
    resource: &'a Resource,
    id: u64,
    served: bool,
}

impl<'a> Ticket<'a> {
    fn new(resource: &'a Resource) -> Self {
        let mut state = lock(&resource.state);
        let id = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back(id);

        Self {
            resource,
            id,
            served: false,
        }
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        if !self.served {
            lock(&self.resource.state).queue.retain(|&t| t != self.id);
            self.resource.released.notify_all();
        }
    }
}

/// A held slot of a [`Resource`].
pub(crate) struct Permit {
    resource: Arc<Resource>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        {
            let mut state = lock(&self.resource.state);
            state.holders = state.holders.saturating_sub(1);
        }
        self.resource.released.notify_all();
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}

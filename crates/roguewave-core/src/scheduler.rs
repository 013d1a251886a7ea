//! Resumable task scheduler.
//!
//! Timed sequences (build timers, announcement chains, offer windows,
//! repeating stat modifiers) are queued as plain task values with a
//! suspension point. Once per tick the engine takes every task whose point
//! has been reached and runs it to its next suspension, which may queue a
//! follow-up task. Nothing runs between ticks.

use serde::{Deserialize, Serialize};

pub type TaskId = u64;

/// When a suspended task may resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resume<C> {
    /// At or after this simulation time
    At(f32),
    /// The first tick on which the condition holds
    When(C),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Pending<T, C> {
    id: TaskId,
    task: T,
    resume: Resume<C>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduler<T, C> {
    pending: Vec<Pending<T, C>>,
    next_id: TaskId,
}

impl<T, C> Default for Scheduler<T, C> {
    fn default() -> Self {
        Self { pending: Vec::new(), next_id: 1 }
    }
}

impl<T, C> Scheduler<T, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, task: T, resume: Resume<C>) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push(Pending { id, task, resume });
        id
    }

    /// Resume `delay` seconds after `now`.
    pub fn after(&mut self, now: f32, delay: f32, task: T) -> TaskId {
        self.schedule(task, Resume::At(now + delay.max(0.0)))
    }

    pub fn cancel(&mut self, id: TaskId) -> Option<T> {
        let index = self.pending.iter().position(|p| p.id == id)?;
        Some(self.pending.remove(index).task)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &T> {
        self.pending.iter().map(|p| &p.task)
    }

    /// Remove and return every task ready at `now`, in scheduling order.
    pub fn take_ready(&mut self, now: f32, mut is_met: impl FnMut(&C) -> bool) -> Vec<T> {
        let mut ready = Vec::new();
        let mut waiting = Vec::with_capacity(self.pending.len());
        for pending in self.pending.drain(..) {
            let due = match &pending.resume {
                Resume::At(time) => *time <= now,
                Resume::When(condition) => is_met(condition),
            };
            if due {
                ready.push(pending.task);
            } else {
                waiting.push(pending);
            }
        }
        self.pending = waiting;
        ready
    }
}

//! One-shot scheduled tasks on an explicit clock
//!
//! Nothing in here reads the wall clock. The owner passes `now` (epoch
//! milliseconds in the running client, arbitrary numbers in tests) and pops
//! whatever has come due. Every scheduled task is addressed by a
//! [`TimerHandle`] so the component that armed it can cancel it, and can tell
//! a stale firing apart from the one it is still waiting for.

use std::collections::{BTreeMap, HashMap};

/// What a due timer asks the session to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Hide the game view after the local snake died
    DeathRevert,
    /// Refresh the effect countdown
    CountdownTick,
    /// Dial the server again
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    queue: BTreeMap<(u64, u64), Task>,
    deadlines: HashMap<u64, u64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, deadline: u64, task: Task) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        TimerHandle(id)
    }

    /// Returns false when the timer already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => self.queue.remove(&(deadline, handle.0)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    pub fn deadline(&self, handle: TimerHandle) -> Option<u64> {
        self.deadlines.get(&handle.0).copied()
    }

    /// Earliest task whose deadline is at or before `now`
    ///
    /// Tasks with equal deadlines come out in the order they were scheduled.
    pub fn pop_due(&mut self, now: u64) -> Option<(TimerHandle, Task)> {
        let (&(deadline, id), _) = self.queue.iter().next()?;
        if deadline > now {
            return None;
        }
        let task = self.queue.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some((TimerHandle(id), task))
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_due_before_deadline() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(100, Task::DeathRevert);
        assert!(scheduler.pop_due(99).is_none());
        assert_eq!(scheduler.next_deadline(), Some(100));
    }

    #[test]
    fn test_due_at_exact_deadline() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule_at(100, Task::DeathRevert);
        assert_eq!(scheduler.pop_due(100), Some((handle, Task::DeathRevert)));
        assert!(!scheduler.is_pending(handle));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_pop_order_follows_deadline_then_insertion() {
        let mut scheduler = Scheduler::new();
        let late = scheduler.schedule_at(300, Task::Reconnect);
        let first = scheduler.schedule_at(100, Task::CountdownTick);
        let second = scheduler.schedule_at(100, Task::DeathRevert);

        assert_eq!(scheduler.pop_due(1000), Some((first, Task::CountdownTick)));
        assert_eq!(scheduler.pop_due(1000), Some((second, Task::DeathRevert)));
        assert_eq!(scheduler.pop_due(1000), Some((late, Task::Reconnect)));
        assert_eq!(scheduler.pop_due(1000), None);
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule_at(50, Task::Reconnect);
        assert!(scheduler.is_pending(handle));
        assert_eq!(scheduler.deadline(handle), Some(50));

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(scheduler.pop_due(1000).is_none());
        assert_eq!(scheduler.len(), 0);
    }

    #[test]
    fn test_handles_are_unique() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.schedule_at(10, Task::CountdownTick);
        let b = scheduler.schedule_at(10, Task::CountdownTick);
        assert_ne!(a, b);
        scheduler.cancel(a);
        assert!(scheduler.is_pending(b));
    }
}

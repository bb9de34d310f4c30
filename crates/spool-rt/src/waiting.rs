// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tasks parked on socket readiness.
//!
//! Two maps, one per interest, from socket identity to the tasks blocked on
//! it. Buckets keep registration order and sockets keep first-registration
//! order, so a poll cycle releases waiters deterministically.

use indexmap::IndexMap;

use crate::net::SocketId;
use crate::task::{Placement, Task};

/// Which readiness a task is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
}

#[derive(Default)]
pub(crate) struct WaitingSet {
    readers: IndexMap<SocketId, Vec<Task>>,
    writers: IndexMap<SocketId, Vec<Task>>,
}

impl WaitingSet {
    fn bucket(&self, interest: Interest) -> &IndexMap<SocketId, Vec<Task>> {
        match interest {
            Interest::Readable => &self.readers,
            Interest::Writable => &self.writers,
        }
    }

    fn bucket_mut(&mut self, interest: Interest) -> &mut IndexMap<SocketId, Vec<Task>> {
        match interest {
            Interest::Readable => &mut self.readers,
            Interest::Writable => &mut self.writers,
        }
    }

    /// Park `task` on `id`. Callers have already checked it is schedulable.
    pub(crate) fn register(&mut self, interest: Interest, id: SocketId, task: Task) {
        task.set_placement(Placement::Blocked);
        log::trace!("{} waits for {:?} on {}", task.id(), interest, id);
        self.bucket_mut(interest).entry(id).or_default().push(task);
    }

    /// Remove the whole bucket for `id`, in registration order.
    pub(crate) fn release(&mut self, interest: Interest, id: SocketId) -> Vec<Task> {
        let tasks = self.bucket_mut(interest).shift_remove(&id).unwrap_or_default();
        for task in &tasks {
            task.set_placement(Placement::Detached);
        }
        tasks
    }

    /// Sockets with at least one waiter, in first-registration order.
    pub(crate) fn ids(&self, interest: Interest) -> Vec<SocketId> {
        self.bucket(interest).keys().copied().collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.readers.is_empty() && self.writers.is_empty()
    }

    /// Total number of parked tasks.
    pub(crate) fn len(&self) -> usize {
        self.readers.values().chain(self.writers.values()).map(Vec::len).sum()
    }

    /// Every parked task, readers first.
    pub(crate) fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.readers.values().chain(self.writers.values()).flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;
    use crate::value::Value;

    fn task(id: u64) -> Task {
        Task::new(TaskId(id), Box::pin(async { Ok(Value::Unit) }))
    }

    #[test]
    fn release_keeps_registration_order() {
        let mut set = WaitingSet::default();
        let sock = SocketId::from_raw(7);
        for id in 1..=3 {
            set.register(Interest::Readable, sock, task(id));
        }
        assert_eq!(set.len(), 3);

        let ids: Vec<_> = set
            .release(Interest::Readable, sock)
            .iter()
            .map(Task::id)
            .collect();
        assert_eq!(ids, vec![TaskId(1), TaskId(2), TaskId(3)]);
        assert!(set.is_empty());
    }

    #[test]
    fn interests_are_independent() {
        let mut set = WaitingSet::default();
        let sock = SocketId::from_raw(4);
        set.register(Interest::Readable, sock, task(1));
        set.register(Interest::Writable, sock, task(2));

        let released = set.release(Interest::Writable, sock);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].id(), TaskId(2));
        assert_eq!(set.ids(Interest::Readable), vec![sock]);
        assert!(set.ids(Interest::Writable).is_empty());
    }

    #[test]
    fn ids_follow_first_registration() {
        let mut set = WaitingSet::default();
        set.register(Interest::Readable, SocketId::from_raw(9), task(1));
        set.register(Interest::Readable, SocketId::from_raw(3), task(2));
        set.register(Interest::Readable, SocketId::from_raw(9), task(3));
        assert_eq!(
            set.ids(Interest::Readable),
            vec![SocketId::from_raw(9), SocketId::from_raw(3)]
        );
        assert!(set.ids(Interest::Writable).is_empty());
    }

    #[test]
    fn placement_tracks_the_bucket() {
        let mut set = WaitingSet::default();
        let t = task(1);
        set.register(Interest::Readable, SocketId::from_raw(5), t.clone());
        assert_eq!(t.placement(), Placement::Blocked);
        assert!(t.check_schedulable().is_err());

        set.release(Interest::Readable, SocketId::from_raw(5));
        assert_eq!(t.placement(), Placement::Detached);
    }

    #[test]
    fn releasing_an_unknown_socket_is_empty() {
        let mut set = WaitingSet::default();
        assert!(set.release(Interest::Readable, SocketId::from_raw(1)).is_empty());
    }
}

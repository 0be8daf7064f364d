//! crates/discussion_core/src/roster.rs
//!
//! Reconciles the two presence streams of a thread into one roster view.
//!
//! The gateway sends the full roster on `thread-users` and single arrivals on
//! `user-joined`. Neither stream is diffed, so callers that want a stable list
//! feed both into a `ThreadRoster`.

use crate::domain::{ThreadUser, ThreadUsers};

#[derive(Debug, Clone, Default)]
pub struct ThreadRoster {
    thread_id: Option<String>,
    users: Vec<ThreadUser>,
}

impl ThreadRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the roster with a wholesale snapshot.
    pub fn apply_snapshot(&mut self, snapshot: ThreadUsers) {
        self.thread_id = Some(snapshot.thread_id);
        self.users.clear();
        for user in snapshot.users {
            self.insert(user);
        }
    }

    /// Adds a single arrival. Returns `false` if the user was already listed.
    pub fn apply_joined(&mut self, user: ThreadUser) -> bool {
        self.insert(user)
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn users(&self) -> &[ThreadUser] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u.user_id == user_id)
    }

    pub fn clear(&mut self) {
        self.thread_id = None;
        self.users.clear();
    }

    fn insert(&mut self, user: ThreadUser) -> bool {
        // A later entry for the same id carries the freshest display name.
        if let Some(existing) = self.users.iter_mut().find(|u| u.user_id == user.user_id) {
            existing.user_name = user.user_name;
            return false;
        }
        self.users.push(user);
        true
    }
}

//! # studyhub-live
//!
//! Live View Layer and client cache:
//! - **views** — subscribe to a community, a user's joined communities, a roster, or a profile
//! - **inner** — reconciliation of per-item inner subscriptions under an outer one
//! - **cache** — [`MembershipCache`] (cached vs. direct membership checks) and [`JoinGuard`]
//!
//! Every live value is a [`Live`] handle: the latest [`LiveState`] plus the task that
//! keeps it current. Dropping the handle unsubscribes.

pub mod cache;
mod inner;
pub mod views;

pub use cache::{JoinGuard, JoinTicket, MembershipCache};
pub use views::{JoinedCommunities, LiveViews, Roster, RosterEntry, RosterSource};

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Latest value of a live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveState<T> {
    /// No snapshot has arrived yet.
    Loading,
    Ready(T),
    /// The store reported an error; the subscription has stopped.
    Failed(String),
}

impl<T> LiveState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// A continuously updated value. Dropping it (or calling [`Live::unsubscribe`])
/// stops the task behind it and every store subscription that task holds.
pub struct Live<T> {
    rx: watch::Receiver<LiveState<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone> Live<T> {
    pub(crate) fn new(rx: watch::Receiver<LiveState<T>>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    pub fn current(&self) -> LiveState<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published state. `false` once the publisher has stopped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the state satisfies `predicate`. `None` if the publisher stops first.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&LiveState<T>) -> bool) -> Option<LiveState<T>> {
        self.rx.wait_for(|state| predicate(state)).await.ok().map(|state| state.clone())
    }

    pub fn unsubscribe(self) {}
}

impl<T> Drop for Live<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

//! # TaskGroup – a node's background tasks
//!
//! Wraps a [`JoinSet`] and keeps the names of tasks that have not finished yet, so a
//! teardown that runs out of grace can say which ones were stuck.
//!
//! ## Internal scheme
//! ```text
//! spawn(name, fut):
//!   alive.insert(name) ─► JoinSet::spawn(async { let _guard = AliveGuard(name); fut.await })
//!                                                  └─ drop (finish, panic, abort) ⇒ alive.remove(name)
//!
//! join_within(grace):
//!   ├─ all joined in time  → Ok(())
//!   └─ grace exceeded      → abort the rest, Err(sorted alive names)
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;

type Alive = Arc<Mutex<BTreeMap<&'static str, usize>>>;

#[derive(Default)]
pub struct TaskGroup {
    set: JoinSet<()>,
    alive: Alive,
}

struct AliveGuard {
    name: &'static str,
    alive: Alive,
}

impl Drop for AliveGuard {
    fn drop(&mut self) {
        let mut alive = self.alive.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = alive.get_mut(self.name) {
            *count -= 1;
            if *count == 0 {
                alive.remove(self.name);
            }
        }
    }
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        *self
            .alive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_insert(0) += 1;
        let guard = AliveGuard {
            name,
            alive: Arc::clone(&self.alive),
        };
        self.set.spawn(async move {
            let _guard = guard;
            fut.await;
        });
    }

    /// Sorted names of tasks that have not finished.
    pub fn snapshot(&self) -> Vec<String> {
        self.alive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Joins every task, aborting whatever is still running after `grace`.
    pub async fn join_within(&mut self, grace: Duration) -> Result<(), Vec<String>> {
        let set = &mut self.set;
        let done = async { while set.join_next().await.is_some() {} };
        if tokio::time::timeout(grace, done).await.is_ok() {
            return Ok(());
        }
        let stuck = self.snapshot();
        self.set.abort_all();
        while self.set.join_next().await.is_some() {}
        Err(stuck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_cooperative_tasks_join_within_grace() {
        let token = CancellationToken::new();
        let mut group = TaskGroup::new();
        for _ in 0..3 {
            let t = token.clone();
            group.spawn("worker", async move { t.cancelled().await });
        }
        assert_eq!(group.snapshot(), vec!["worker"]);

        token.cancel();
        group.join_within(Duration::from_secs(2)).await.unwrap();
        assert!(group.snapshot().is_empty());
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_stuck_task_is_named_and_aborted() {
        let mut group = TaskGroup::new();
        group.spawn("quick", async {});
        group.spawn("stuck", std::future::pending());

        let stuck = group.join_within(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(stuck, vec!["stuck"]);
        assert!(group.is_empty());
        assert!(group.snapshot().is_empty());
    }
}

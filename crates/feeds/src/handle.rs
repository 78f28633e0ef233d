//! Ownership of running connector tasks.

use tokio::task::JoinHandle;
use tracing::info;

/// Background tasks of one connector.
///
/// Dropping the handle leaves the tasks running; call `disconnect`.
#[derive(Debug)]
pub struct FeedHandle {
    name: &'static str,
    tasks: Vec<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn new(name: &'static str, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { name, tasks }
    }

    /// Connector name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of tasks still owned.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Abort every task and wait for it to finish.
    pub async fn disconnect(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            // Cancellation errors are expected here
            let _ = task.await;
        }
        info!(feed = self.name, "Feed disconnected");
    }
}

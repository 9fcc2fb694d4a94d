//! Named, abortable dispatch tasks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::task::AbortHandle;

/// Identifies one spawned task within a [`TaskSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "task-{}", self.0)
	}
}

struct TaskEntry {
	name: String,
	abort: AbortHandle,
}

type TaskMap = Arc<Mutex<IndexMap<TaskId, TaskEntry>>>;

/// Tasks still running on behalf of a session.
///
/// A task removes itself when it finishes; [`abort_all`](Self::abort_all)
/// cancels whatever is left.
#[derive(Default)]
pub struct TaskSet {
	next_id: AtomicU64,
	tasks: TaskMap,
}

impl TaskSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Spawns `future` on the current runtime under `name`.
	pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> TaskId
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
		let tasks = Arc::clone(&self.tasks);

		// Held across the spawn so the task cannot remove its entry before it exists.
		let mut guard = self.tasks.lock();
		let handle = tokio::spawn(async move {
			future.await;
			tasks.lock().shift_remove(&id);
		});
		guard.insert(
			id,
			TaskEntry {
				name: name.into(),
				abort: handle.abort_handle(),
			},
		);
		id
	}

	/// Aborts every running task, returning how many were aborted.
	pub fn abort_all(&self) -> usize {
		let drained: Vec<(TaskId, TaskEntry)> = self.tasks.lock().drain(..).collect();
		for (id, entry) in &drained {
			tracing::debug!(task = %id, name = %entry.name, "Aborting task");
			entry.abort.abort();
		}
		drained.len()
	}

	pub fn len(&self) -> usize {
		self.tasks.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Names of running tasks, oldest first.
	pub fn names(&self) -> Vec<String> {
		self.tasks
			.lock()
			.values()
			.map(|entry| entry.name.clone())
			.collect()
	}
}

impl fmt::Debug for TaskSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskSet").field("running", &self.names()).finish()
	}
}

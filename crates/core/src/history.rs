//! Host navigation history and its reconciliation with visibility.
//!
//! The host owns a [`HistoryStack`]. The embedded document pushes entries onto
//! it through [`HistorySync::push_state`]; whenever the stack pops (host back
//! button, or the document asking via `popHistory`) it emits a [`PopEvent`],
//! and [`HistorySync`] turns that event into a show or hide of the surface:
//!
//! - the last embedded entry is gone → hide
//! - the entry that became current is embedded state and the surface is
//!   hidden → show
//!
//! Events are handled one by one in emission order; nothing is coalesced.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use viewer_protocol::HistoryEntry;

use crate::handlers::{HandlerFn, HandlerMap, Subscription, emit, handler_map, register};
use crate::visibility::VisibilityCapability;

/// Emitted by a [`HistoryStack`] after each back or forward transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopEvent {
	/// The transition removed the last embedded-state entry.
	pub is_last_back: bool,
	/// The entry that is now current was pushed for the embedded document.
	pub is_amp: bool,
}

/// Host navigation stack.
pub trait HistoryStack: Send + Sync {
	fn push(&self, entry: HistoryEntry);

	/// Navigates back one entry and notifies pop listeners.
	fn back(&self);

	/// Registers a listener for back/forward transitions.
	fn on_pop(&self, handler: HandlerFn<PopEvent>) -> Subscription;
}

#[derive(Default)]
struct StackState {
	entries: Vec<HistoryEntry>,
	forward: Vec<HistoryEntry>,
}

/// In-memory [`HistoryStack`] with back and forward navigation.
///
/// Pushing clears the forward list, as browsers do.
pub struct NavigationStack {
	state: Mutex<StackState>,
	listeners: HandlerMap<PopEvent>,
}

impl Default for NavigationStack {
	fn default() -> Self {
		Self::new()
	}
}

impl NavigationStack {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(StackState::default()),
			listeners: handler_map(),
		}
	}

	/// Navigates forward to the most recently popped entry, if any.
	pub fn forward(&self) {
		let event = {
			let mut state = self.state.lock();
			let Some(entry) = state.forward.pop() else {
				tracing::debug!("Forward navigation with nothing to restore");
				return;
			};
			let is_amp = entry.is_embedded_state;
			state.entries.push(entry);
			PopEvent {
				is_last_back: false,
				is_amp,
			}
		};
		emit(&self.listeners, &event);
	}

	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn current(&self) -> Option<HistoryEntry> {
		self.state.lock().entries.last().cloned()
	}

	/// Snapshot of the stack, bottom first.
	pub fn entries(&self) -> Vec<HistoryEntry> {
		self.state.lock().entries.clone()
	}
}

impl HistoryStack for NavigationStack {
	fn push(&self, entry: HistoryEntry) {
		let mut state = self.state.lock();
		state.forward.clear();
		state.entries.push(entry);
	}

	fn back(&self) {
		let event = {
			let mut state = self.state.lock();
			let Some(popped) = state.entries.pop() else {
				tracing::debug!("Back navigation on an empty stack");
				return;
			};
			let remaining_embedded = state.entries.iter().any(|e| e.is_embedded_state);
			let event = PopEvent {
				is_last_back: popped.is_embedded_state && !remaining_embedded,
				is_amp: state.entries.last().is_some_and(|e| e.is_embedded_state),
			};
			state.forward.push(popped);
			event
		};
		emit(&self.listeners, &event);
	}

	fn on_pop(&self, handler: HandlerFn<PopEvent>) -> Subscription {
		register(&self.listeners, handler)
	}
}

/// Reconciles history transitions with the surface's visibility.
pub struct HistorySync {
	stack: Arc<dyn HistoryStack>,
	visibility: Arc<dyn VisibilityCapability>,
	document_label: String,
	subscription: Mutex<Option<Subscription>>,
}

impl HistorySync {
	/// `document_label` labels entries pushed without a URL.
	pub fn new(
		stack: Arc<dyn HistoryStack>,
		visibility: Arc<dyn VisibilityCapability>,
		document_label: impl Into<String>,
	) -> Self {
		Self {
			stack,
			visibility,
			document_label: document_label.into(),
			subscription: Mutex::new(None),
		}
	}

	/// Starts reacting to pop events. Calling it again is a no-op.
	pub fn listen(&self) {
		let mut subscription = self.subscription.lock();
		if subscription.is_some() {
			return;
		}
		let visibility = Arc::clone(&self.visibility);
		*subscription = Some(self.stack.on_pop(Arc::new(move |event: &PopEvent| {
			reconcile(visibility.as_ref(), *event);
		})));
	}

	/// Stops reacting to pop events.
	pub fn unlisten(&self) {
		self.subscription.lock().take();
	}

	pub fn is_listening(&self) -> bool {
		self.subscription.lock().is_some()
	}

	pub fn document_label(&self) -> &str {
		&self.document_label
	}

	/// Pushes an embedded-state entry onto the host stack.
	pub fn push_state(&self, label: impl Into<String>, data: Value) {
		let entry = HistoryEntry::embedded(label, data);
		tracing::debug!(label = %entry.label, "Pushing history entry");
		self.stack.push(entry);
	}

	/// Pushes the entry representing the document itself.
	pub fn push_root(&self) {
		self.push_state(self.document_label.clone(), Value::Null);
	}

	/// Navigates the host back one entry.
	pub fn pop(&self) {
		self.stack.back();
	}

	/// Applies one pop event to the surface's visibility.
	pub fn on_pop(&self, event: PopEvent) {
		reconcile(self.visibility.as_ref(), event);
	}
}

fn reconcile(visibility: &dyn VisibilityCapability, event: PopEvent) {
	if event.is_last_back {
		tracing::debug!("Last embedded entry popped, hiding");
		visibility.hide();
	} else if event.is_amp && visibility.is_hidden() {
		tracing::debug!("Returned to embedded entry, showing");
		visibility.show();
	}
}

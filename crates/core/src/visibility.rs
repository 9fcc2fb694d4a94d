//! Show/hide capability of the embedded surface.

use std::sync::atomic::{AtomicBool, Ordering};

use viewer_protocol::Visibility;

/// Shows and hides the embedded surface.
///
/// Injected into a session at construction. Hosts implement it over their
/// real surface; [`VisibilityState`] is the in-memory variant.
///
/// Calls made while dispatching a message may query the session. Attach and
/// unattach apply visibility under the session's state lock, so calling back
/// into the session from those transitions deadlocks.
pub trait VisibilityCapability: Send + Sync {
	fn show(&self);
	fn hide(&self);
	fn is_hidden(&self) -> bool;

	fn visibility(&self) -> Visibility {
		if self.is_hidden() {
			Visibility::Hidden
		} else {
			Visibility::Shown
		}
	}
}

/// A visibility flag with no surface behind it.
#[derive(Debug)]
pub struct VisibilityState {
	hidden: AtomicBool,
}

impl VisibilityState {
	pub fn new(initial: Visibility) -> Self {
		Self {
			hidden: AtomicBool::new(initial == Visibility::Hidden),
		}
	}
}

impl Default for VisibilityState {
	fn default() -> Self {
		Self::new(Visibility::Shown)
	}
}

impl VisibilityCapability for VisibilityState {
	fn show(&self) {
		self.hidden.store(false, Ordering::SeqCst);
	}

	fn hide(&self) {
		self.hidden.store(true, Ordering::SeqCst);
	}

	fn is_hidden(&self) -> bool {
		self.hidden.load(Ordering::SeqCst)
	}
}

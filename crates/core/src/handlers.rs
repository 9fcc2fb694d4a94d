//! Generic listener infrastructure.
//!
//! Listeners are stored as [`HandlerEntry<E>`] in an [`IndexMap`] for O(1)
//! removal and stable insertion order, so events reach listeners in the order
//! they registered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Unique identifier for listeners.
pub type HandlerId = u64;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a new globally-unique handler ID.
pub fn next_handler_id() -> HandlerId {
	NEXT_HANDLER_ID.fetch_add(1, Ordering::SeqCst)
}

/// Listener function: `&E` → `()`.
pub type HandlerFn<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Registered listener.
pub struct HandlerEntry<E> {
	pub id: HandlerId,
	pub handler: HandlerFn<E>,
}

impl<E> Clone for HandlerEntry<E> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			handler: Arc::clone(&self.handler),
		}
	}
}

/// Listener storage: [`IndexMap`] for O(1) removal with stable insertion order.
pub type HandlerMap<E> = Arc<Mutex<IndexMap<HandlerId, HandlerEntry<E>>>>;

/// Creates an empty listener map.
pub fn handler_map<E>() -> HandlerMap<E> {
	Arc::new(Mutex::new(IndexMap::new()))
}

/// Registers `handler` in `handlers`, returning the subscription that removes it.
pub fn register<E>(handlers: &HandlerMap<E>, handler: HandlerFn<E>) -> Subscription
where
	E: Send + Sync + 'static,
{
	let id = next_handler_id();
	handlers.lock().insert(id, HandlerEntry { id, handler });
	Subscription::from_handler_map(id, handlers)
}

/// Calls every listener with `event`, in registration order.
///
/// Listeners are snapshotted first and called without the lock held, so a
/// listener may register or drop subscriptions.
pub fn emit<E>(handlers: &HandlerMap<E>, event: &E) {
	let snapshot: Vec<HandlerFn<E>> = handlers
		.lock()
		.values()
		.map(|entry| Arc::clone(&entry.handler))
		.collect();
	for handler in snapshot {
		handler(event);
	}
}

/// RAII handle that unregisters a listener on drop.
///
/// Holds a weak reference to the handler map, so dropping after the owner of
/// the map is gone is safe (becomes a no-op).
pub struct Subscription {
	id: HandlerId,
	dropper: Option<Arc<dyn Fn(HandlerId) + Send + Sync>>,
}

impl Subscription {
	/// Creates a subscription with a custom dropper function.
	pub fn new(id: HandlerId, dropper: Arc<dyn Fn(HandlerId) + Send + Sync>) -> Self {
		Self {
			id,
			dropper: Some(dropper),
		}
	}

	/// Creates a subscription from a handler map using a weak reference.
	pub fn from_handler_map<E>(id: HandlerId, handlers: &HandlerMap<E>) -> Self
	where
		E: Send + Sync + 'static,
	{
		let weak: Weak<Mutex<IndexMap<HandlerId, HandlerEntry<E>>>> = Arc::downgrade(handlers);
		let dropper = Arc::new(move |id: HandlerId| {
			if let Some(map) = weak.upgrade() {
				map.lock().shift_remove(&id);
			}
		});
		Self::new(id, dropper)
	}

	/// Returns this subscription's handler ID.
	pub fn id(&self) -> HandlerId {
		self.id
	}

	/// Explicitly unsubscribes. Equivalent to dropping.
	pub fn unsubscribe(mut self) {
		if let Some(dropper) = self.dropper.take() {
			(dropper)(self.id);
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(dropper) = self.dropper.take() {
			(dropper)(self.id);
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("active", &self.dropper.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicBool, AtomicUsize};

	use super::*;

	#[test]
	fn test_handler_id_increments() {
		let id1 = next_handler_id();
		let id2 = next_handler_id();
		assert!(id2 > id1);
	}

	#[test]
	fn test_emit_reaches_listeners_in_registration_order() {
		let map: HandlerMap<u32> = handler_map();
		let order = Arc::new(Mutex::new(Vec::new()));

		let first = Arc::clone(&order);
		let _a = register(&map, Arc::new(move |e: &u32| first.lock().push(("a", *e))));
		let second = Arc::clone(&order);
		let _b = register(&map, Arc::new(move |e: &u32| second.lock().push(("b", *e))));

		emit(&map, &7);
		assert_eq!(*order.lock(), vec![("a", 7), ("b", 7)]);
	}

	#[test]
	fn test_subscription_drop_removes_listener() {
		let map: HandlerMap<u32> = handler_map();
		let calls = Arc::new(AtomicUsize::new(0));
		let calls_clone = Arc::clone(&calls);

		{
			let _sub = register(
				&map,
				Arc::new(move |_: &u32| {
					calls_clone.fetch_add(1, Ordering::SeqCst);
				}),
			);
			emit(&map, &1);
		}
		// Subscription dropped here
		emit(&map, &2);

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(map.lock().is_empty());
	}

	#[test]
	fn test_subscription_unsubscribe() {
		let called = Arc::new(AtomicBool::new(false));
		let called_clone = Arc::clone(&called);

		let dropper = Arc::new(move |_id: HandlerId| {
			called_clone.store(true, Ordering::SeqCst);
		});

		let sub = Subscription::new(1, dropper);
		assert!(!called.load(Ordering::SeqCst));

		sub.unsubscribe();
		assert!(called.load(Ordering::SeqCst));
	}

	#[test]
	fn test_subscription_weak_reference() {
		let map: HandlerMap<String> = handler_map();
		let sub = register(&map, Arc::new(|_: &String| {}));

		// Drop the map before the subscription
		drop(map);

		// Dropping subscription should not panic (weak ref is dead)
		drop(sub);
	}
}

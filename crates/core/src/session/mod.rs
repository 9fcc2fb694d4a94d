//! Viewer session: the attach/detach lifecycle of one embedded document.
//!
//! A [`ViewerSession`] owns the dispatcher, relay and history sync for a single
//! document and wires them to the collaborators injected through
//! [`SessionBuilder`]:
//!
//! ```text
//! Detached ──attach──▶ Attaching ──mounted──▶ Attached
//!    ▲                     │                     │
//!    └──── failure ────────┘                     │
//!    └──────────────── unattach ─────────────────┘
//! ```
//!
//! While attached, inbound messages are dispatched in arrival order and their
//! replies run as tasks in the session's [`TaskSet`]. Detaching aborts those
//! tasks; their pending replies reject with
//! [`Error::DetachedChannelUse`](viewer_runtime::Error::DetachedChannelUse).

mod tasks;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use url::Url;
use viewer_protocol::{Message, Visibility, VisibilityChange, names};
use viewer_runtime::{Error, InboundHandler, OutboundChannel, ReplySlot, Result, post_typed};

pub use self::tasks::{TaskId, TaskSet};
use crate::config::ViewerConfig;
use crate::dispatcher::MessageDispatcher;
use crate::history::{HistoryStack, HistorySync, NavigationStack};
use crate::relay::{SourceOrigin, XhrRelay};
use crate::surface::{AddressResolver, DirectAddress, HeadlessSurface, Surface};
use crate::visibility::{VisibilityCapability, VisibilityState};

/// Lifecycle state of a [`ViewerSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Detached,
	Attaching,
	Attached,
}

/// Visibility capability that tells the embedded document about each change.
///
/// Wraps the injected capability; while a channel is bound, every show or hide
/// that changes the state is posted as `visibilitychange`.
pub struct SessionVisibility {
	inner: Arc<dyn VisibilityCapability>,
	channel: RwLock<Option<Arc<dyn OutboundChannel>>>,
}

impl SessionVisibility {
	pub fn new(inner: Arc<dyn VisibilityCapability>) -> Self {
		Self {
			inner,
			channel: RwLock::new(None),
		}
	}

	fn bind(&self, channel: Arc<dyn OutboundChannel>) {
		*self.channel.write() = Some(channel);
	}

	fn unbind(&self) {
		self.channel.write().take();
	}

	/// Sets the state without notifying the document.
	fn reset(&self, visibility: Visibility) {
		match visibility {
			Visibility::Shown => self.inner.show(),
			Visibility::Hidden => self.inner.hide(),
		}
	}

	fn transition(&self, target: Visibility) {
		let changed = self.inner.visibility() != target;
		self.reset(target);
		if !changed {
			return;
		}
		let channel = self.channel.read().clone();
		if let Some(channel) = channel {
			if let Err(e) = post_typed(
				channel.as_ref(),
				names::VISIBILITY_CHANGE,
				&VisibilityChange { state: target },
			) {
				tracing::warn!(error = %e, "Failed to post visibility change");
			}
		}
	}
}

impl VisibilityCapability for SessionVisibility {
	fn show(&self) {
		self.transition(Visibility::Shown);
	}

	fn hide(&self) {
		self.transition(Visibility::Hidden);
	}

	fn is_hidden(&self) -> bool {
		self.inner.is_hidden()
	}
}

/// Host-side session for one embedded document.
pub struct ViewerSession {
	config: ViewerConfig,
	state: Mutex<SessionState>,
	/// Bumped by every detach so an attach in flight can tell it was overtaken.
	generation: AtomicU64,
	surface: Arc<dyn Surface>,
	resolver: Arc<dyn AddressResolver>,
	visibility: Arc<SessionVisibility>,
	history: Arc<HistorySync>,
	relay: Arc<XhrRelay>,
	dispatcher: MessageDispatcher,
	tasks: TaskSet,
	embed_url: Mutex<Option<Url>>,
}

impl ViewerSession {
	pub fn builder(config: ViewerConfig) -> SessionBuilder {
		SessionBuilder::new(config)
	}

	/// Mounts the embedded document and starts accepting its messages.
	///
	/// Returns the embed URL: the resolved address with the init parameters in
	/// its fragment. Fails with [`Error::AlreadyAttached`] unless detached.
	pub async fn attach(&self, channel: Arc<dyn OutboundChannel>) -> Result<Url> {
		let generation = {
			let mut state = self.state.lock();
			if *state != SessionState::Detached {
				return Err(Error::AlreadyAttached);
			}
			*state = SessionState::Attaching;
			self.generation.load(Ordering::SeqCst)
		};
		tracing::debug!(document = %self.config.document_url, "Attaching viewer session");

		match self.mount(channel, generation).await {
			Ok(url) => {
				tracing::info!(url = %url, "Viewer session attached");
				Ok(url)
			}
			Err(e) => {
				let mut state = self.state.lock();
				if *state == SessionState::Attaching
					&& self.generation.load(Ordering::SeqCst) == generation
				{
					*state = SessionState::Detached;
				}
				tracing::warn!(error = %e, "Attach failed");
				Err(e)
			}
		}
	}

	async fn mount(&self, channel: Arc<dyn OutboundChannel>, generation: u64) -> Result<Url> {
		let address = self.resolver.resolve(&self.config.document_url).await?;
		let embed_url = self.config.embed_url(&address);

		let mut state = self.state.lock();
		if *state != SessionState::Attaching || self.generation.load(Ordering::SeqCst) != generation {
			return Err(Error::DetachedChannelUse);
		}
		self.surface.mount(&embed_url)?;

		self.relay.source().set(address);
		self.visibility.reset(self.config.initial_visibility());
		self.visibility.bind(channel);
		self.history.listen();
		self.history.push_root();
		*self.embed_url.lock() = Some(embed_url.clone());
		*state = SessionState::Attached;
		Ok(embed_url)
	}

	/// Tears the session down. Calling it while detached does nothing.
	pub fn unattach(&self) {
		let mut state = self.state.lock();
		if *state == SessionState::Detached {
			return;
		}
		self.generation.fetch_add(1, Ordering::SeqCst);

		self.visibility.hide();
		let aborted = self.tasks.abort_all();
		self.history.unlisten();
		self.visibility.unbind();
		self.relay.source().clear();
		self.surface.unmount();
		self.embed_url.lock().take();
		*state = SessionState::Detached;
		tracing::info!(aborted, "Viewer session detached");
	}

	/// Dispatches one inbound message.
	///
	/// Side effects happen before this returns; the reply, if any, completes on
	/// a task tracked by the session. Rejects with
	/// [`Error::DetachedChannelUse`] unless attached.
	///
	/// The state lock is not held while handlers run, so host collaborators may
	/// call back into the session. A detach that lands in between drops the
	/// outcome instead of spawning it, rejecting the reply.
	pub fn dispatch(&self, message: Message, reply: Option<ReplySlot>) {
		let generation = {
			let state = self.state.lock();
			if *state != SessionState::Attached {
				tracing::debug!(name = %message.name, state = ?*state, "Message for detached session");
				if let Some(reply) = reply {
					reply.reject(Error::DetachedChannelUse);
				}
				return;
			}
			self.generation.load(Ordering::SeqCst)
		};

		let name = message.name.clone();
		let outcome = self.dispatcher.dispatch_with_reply(message, reply);

		let state = self.state.lock();
		if *state != SessionState::Attached || self.generation.load(Ordering::SeqCst) != generation {
			tracing::debug!(name = %name, "Session detached during dispatch");
			return;
		}
		let id = self.tasks.spawn(name.clone(), outcome);
		tracing::trace!(task = %id, name = %name, "Spawned dispatch task");
	}

	pub fn state(&self) -> SessionState {
		*self.state.lock()
	}

	pub fn is_attached(&self) -> bool {
		self.state() == SessionState::Attached
	}

	pub fn embed_url(&self) -> Option<Url> {
		self.embed_url.lock().clone()
	}

	pub fn config(&self) -> &ViewerConfig {
		&self.config
	}

	pub fn visibility(&self) -> &Arc<SessionVisibility> {
		&self.visibility
	}

	pub fn history(&self) -> &Arc<HistorySync> {
		&self.history
	}

	pub fn relay(&self) -> &Arc<XhrRelay> {
		&self.relay
	}

	pub fn dispatcher(&self) -> &MessageDispatcher {
		&self.dispatcher
	}

	/// Number of dispatch tasks still running.
	pub fn tasks_in_flight(&self) -> usize {
		self.tasks.len()
	}
}

impl InboundHandler for ViewerSession {
	fn dispatch(&self, message: Message, reply: Option<ReplySlot>) {
		ViewerSession::dispatch(self, message, reply);
	}
}

impl std::fmt::Debug for ViewerSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ViewerSession")
			.field("document_url", &self.config.document_url.as_str())
			.field("state", &self.state())
			.field("embed_url", &self.embed_url())
			.field("tasks", &self.tasks)
			.finish()
	}
}

/// Assembles a [`ViewerSession`] from its collaborators.
///
/// Unset collaborators default to a [`HeadlessSurface`], [`DirectAddress`],
/// a fresh [`NavigationStack`], a [`VisibilityState`] in the configured initial
/// state, and an HTTP client built from the relay config.
pub struct SessionBuilder {
	config: ViewerConfig,
	surface: Option<Arc<dyn Surface>>,
	resolver: Option<Arc<dyn AddressResolver>>,
	history: Option<Arc<dyn HistoryStack>>,
	visibility: Option<Arc<dyn VisibilityCapability>>,
	client: Option<reqwest::Client>,
}

impl SessionBuilder {
	pub fn new(config: ViewerConfig) -> Self {
		Self {
			config,
			surface: None,
			resolver: None,
			history: None,
			visibility: None,
			client: None,
		}
	}

	pub fn surface(mut self, surface: Arc<dyn Surface>) -> Self {
		self.surface = Some(surface);
		self
	}

	pub fn resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
		self.resolver = Some(resolver);
		self
	}

	pub fn history(mut self, history: Arc<dyn HistoryStack>) -> Self {
		self.history = Some(history);
		self
	}

	pub fn visibility(mut self, visibility: Arc<dyn VisibilityCapability>) -> Self {
		self.visibility = Some(visibility);
		self
	}

	/// Uses `client` for relaying instead of one built from the relay config.
	pub fn client(mut self, client: reqwest::Client) -> Self {
		self.client = Some(client);
		self
	}

	pub fn build(self) -> Result<ViewerSession> {
		let config = self.config;
		let inner_visibility = self
			.visibility
			.unwrap_or_else(|| Arc::new(VisibilityState::new(config.initial_visibility())));
		let visibility = Arc::new(SessionVisibility::new(inner_visibility));

		let stack = self
			.history
			.unwrap_or_else(|| Arc::new(NavigationStack::new()));
		let history = Arc::new(HistorySync::new(
			stack,
			visibility.clone(),
			config.document_url.as_str(),
		));

		let source = SourceOrigin::new();
		let relay = Arc::new(match self.client {
			Some(client) => XhrRelay::new(client, source),
			None => XhrRelay::from_config(&config.relay, source)?,
		});

		let dispatcher = MessageDispatcher::standard(Arc::clone(&history), Arc::clone(&relay));

		Ok(ViewerSession {
			state: Mutex::new(SessionState::Detached),
			generation: AtomicU64::new(0),
			surface: self.surface.unwrap_or_else(|| Arc::new(HeadlessSurface::new())),
			resolver: self.resolver.unwrap_or_else(|| Arc::new(DirectAddress)),
			visibility,
			history,
			relay,
			dispatcher,
			tasks: TaskSet::new(),
			embed_url: Mutex::new(None),
			config,
		})
	}
}

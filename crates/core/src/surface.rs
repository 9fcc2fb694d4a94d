//! Collaborators that place the embedded document on screen.
//!
//! [`AddressResolver`] turns the configured document URL into the address the
//! surface loads (a cache origin, a proxy, or the URL itself), and [`Surface`]
//! mounts that address. Both are injected into the session; the defaults here
//! have no display behind them.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use url::Url;
use viewer_runtime::Result;

/// Future returned by [`AddressResolver::resolve`].
pub type ResolveFuture<'a> = BoxFuture<'a, Result<Url>>;

/// Resolves the address the embedded document is loaded from.
pub trait AddressResolver: Send + Sync {
	fn resolve<'a>(&'a self, document: &'a Url) -> ResolveFuture<'a>;
}

/// Loads the document from its own URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectAddress;

impl AddressResolver for DirectAddress {
	fn resolve<'a>(&'a self, document: &'a Url) -> ResolveFuture<'a> {
		async move { Ok(document.clone()) }.boxed()
	}
}

/// The embedded document's display surface.
pub trait Surface: Send + Sync {
	/// Loads `embed_url` into the surface.
	fn mount(&self, embed_url: &Url) -> Result<()>;

	/// Removes the surface. Must be idempotent.
	fn unmount(&self);
}

/// Surface that only records what it was asked to show.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
	mounted: Mutex<Option<Url>>,
}

impl HeadlessSurface {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn mounted(&self) -> Option<Url> {
		self.mounted.lock().clone()
	}
}

impl Surface for HeadlessSurface {
	fn mount(&self, embed_url: &Url) -> Result<()> {
		tracing::info!(url = %embed_url, "Mounting embedded surface");
		*self.mounted.lock() = Some(embed_url.clone());
		Ok(())
	}

	fn unmount(&self) {
		if let Some(url) = self.mounted.lock().take() {
			tracing::info!(url = %url, "Unmounted embedded surface");
		}
	}
}

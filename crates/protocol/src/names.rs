//! Message names understood by the host.
//!
//! Names are matched verbatim; the embedded document uses camelCase.

pub const PUSH_HISTORY: &str = "pushHistory";
pub const POP_HISTORY: &str = "popHistory";
pub const XHR: &str = "xhr";

pub const CANCEL_FULL_OVERLAY: &str = "cancelFullOverlay";
pub const DOCUMENT_LOADED: &str = "documentLoaded";
pub const DOCUMENT_HEIGHT: &str = "documentHeight";
pub const PRERENDER_COMPLETE: &str = "prerenderComplete";
pub const REQUEST_FULL_OVERLAY: &str = "requestFullOverlay";
pub const SCROLL: &str = "scroll";

/// Sent by the host when the embedded surface is shown or hidden.
pub const VISIBILITY_CHANGE: &str = "visibilitychange";

/// Names acknowledged with no further action.
pub const PLACEHOLDERS: [&str; 6] = [
	CANCEL_FULL_OVERLAY,
	DOCUMENT_LOADED,
	DOCUMENT_HEIGHT,
	PRERENDER_COMPLETE,
	REQUEST_FULL_OVERLAY,
	SCROLL,
];

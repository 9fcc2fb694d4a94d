//! Wire types for the embedded viewer messaging protocol.
//!
//! This crate contains the serde-serializable types exchanged between a host
//! and the sandboxed document it embeds. These types represent the "protocol
//! layer" - the shapes of data as they appear on the channel.
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization and small accessors
//! - **Stable**: Changes only when the wire protocol changes
//!
//! Dispatch, relaying and session lifecycle are built on top of these types in
//! `viewer-rs`.

pub mod envelope;
pub mod history;
pub mod init;
pub mod names;
pub mod xhr;

pub use envelope::*;
pub use history::*;
pub use init::*;
pub use xhr::*;

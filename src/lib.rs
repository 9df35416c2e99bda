//! This library describes, configures, and asynchronously establishes
//! sockets on top of an external readiness-notification engine.
//!
//! A caller states what kind of socket is wanted (a stream connection, a
//! stream listener, a bound datagram socket, or a datagram socket fixed to
//! one peer), applies layered configuration through a narrowing option
//! hierarchy, and receives an established socket handle. The suspending
//! operations (`connect`, `accept`) never occupy an operating-system thread
//! while waiting: they register interest with a
//! [selector][crate::selector::Selector] and suspend the calling task until the
//! selector reports readiness.
//!
//!
//! # Usage
//!
//! The entry point is [`open_socket`], which takes the selector to establish
//! through and returns a builder:
//!
//! ```no_run
//! use asocket::{open_socket, selector::TokioSelector, Configurable};
//! use std::sync::Arc;
//!
//! # async fn example_fn() -> anyhow::Result<()> {
//! let selector = Arc::new(TokioSelector::new());
//!
//! // A listener on an ephemeral port.
//! let listener = open_socket(selector.clone())
//! 	.stream()
//! 	.bind_with(None, |options| options.backlog_size = 1024)?;
//!
//! // An outbound connection with a larger send buffer.
//! let connection = open_socket(selector)
//! 	.stream()
//! 	.configure(|options| options.send_buffer_size = 64 * 1024)
//! 	.connect(listener.local_addr()?)
//! 	.await?;
//!
//! let accepted = listener.accept().await?;
//! # let _ = (connection, accepted);
//! # Ok(())
//! # }
//! ```
//!
//! Configuration is copy-on-write: every `configure` call installs a fresh
//! copy of the builder's option snapshot, so option values are never shared
//! mutable state. Narrowing (`stream()`, `datagram()`, and the terminal
//! operations) copies the fields the destination kind shares with the
//! source and defaults the rest; see the [`options`] module for the exact
//! fields and defaults.
//!
//!
//! # The selector boundary
//!
//! This crate does not poll for readiness itself. Suspending operations go
//! through the narrow [`Selector`][crate::selector::Selector] trait:
//! register a socket with an interest set and a readiness channel, suspend
//! on the channel, unregister.
//! [`TokioSelector`][crate::selector::TokioSelector] implements the boundary
//! on top of the
//! tokio reactor; anything else that can deliver readiness events, such as a
//! custom event loop or a test double, can stand in for it.
//!
//!
//! # Feature flags and platform support
//!
//! This library is based on [`socket2`] and [`tokio`], and supports
//! Unix-like platforms and, except for the tokio-backed selector, Windows.
//!
//! * `futures`: Adds [`Listener::incoming`], an implementation of
//!   `futures::Stream` over accepted connections.
//!
//!
//! # Related libraries
//!
//! * [`socket2`]: Basis of this library's socket creation and option
//!   application.
//! * [`tokio`]: Supplies the runtime the issued handles perform their I/O
//!   with, and the reactor behind the default selector.

#![allow(clippy::tabs_in_doc_comments)] // This project uses tabs for indentation throughout, including in documentation examples.

mod builder;
mod connect;
pub mod errors;
mod handles;
mod open;
mod options;
mod registry;
pub mod selector;

pub use self::{
	builder::*,
	handles::*,
	options::*,
	registry::*,
};

cfg_if::cfg_if! {
	if #[cfg(windows)] {
		#[path = "sys/windows.rs"] mod sys;
	}
	else {
		#[path = "sys/other.rs"] mod sys;
	}
}

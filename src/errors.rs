//! Various errors that can be raised by this library.

use std::io;

#[cfg(doc)]
use crate::{
	selector::Selector,
	DatagramSocketBuilder,
	Listener,
	StreamSocketBuilder,
};

/// An error in the selector integration boundary.
///
/// Raised by [`Selector`] implementations when registering interest, and by
/// the suspending operations when a pending readiness subscription goes away
/// before it becomes ready.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SelectorError {
	/// Registering the socket with the readiness engine failed.
	#[error("couldn't register interest with the selector: {error}")]
	#[non_exhaustive]
	Register {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// The selector has been shut down and accepts no further
	/// registrations.
	#[error("the selector has been closed")]
	#[non_exhaustive]
	Closed,

	/// The pending readiness subscription was cancelled before the
	/// requested interest became ready.
	///
	/// This is how cancellation surfaces to a suspended `connect` or
	/// `accept`: distinct from any network failure, and guaranteed to leave
	/// no registration or native handle behind.
	#[error("the pending readiness subscription was cancelled")]
	#[non_exhaustive]
	Cancelled,
}

fn selector_error_kind(error: &SelectorError) -> io::ErrorKind {
	match error {
		SelectorError::Register { error } => error.kind(),
		SelectorError::Closed => io::ErrorKind::NotConnected,
		SelectorError::Cancelled => io::ErrorKind::Interrupted,
	}
}

impl From<SelectorError> for io::Error {
	fn from(error: SelectorError) -> Self {
		io::Error::new(selector_error_kind(&error), error)
	}
}

/// An error that occurred while establishing an outbound stream connection
/// with [`StreamSocketBuilder::connect`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConnectError {
	/// Resolving a hostname to a socket address failed.
	#[error("couldn't resolve the remote address: {error}")]
	#[non_exhaustive]
	Resolve {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// Resolving a hostname succeeded but produced no usable address.
	#[error("the remote hostname resolved to no addresses")]
	#[non_exhaustive]
	NoAddresses,

	/// [`socket2::Socket::new`] failed.
	#[error("couldn't create socket: {error}")]
	#[non_exhaustive]
	CreateSocket {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// Setting a socket option failed.
	#[error("couldn't set socket option `{option}`: {error}")]
	#[non_exhaustive]
	SetSockOpt {
		/// The name of the socket option, like `TCP_NODELAY`.
		option: &'static str,

		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// There was an error setting non-blocking mode on the socket.
	#[error("couldn't set non-blocking mode on socket: {error}")]
	#[non_exhaustive]
	SetNonBlocking {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// The connection handshake failed.
	///
	/// The underlying platform error (refused, unreachable, timed out) is
	/// carried verbatim, whether the failure was reported synchronously by
	/// the `connect` call or asynchronously through `SO_ERROR` after the
	/// socket signalled connectable. No retry is attempted; retry and
	/// backoff policy belong to the caller.
	#[error("couldn't connect to the remote address: {error}")]
	#[non_exhaustive]
	Connect {
		/// The platform error, untranslated.
		#[source]
		error: io::Error,
	},

	/// The selector boundary failed or the pending connect was cancelled.
	#[error("{0}")]
	Selector(#[from] SelectorError),

	/// The established socket could not be handed to the async runtime.
	#[error("error passing the socket to the async runtime: {error}")]
	#[non_exhaustive]
	Wrap {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},
}

impl From<ConnectError> for io::Error {
	fn from(error: ConnectError) -> Self {
		let kind = match &error {
			ConnectError::NoAddresses => io::ErrorKind::NotFound,

			| ConnectError::Resolve { error }
			| ConnectError::CreateSocket { error }
			| ConnectError::SetSockOpt { error, .. }
			| ConnectError::SetNonBlocking { error }
			| ConnectError::Connect { error }
			| ConnectError::Wrap { error }
			=> error.kind(),

			ConnectError::Selector(error) => selector_error_kind(error),
		};

		io::Error::new(kind, error)
	}
}

/// An error that occurred while synchronously setting up a socket: a stream
/// listener ([`StreamSocketBuilder::bind`]) or a datagram socket
/// ([`DatagramSocketBuilder::bind`] and [`DatagramSocketBuilder::connect`]).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BindError {
	/// Resolving a hostname to a socket address failed.
	#[error("couldn't resolve the bind address: {error}")]
	#[non_exhaustive]
	Resolve {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// Resolving a hostname succeeded but produced no usable address.
	#[error("the bind hostname resolved to no addresses")]
	#[non_exhaustive]
	NoAddresses,

	/// [`socket2::Socket::new`] failed.
	#[error("couldn't create socket: {error}")]
	#[non_exhaustive]
	CreateSocket {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// Setting a socket option failed.
	#[error("couldn't set socket option `{option}`: {error}")]
	#[non_exhaustive]
	SetSockOpt {
		/// The name of the socket option, like `SO_REUSEADDR`.
		option: &'static str,

		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// There was an error setting non-blocking mode on the socket.
	#[error("couldn't set non-blocking mode on socket: {error}")]
	#[non_exhaustive]
	SetNonBlocking {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// [`socket2::Socket::bind`] failed, typically because the address is
	/// already in use or permission was denied.
	#[error("couldn't bind socket to address: {error}")]
	#[non_exhaustive]
	Bind {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// [`socket2::Socket::listen`] failed.
	#[error("couldn't make the socket listen: {error}")]
	#[non_exhaustive]
	Listen {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// Fixing a datagram socket to its remote peer failed.
	#[error("couldn't set the datagram socket's remote peer: {error}")]
	#[non_exhaustive]
	Connect {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// The bound socket could not be handed to the async runtime.
	#[error("error passing the socket to the async runtime: {error}")]
	#[non_exhaustive]
	Wrap {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},
}

impl From<BindError> for io::Error {
	fn from(error: BindError) -> Self {
		let kind = match &error {
			BindError::NoAddresses => io::ErrorKind::NotFound,

			| BindError::Resolve { error }
			| BindError::CreateSocket { error }
			| BindError::SetSockOpt { error, .. }
			| BindError::SetNonBlocking { error }
			| BindError::Bind { error }
			| BindError::Listen { error }
			| BindError::Connect { error }
			| BindError::Wrap { error }
			=> error.kind(),
		};

		io::Error::new(kind, error)
	}
}

/// An error that occurred while accepting an inbound connection with
/// [`Listener::accept`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AcceptError {
	/// The platform `accept` call failed.
	#[error("couldn't accept a connection: {error}")]
	#[non_exhaustive]
	Accept {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},

	/// The selector boundary failed or the pending accept was cancelled.
	///
	/// Cancellation only abandons this one accept; the listening socket
	/// itself stays intact and usable for future accept calls.
	#[error("{0}")]
	Selector(#[from] SelectorError),

	/// The accepted socket could not be handed to the async runtime.
	#[error("error passing the socket to the async runtime: {error}")]
	#[non_exhaustive]
	Wrap {
		/// The error that this one arose from.
		#[source]
		error: io::Error,
	},
}

impl From<AcceptError> for io::Error {
	fn from(error: AcceptError) -> Self {
		let kind = match &error {
			| AcceptError::Accept { error }
			| AcceptError::Wrap { error }
			=> error.kind(),

			AcceptError::Selector(error) => selector_error_kind(error),
		};

		io::Error::new(kind, error)
	}
}

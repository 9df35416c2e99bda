//! The asynchronous stream-connect operation.
//!
//! The socket is created non-blocking, the connect is started, and if the
//! platform reports it as in progress the calling task suspends on the
//! selector boundary until the socket signals connectable. The handshake
//! outcome is then harvested from `SO_ERROR`.
//!
//! Cancellation cannot leak resources on this path: the pending socket is a
//! local owned value (dropping it closes the descriptor), and the selector
//! registration is retired by an RAII guard inside the suspend point.

use crate::{
	errors::ConnectError,
	handles::ConnectedStream,
	open,
	selector::{self, Interest, Selector},
	sys,
};
use cfg_if::cfg_if;
use socket2::Socket;
use std::{
	io,
	net::SocketAddr,
	sync::Arc,
};

pub(crate) async fn connect_stream(
	selector: &Arc<dyn Selector>,
	peer: SocketAddr,
	options: &crate::options::StreamClientSocketOptions,
) -> Result<ConnectedStream, ConnectError> {
	let socket = open::new_stream_client_socket(peer, options)?;

	match socket.connect(&peer.into()) {
		Ok(()) => {
			tracing::debug!(%peer, "connect completed synchronously");
		}

		Err(error) if connect_in_progress(&error) => {
			wait_for_handshake(selector, &socket, peer).await?;
		}

		Err(error) => {
			tracing::debug!(%peer, %error, "connect refused synchronously");
			return Err(ConnectError::Connect { error });
		}
	}

	ConnectedStream::from_established(socket)
	.map_err(|error| ConnectError::Wrap { error })
}

/// Suspends until the in-progress connect resolves, then reads the outcome
/// from `SO_ERROR`. The pending error status is cleared by reading it, so it
/// is read exactly once.
async fn wait_for_handshake(
	selector: &Arc<dyn Selector>,
	socket: &Socket,
	peer: SocketAddr,
) -> Result<(), ConnectError> {
	selector::wait_for_ready(&**selector, sys::as_raw_socket(socket), Interest::CONNECTABLE).await?;

	if let Some(error) =
		socket.take_error()
		.map_err(|error| ConnectError::Connect { error })?
	{
		tracing::debug!(%peer, %error, "connect handshake failed");
		return Err(ConnectError::Connect { error });
	}

	tracing::debug!(%peer, "connect handshake completed");

	Ok(())
}

/// Whether a `connect` error means "in progress, wait for writability"
/// rather than an actual failure.
fn connect_in_progress(error: &io::Error) -> bool {
	cfg_if! {
		if #[cfg(unix)] {
			error.raw_os_error() == Some(libc::EINPROGRESS)
		}
		else {
			error.kind() == io::ErrorKind::WouldBlock
		}
	}
}

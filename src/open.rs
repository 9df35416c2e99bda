//! Synchronous platform primitives: creating a socket, applying a narrowed
//! option set to it, and binding/listening/fixing-to-a-peer.
//!
//! Everything here completes without suspending. The asynchronous half of
//! establishment (waiting for an in-progress connect, waiting for an
//! acceptable listener) lives in [`crate::connect`] and [`crate::handles`].

use crate::{
	errors::BindError,
	options::{
		DatagramSocketOptions,
		StreamClientSocketOptions,
		StreamServerSocketOptions,
		TypeOfService,
	},
};
use socket2::{Domain, Protocol, Socket, Type};
use std::{
	io,
	net::{Ipv4Addr, Ipv6Addr, SocketAddr},
	time::Duration,
};

/// A socket option application that failed, with the option's conventional
/// name. Mapped into the operation-specific error type at the call site.
pub(crate) struct ApplyError {
	pub(crate) option: &'static str,
	pub(crate) error: io::Error,
}

impl ApplyError {
	fn new(option: &'static str) -> impl FnOnce(io::Error) -> Self {
		move |error| Self { option, error }
	}
}

/// Applies the options shared by every socket kind: type of service and the
/// two reuse flags.
///
/// Type of service and `SO_REUSEPORT` are best-effort: on platforms without
/// them, the requested value is skipped rather than reported as an error.
pub(crate) fn apply_common_options(
	socket: &Socket,
	type_of_service: TypeOfService,
	reuse_address: bool,
	reuse_port: bool,
) -> Result<(), ApplyError> {
	if type_of_service != TypeOfService::Undefined {
		#[cfg(not(any(
			target_os = "fuchsia",
			target_os = "illumos",
			target_os = "netbsd",
			target_os = "redox",
			target_os = "solaris",
		)))]
		socket.set_tos(u32::from(type_of_service.value()))
		.map_err(ApplyError::new("IP_TOS"))?;
	}

	if reuse_address {
		socket.set_reuse_address(true)
		.map_err(ApplyError::new("SO_REUSEADDR"))?;
	}

	if reuse_port {
		#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
		socket.set_reuse_port(true)
		.map_err(ApplyError::new("SO_REUSEPORT"))?;
	}

	Ok(())
}

/// Applies the peer options: send and receive buffer sizes.
///
/// The `-1`/`0` sentinels mean "let the platform decide" and are honored by
/// skipping the corresponding call entirely, never by setting a zero-sized
/// buffer.
pub(crate) fn apply_peer_options(
	socket: &Socket,
	send_buffer_size: i32,
	receive_buffer_size: i32,
) -> Result<(), ApplyError> {
	if send_buffer_size > 0 {
		socket.set_send_buffer_size(send_buffer_size as usize)
		.map_err(ApplyError::new("SO_SNDBUF"))?;
	}

	if receive_buffer_size > 0 {
		socket.set_recv_buffer_size(receive_buffer_size as usize)
		.map_err(ApplyError::new("SO_RCVBUF"))?;
	}

	Ok(())
}

/// Applies the stream-client options on top of the common and peer ones.
///
/// `socket_timeout_millis` is deliberately not applied here: the infinite
/// sentinel is carried verbatim for an external timeout wrapper to
/// interpret, and the issued socket performs non-blocking I/O anyway.
pub(crate) fn apply_stream_client_options(
	socket: &Socket,
	options: &StreamClientSocketOptions,
) -> Result<(), ApplyError> {
	apply_common_options(
		socket,
		options.type_of_service,
		options.reuse_address,
		options.reuse_port,
	)?;
	apply_peer_options(socket, options.send_buffer_size, options.receive_buffer_size)?;

	socket.set_nodelay(options.no_delay)
	.map_err(ApplyError::new("TCP_NODELAY"))?;

	if options.linger_seconds >= 0 {
		socket.set_linger(Some(Duration::from_secs(options.linger_seconds as u64)))
		.map_err(ApplyError::new("SO_LINGER"))?;
	}

	if let Some(keep_alive) = options.keep_alive {
		socket.set_keepalive(keep_alive)
		.map_err(ApplyError::new("SO_KEEPALIVE"))?;
	}

	Ok(())
}

/// Creates the non-blocking stream socket a connect attempt starts from,
/// with the client options applied. The caller performs the actual connect.
pub(crate) fn new_stream_client_socket(
	peer: SocketAddr,
	options: &StreamClientSocketOptions,
) -> Result<Socket, crate::errors::ConnectError> {
	use crate::errors::ConnectError;

	let socket =
		Socket::new(Domain::for_address(peer), Type::STREAM, Some(Protocol::TCP))
		.map_err(|error| ConnectError::CreateSocket { error })?;

	socket.set_nonblocking(true)
	.map_err(|error| ConnectError::SetNonBlocking { error })?;

	apply_stream_client_options(&socket, options)
	.map_err(|ApplyError { option, error }| ConnectError::SetSockOpt { option, error })?;

	Ok(socket)
}

/// Creates, configures, binds, and starts listening on a stream socket.
/// Returns the listening socket in non-blocking mode, ready to be registered
/// for acceptable-readiness.
pub(crate) fn open_stream_listener(
	address: SocketAddr,
	options: &StreamServerSocketOptions,
) -> Result<Socket, BindError> {
	let socket =
		Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
		.map_err(|error| BindError::CreateSocket { error })?;

	socket.set_nonblocking(true)
	.map_err(|error| BindError::SetNonBlocking { error })?;

	apply_common_options(
		&socket,
		options.type_of_service,
		options.reuse_address,
		options.reuse_port,
	)
	.map_err(|ApplyError { option, error }| BindError::SetSockOpt { option, error })?;

	socket.bind(&address.into())
	.map_err(|error| BindError::Bind { error })?;

	socket.listen(options.backlog_size)
	.map_err(|error| BindError::Listen { error })?;

	tracing::debug!(%address, backlog = options.backlog_size, "stream listener bound");

	Ok(socket)
}

/// Creates, configures, and binds a datagram socket; optionally fixes it to
/// `remote`, after which the platform delivers only datagrams from that
/// peer.
pub(crate) fn open_datagram_socket(
	local: Option<SocketAddr>,
	remote: Option<SocketAddr>,
	options: &DatagramSocketOptions,
) -> Result<Socket, BindError> {
	let local = local.unwrap_or_else(|| unspecified_for(remote));

	let socket =
		Socket::new(Domain::for_address(local), Type::DGRAM, Some(Protocol::UDP))
		.map_err(|error| BindError::CreateSocket { error })?;

	socket.set_nonblocking(true)
	.map_err(|error| BindError::SetNonBlocking { error })?;

	apply_common_options(
		&socket,
		options.type_of_service,
		options.reuse_address,
		options.reuse_port,
	)
	.map_err(|ApplyError { option, error }| BindError::SetSockOpt { option, error })?;

	apply_peer_options(&socket, options.send_buffer_size, options.receive_buffer_size)
	.map_err(|ApplyError { option, error }| BindError::SetSockOpt { option, error })?;

	if options.broadcast {
		socket.set_broadcast(true)
		.map_err(|error| BindError::SetSockOpt {
			option: "SO_BROADCAST",
			error,
		})?;
	}

	socket.bind(&local.into())
	.map_err(|error| BindError::Bind { error })?;

	if let Some(remote) = remote {
		socket.connect(&remote.into())
		.map_err(|error| BindError::Connect { error })?;

		tracing::debug!(%local, %remote, "connected datagram socket opened");
	}
	else {
		tracing::debug!(%local, "bound datagram socket opened");
	}

	Ok(socket)
}

/// The all-zero bind address matching the family of `remote`, defaulting to
/// IPv4 when there is no remote to match.
fn unspecified_for(remote: Option<SocketAddr>) -> SocketAddr {
	match remote {
		Some(SocketAddr::V6(_)) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
		_ => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
	}
}

/// The default stream bind address: every IPv4 interface, ephemeral port.
pub(crate) fn default_bind_address() -> SocketAddr {
	SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::options::SocketOptions;

	#[test]
	fn listener_gets_an_ephemeral_port() {
		let options = SocketOptions::new().to_stream_server();
		let socket = open_stream_listener(default_bind_address(), &options).unwrap();

		let local = socket.local_addr().unwrap().as_socket().unwrap();
		assert_ne!(local.port(), 0);
	}

	#[test]
	fn sentinel_buffer_sizes_are_not_applied() {
		let options = SocketOptions::new().to_peer().to_datagram();
		let socket = open_datagram_socket(None, None, &options).unwrap();

		// The platform default is some positive size; the -1 sentinels must
		// not have clamped it to zero.
		assert!(socket.send_buffer_size().unwrap() > 0);
		assert!(socket.recv_buffer_size().unwrap() > 0);
	}

	#[test]
	fn datagram_connect_fixes_the_peer() {
		use std::net::Ipv4Addr;

		let loopback = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);

		let server_options = SocketOptions::new().to_peer().to_datagram();
		let server = open_datagram_socket(Some(loopback), None, &server_options).unwrap();
		let server_addr = server.local_addr().unwrap().as_socket().unwrap();

		let options = SocketOptions::new().to_peer().to_datagram();
		let socket = open_datagram_socket(None, Some(server_addr), &options).unwrap();

		let peer = socket.peer_addr().unwrap().as_socket().unwrap();
		assert_eq!(peer, server_addr);
	}
}

//! The builder layer: describe the socket you want, configure it, and turn
//! the description into an established socket handle.
//!
//! The entry point is [`open_socket`], which takes a reference to the
//! readiness [`Selector`] and yields a [`SocketBuilder`] with default
//! [`SocketOptions`]. From there, narrow to a [`StreamSocketBuilder`] or a
//! [`DatagramSocketBuilder`], optionally configure it through
//! [`Configurable::configure`], and invoke the terminal operation.
//!
//! A builder is meant to be owned by one logical task until its terminal
//! operation runs; configuration replaces the builder's option snapshot
//! wholesale and never mutates a snapshot in place.

use crate::{
	connect,
	errors::{BindError, ConnectError},
	handles::{BoundDatagram, ConnectedDatagram, Listener},
	open,
	options::{
		ConfigurableOptions,
		DatagramSocketOptions,
		PeerSocketOptions,
		SocketOptions,
		StreamClientSocketOptions,
		StreamServerSocketOptions,
	},
	selector::Selector,
	ConnectedStream,
};
use std::{
	net::SocketAddr,
	sync::Arc,
};

/// Start building a socket against the given readiness selector.
pub fn open_socket(selector: Arc<dyn Selector>) -> SocketBuilder {
	SocketBuilder {
		selector,
		options: SocketOptions::new(),
	}
}

/// A builder that owns an option snapshot and can replace it with a
/// configured copy.
///
/// [`configure`][Self::configure] is the only way builders mutate options,
/// and it is copy-on-write: the mutation runs on a fresh copy of the current
/// snapshot, which is then installed as the new current snapshot. Any
/// reference to options obtained before the call is unaffected.
pub trait Configurable: Sized {
	/// The narrowed option set this builder holds.
	type Options: ConfigurableOptions;

	/// The builder's current option snapshot.
	fn options(&self) -> &Self::Options;

	/// Replaces the current options with a copy configured by `block`,
	/// returning the builder for chaining.
	fn configure(self, block: impl FnOnce(&mut Self::Options)) -> Self;

	/// Sets `TCP_NODELAY`, disabling Nagle's algorithm, on any builder.
	///
	/// The mutation only takes effect when the builder's options are
	/// actually stream-client options. On every other kind of builder
	/// (datagram, server, or not-yet-narrowed) this is a silent no-op by
	/// design, not an error.
	fn tcp_no_delay(self) -> Self {
		self.configure(|options| {
			if let Some(stream_client) = options.as_stream_client_mut() {
				stream_client.no_delay = true;
			}
		})
	}
}

/// The not-yet-narrowed socket builder returned by [`open_socket`].
pub struct SocketBuilder {
	selector: Arc<dyn Selector>,
	options: SocketOptions,
}

impl SocketBuilder {
	/// Builds a stream (TCP) socket.
	pub fn stream(&self) -> StreamSocketBuilder {
		StreamSocketBuilder {
			selector: self.selector.clone(),
			options: self.options.to_peer(),
		}
	}

	/// Builds a datagram (UDP) socket.
	pub fn datagram(&self) -> DatagramSocketBuilder {
		DatagramSocketBuilder {
			options: self.options.to_peer().to_datagram(),
		}
	}

	/// Builds a TCP socket.
	#[deprecated(note = "`tcp()` has been replaced with `stream()`.")]
	pub fn tcp(&self) -> StreamSocketBuilder {
		self.stream()
	}

	/// Builds a UDP socket.
	#[deprecated(note = "`udp()` has been replaced with `datagram()`.")]
	pub fn udp(&self) -> DatagramSocketBuilder {
		self.datagram()
	}
}

impl Configurable for SocketBuilder {
	type Options = SocketOptions;

	fn options(&self) -> &SocketOptions {
		&self.options
	}

	fn configure(mut self, block: impl FnOnce(&mut SocketOptions)) -> SocketBuilder {
		let mut options = self.options.clone();
		block(&mut options);
		self.options = options;
		self
	}
}

/// Builder for stream sockets: outbound connections and listeners.
pub struct StreamSocketBuilder {
	selector: Arc<dyn Selector>,
	options: PeerSocketOptions,
}

impl StreamSocketBuilder {
	/// Connects to `peer`.
	///
	/// The calling task suspends until the handshake completes, fails, or
	/// is cancelled. On failure the underlying platform error is surfaced
	/// untranslated; on cancellation no registration or descriptor is
	/// leaked.
	pub async fn connect(&self, peer: SocketAddr) -> Result<ConnectedStream, ConnectError> {
		self.connect_with(peer, |_| {}).await
	}

	/// Like [`connect`][Self::connect], with a final mutation applied to the
	/// stream-client options used for this one attempt.
	pub async fn connect_with(
		&self,
		peer: SocketAddr,
		configure: impl FnOnce(&mut StreamClientSocketOptions),
	) -> Result<ConnectedStream, ConnectError> {
		let mut options = self.options.to_stream_client();
		configure(&mut options);

		connect::connect_stream(&self.selector, peer, &options).await
	}

	/// Connects to `hostname`:`port`, resolving the hostname first.
	///
	/// Resolution is delegated to the runtime's resolver; the first
	/// resolved address is used.
	pub async fn connect_host(
		&self,
		hostname: &str,
		port: u16,
	) -> Result<ConnectedStream, ConnectError> {
		self.connect_host_with(hostname, port, |_| {}).await
	}

	/// Like [`connect_host`][Self::connect_host], with a final mutation
	/// applied to the stream-client options used for this one attempt.
	pub async fn connect_host_with(
		&self,
		hostname: &str,
		port: u16,
		configure: impl FnOnce(&mut StreamClientSocketOptions),
	) -> Result<ConnectedStream, ConnectError> {
		let peer =
			tokio::net::lookup_host((hostname, port))
			.await
			.map_err(|error| ConnectError::Resolve { error })?
			.next()
			.ok_or(ConnectError::NoAddresses)?;

		self.connect_with(peer, configure).await
	}

	/// Binds a listening socket at `address` (all IPv4 interfaces with an
	/// ephemeral port if `None`).
	///
	/// This call never suspends: the listener is created, configured,
	/// bound, and listening when it returns. Accepting connections from it
	/// is the suspending part.
	pub fn bind(&self, address: Option<SocketAddr>) -> Result<Listener, BindError> {
		self.bind_with(address, |_| {})
	}

	/// Like [`bind`][Self::bind], with a final mutation applied to the
	/// stream-server options used for this listener.
	pub fn bind_with(
		&self,
		address: Option<SocketAddr>,
		configure: impl FnOnce(&mut StreamServerSocketOptions),
	) -> Result<Listener, BindError> {
		let mut options = self.options.to_stream_server();
		configure(&mut options);

		let address = address.unwrap_or_else(open::default_bind_address);
		let socket = open::open_stream_listener(address, &options)?;

		Ok(Listener::new(socket, self.selector.clone()))
	}

	/// Binds a listening socket at `hostname`:`port`, resolving the
	/// hostname first.
	pub fn bind_host(&self, hostname: &str, port: u16) -> Result<Listener, BindError> {
		use std::net::ToSocketAddrs;

		let address =
			(hostname, port)
			.to_socket_addrs()
			.map_err(|error| BindError::Resolve { error })?
			.next()
			.ok_or(BindError::NoAddresses)?;

		self.bind(Some(address))
	}
}

impl Configurable for StreamSocketBuilder {
	type Options = PeerSocketOptions;

	fn options(&self) -> &PeerSocketOptions {
		&self.options
	}

	fn configure(mut self, block: impl FnOnce(&mut PeerSocketOptions)) -> StreamSocketBuilder {
		let mut options = self.options.clone();
		block(&mut options);
		self.options = options;
		self
	}
}

/// Builder for datagram sockets, bound or connected.
///
/// Both operations complete synchronously; datagram sockets have no
/// handshake to wait for. The issued handles get their I/O readiness from
/// the async runtime directly, so this builder does not hold a selector
/// reference.
pub struct DatagramSocketBuilder {
	options: DatagramSocketOptions,
}

impl DatagramSocketBuilder {
	/// Binds a datagram socket at `local` (all IPv4 interfaces with an
	/// ephemeral port if `None`). The socket can send to arbitrary peers
	/// and receives from any sender.
	pub fn bind(&self, local: Option<SocketAddr>) -> Result<BoundDatagram, BindError> {
		self.bind_with(local, |_| {})
	}

	/// Like [`bind`][Self::bind], with a final mutation applied to the
	/// datagram options used for this socket.
	pub fn bind_with(
		&self,
		local: Option<SocketAddr>,
		configure: impl FnOnce(&mut DatagramSocketOptions),
	) -> Result<BoundDatagram, BindError> {
		let mut options = self.options.clone();
		configure(&mut options);

		let socket = open::open_datagram_socket(local, None, &options)?;

		BoundDatagram::from_bound(socket)
		.map_err(|error| BindError::Wrap { error })
	}

	/// Creates a datagram socket bound at `local` and fixed to `remote`.
	///
	/// Inbound datagrams from any sender other than `remote` are filtered
	/// by the underlying transport and never delivered.
	pub fn connect(
		&self,
		remote: SocketAddr,
		local: Option<SocketAddr>,
	) -> Result<ConnectedDatagram, BindError> {
		self.connect_with(remote, local, |_| {})
	}

	/// Like [`connect`][Self::connect], with a final mutation applied to
	/// the datagram options used for this socket.
	pub fn connect_with(
		&self,
		remote: SocketAddr,
		local: Option<SocketAddr>,
		configure: impl FnOnce(&mut DatagramSocketOptions),
	) -> Result<ConnectedDatagram, BindError> {
		let mut options = self.options.clone();
		configure(&mut options);

		let socket = open::open_datagram_socket(local, Some(remote), &options)?;

		ConnectedDatagram::from_connected(socket)
		.map_err(|error| BindError::Wrap { error })
	}
}

impl Configurable for DatagramSocketBuilder {
	type Options = DatagramSocketOptions;

	fn options(&self) -> &DatagramSocketOptions {
		&self.options
	}

	fn configure(mut self, block: impl FnOnce(&mut DatagramSocketOptions)) -> DatagramSocketBuilder {
		let mut options = self.options.clone();
		block(&mut options);
		self.options = options;
		self
	}
}

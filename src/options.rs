use crate::registry::CustomOptions;

/// Sentinel for [`StreamClientSocketOptions::socket_timeout_millis`] meaning
/// that no timeout is enforced by this layer.
///
/// The sentinel is preserved exactly when options are copied or narrowed; it
/// is never converted to a zero duration. Timeout enforcement, if wanted,
/// belongs to a wrapper around the suspending operation (for example
/// `tokio::time::timeout`), not to this crate.
pub const INFINITE_TIMEOUT_MS: i64 = i64::MAX;

/// Outbound packet priority/classification hint (the IP TOS octet).
///
/// Not every platform honors every class; an unsupported value is applied on
/// a best-effort basis and otherwise ignored by the operating system.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum TypeOfService {
	/// No classification requested. The TOS octet is left untouched.
	#[default]
	Undefined,

	/// `IPTOS_LOWCOST`: minimize monetary cost.
	LowCost,

	/// `IPTOS_RELIABILITY`: maximize reliability.
	Reliability,

	/// `IPTOS_THROUGHPUT`: maximize throughput.
	Throughput,

	/// `IPTOS_LOWDELAY`: minimize latency.
	LowDelay,

	/// A raw TOS octet for classes not covered by the named variants.
	Other(u8),
}

impl TypeOfService {
	/// The raw TOS octet for this classification. `Undefined` maps to zero.
	pub const fn value(self) -> u8 {
		match self {
			Self::Undefined => 0x00,
			Self::LowCost => 0x02,
			Self::Reliability => 0x04,
			Self::Throughput => 0x08,
			Self::LowDelay => 0x10,
			Self::Other(value) => value,
		}
	}
}

/// General socket options, common to every socket kind. This is the root of
/// the narrowing hierarchy and the option set held by a freshly created
/// [`SocketBuilder`][crate::SocketBuilder].
///
/// Every option value in this crate is an independent snapshot: cloning one
/// duplicates all fields including the [custom registry][CustomOptions], and
/// mutating the clone never affects the source. Builders rely on this for
/// their copy-on-write [`configure`][crate::Configurable::configure]
/// protocol.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct SocketOptions {
	/// Open-ended registry for platform-specific or forward-compatible
	/// options that have no built-in field.
	pub custom: CustomOptions,

	/// Type-of-service classification for outbound packets. Default is
	/// [`TypeOfService::Undefined`].
	pub type_of_service: TypeOfService,

	/// `SO_REUSEADDR`: allow binding an address that is in `TIME_WAIT`.
	/// Default is false.
	pub reuse_address: bool,

	/// `SO_REUSEPORT`: allow several sockets to bind the same port. Not
	/// available on every platform; where unavailable it is skipped.
	/// Default is false.
	pub reuse_port: bool,
}

impl SocketOptions {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Narrows to peer options (stream client or datagram).
	///
	/// Common fields are carried over; the peer-only fields start at their
	/// documented defaults.
	pub fn to_peer(&self) -> PeerSocketOptions {
		PeerSocketOptions {
			custom: self.custom.clone(),
			type_of_service: self.type_of_service,
			reuse_address: self.reuse_address,
			reuse_port: self.reuse_port,
			send_buffer_size: -1,
			receive_buffer_size: -1,
		}
	}

	/// Narrows to stream-server options.
	///
	/// Common fields are carried over;
	/// [`backlog_size`][StreamServerSocketOptions::backlog_size] starts at
	/// its default.
	pub fn to_stream_server(&self) -> StreamServerSocketOptions {
		StreamServerSocketOptions {
			custom: self.custom.clone(),
			type_of_service: self.type_of_service,
			reuse_address: self.reuse_address,
			reuse_port: self.reuse_port,
			backlog_size: StreamServerSocketOptions::DEFAULT_BACKLOG_SIZE,
		}
	}
}

/// Options common to stream-client and datagram sockets.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct PeerSocketOptions {
	/// See [`SocketOptions::custom`].
	pub custom: CustomOptions,

	/// See [`SocketOptions::type_of_service`].
	pub type_of_service: TypeOfService,

	/// See [`SocketOptions::reuse_address`].
	pub reuse_address: bool,

	/// See [`SocketOptions::reuse_port`].
	pub reuse_port: bool,

	/// Outgoing buffer size (`SO_SNDBUF`). `-1` (the default) or `0` lets
	/// the platform decide.
	pub send_buffer_size: i32,

	/// Incoming buffer size (`SO_RCVBUF`). `-1` (the default) or `0` lets
	/// the platform decide.
	pub receive_buffer_size: i32,
}

impl Default for PeerSocketOptions {
	fn default() -> Self {
		SocketOptions::default().to_peer()
	}
}

impl PeerSocketOptions {
	/// Narrows to stream-client options.
	///
	/// Common and peer fields are carried over; the client-only fields start
	/// at their documented defaults.
	pub fn to_stream_client(&self) -> StreamClientSocketOptions {
		StreamClientSocketOptions {
			custom: self.custom.clone(),
			type_of_service: self.type_of_service,
			reuse_address: self.reuse_address,
			reuse_port: self.reuse_port,
			send_buffer_size: self.send_buffer_size,
			receive_buffer_size: self.receive_buffer_size,
			no_delay: true,
			linger_seconds: -1,
			keep_alive: None,
			socket_timeout_millis: INFINITE_TIMEOUT_MS,
		}
	}

	/// Narrows to datagram options.
	///
	/// Common and peer fields are carried over;
	/// [`broadcast`][DatagramSocketOptions::broadcast] starts at its
	/// default.
	pub fn to_datagram(&self) -> DatagramSocketOptions {
		DatagramSocketOptions {
			custom: self.custom.clone(),
			type_of_service: self.type_of_service,
			reuse_address: self.reuse_address,
			reuse_port: self.reuse_port,
			send_buffer_size: self.send_buffer_size,
			receive_buffer_size: self.receive_buffer_size,
			broadcast: false,
		}
	}

	/// Narrows to stream-server options.
	///
	/// Only the fields shared with [`SocketOptions`] are carried over; the
	/// peer buffer sizes are not server options and are dropped.
	pub fn to_stream_server(&self) -> StreamServerSocketOptions {
		StreamServerSocketOptions {
			custom: self.custom.clone(),
			type_of_service: self.type_of_service,
			reuse_address: self.reuse_address,
			reuse_port: self.reuse_port,
			backlog_size: StreamServerSocketOptions::DEFAULT_BACKLOG_SIZE,
		}
	}
}

/// Options for a connecting (client) stream socket.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct StreamClientSocketOptions {
	/// See [`SocketOptions::custom`].
	pub custom: CustomOptions,

	/// See [`SocketOptions::type_of_service`].
	pub type_of_service: TypeOfService,

	/// See [`SocketOptions::reuse_address`].
	pub reuse_address: bool,

	/// See [`SocketOptions::reuse_port`].
	pub reuse_port: bool,

	/// See [`PeerSocketOptions::send_buffer_size`].
	pub send_buffer_size: i32,

	/// See [`PeerSocketOptions::receive_buffer_size`].
	pub receive_buffer_size: i32,

	/// `TCP_NODELAY`: disable Nagle's algorithm and send small segments
	/// immediately. Default is true.
	pub no_delay: bool,

	/// `SO_LINGER` timeout in seconds, applied at socket close. `-1` (the
	/// default) leaves the system behavior in place. `0` discards unsent
	/// data with a reset on close; useful for debugging, not recommended
	/// otherwise.
	pub linger_seconds: i32,

	/// `SO_KEEPALIVE` tri-state: `Some(true)`/`Some(false)` enable or
	/// disable keep-alive probing explicitly, `None` (the default) keeps the
	/// system default.
	pub keep_alive: Option<bool>,

	/// Read/write timeout in milliseconds for the issued socket.
	///
	/// The default, [`INFINITE_TIMEOUT_MS`], means this layer enforces no
	/// timeout. The value is carried verbatim for the benefit of whatever
	/// performs I/O on the handle; it is never translated into a zero
	/// timeout.
	pub socket_timeout_millis: i64,
}

impl Default for StreamClientSocketOptions {
	fn default() -> Self {
		PeerSocketOptions::default().to_stream_client()
	}
}

/// Options for a datagram socket, bound or connected.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct DatagramSocketOptions {
	/// See [`SocketOptions::custom`].
	pub custom: CustomOptions,

	/// See [`SocketOptions::type_of_service`].
	pub type_of_service: TypeOfService,

	/// See [`SocketOptions::reuse_address`].
	pub reuse_address: bool,

	/// See [`SocketOptions::reuse_port`].
	pub reuse_port: bool,

	/// See [`PeerSocketOptions::send_buffer_size`].
	pub send_buffer_size: i32,

	/// See [`PeerSocketOptions::receive_buffer_size`].
	pub receive_buffer_size: i32,

	/// `SO_BROADCAST`: permit sending to broadcast addresses. Default is
	/// false.
	pub broadcast: bool,
}

impl Default for DatagramSocketOptions {
	fn default() -> Self {
		PeerSocketOptions::default().to_datagram()
	}
}

/// Options for a listening stream socket.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct StreamServerSocketOptions {
	/// See [`SocketOptions::custom`].
	pub custom: CustomOptions,

	/// See [`SocketOptions::type_of_service`].
	pub type_of_service: TypeOfService,

	/// See [`SocketOptions::reuse_address`].
	pub reuse_address: bool,

	/// See [`SocketOptions::reuse_port`].
	pub reuse_port: bool,

	/// Server socket backlog size. When a client attempts to connect, the
	/// attempt is queued in the backlog until `accept` removes it. If the
	/// backlog overflows, the underlying TCP implementation rejects further
	/// attempts, usually with an RST frame that shows up as "connection
	/// reset by peer" on the opposite side.
	pub backlog_size: i32,
}

impl Default for StreamServerSocketOptions {
	fn default() -> Self {
		SocketOptions::default().to_stream_server()
	}
}

impl StreamServerSocketOptions {
	/// The default value of [`backlog_size`][Self::backlog_size].
	pub const DEFAULT_BACKLOG_SIZE: i32 = 511;
}

mod sealed {
	pub trait Sealed {}

	impl Sealed for super::SocketOptions {}
	impl Sealed for super::PeerSocketOptions {}
	impl Sealed for super::StreamClientSocketOptions {}
	impl Sealed for super::DatagramSocketOptions {}
	impl Sealed for super::StreamServerSocketOptions {}
}

/// The closed family of option values a
/// [`Configurable`][crate::Configurable] builder can hold.
///
/// This trait is sealed; the five option structs in this module are the only
/// implementors.
pub trait ConfigurableOptions: sealed::Sealed + Clone {
	/// Narrowed view used by kind-specific convenience mutations such as
	/// [`tcp_no_delay`][crate::Configurable::tcp_no_delay].
	///
	/// Returns `Some` only when this option value actually is a
	/// [`StreamClientSocketOptions`]; every other kind returns `None`, which
	/// makes such mutations a silent no-op rather than an error.
	fn as_stream_client_mut(&mut self) -> Option<&mut StreamClientSocketOptions> {
		None
	}
}

impl ConfigurableOptions for SocketOptions {}
impl ConfigurableOptions for PeerSocketOptions {}
impl ConfigurableOptions for DatagramSocketOptions {}
impl ConfigurableOptions for StreamServerSocketOptions {}

impl ConfigurableOptions for StreamClientSocketOptions {
	fn as_stream_client_mut(&mut self) -> Option<&mut StreamClientSocketOptions> {
		Some(self)
	}
}

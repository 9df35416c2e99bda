//! The socket handles issued by the builders.
//!
//! Each handle owns its native socket outright; the builder that produced it
//! retains nothing. Byte-level I/O is delegated to the async runtime's
//! socket types; this crate's job ends once the socket is established and
//! configured.

use crate::{
	errors::AcceptError,
	selector::{self, Interest, Selector},
	sys,
};
use pin_project::pin_project;
use socket2::Socket;
use std::{
	io,
	net::SocketAddr,
	pin::Pin,
	sync::Arc,
	task,
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[cfg(feature = "futures")]
use std::future::Future;

#[cfg(windows)]
use std::os::windows::io::{AsRawSocket, AsSocket, BorrowedSocket, RawSocket};

#[cfg(not(windows))]
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

fn sockaddr_into(addr: socket2::SockAddr) -> io::Result<SocketAddr> {
	addr.as_socket().ok_or_else(|| {
		io::Error::new(io::ErrorKind::InvalidData, "socket has a non-Internet address")
	})
}

/// A connected stream socket, as issued by
/// [`StreamSocketBuilder::connect`][crate::StreamSocketBuilder::connect] and
/// [`Listener::accept`].
///
/// Implements [`AsyncRead`] and [`AsyncWrite`] by delegating to the
/// runtime's stream type, so it can be used anywhere a
/// [`tokio::net::TcpStream`] can.
#[derive(Debug)]
#[pin_project]
pub struct ConnectedStream {
	#[pin]
	inner: tokio::net::TcpStream,
}

impl ConnectedStream {
	/// Wraps an established non-blocking socket in the runtime's stream
	/// type. Must be called from within the runtime.
	pub(crate) fn from_established(socket: Socket) -> io::Result<Self> {
		let stream: std::net::TcpStream = socket.into();
		let inner = tokio::net::TcpStream::from_std(stream)?;

		Ok(Self { inner })
	}

	/// Returns the local address that this socket is bound to.
	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.inner.local_addr()
	}

	/// Returns the remote address that this socket is connected to.
	pub fn peer_addr(&self) -> io::Result<SocketAddr> {
		self.inner.peer_addr()
	}
}

impl AsyncRead for ConnectedStream {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut task::Context,
		buf: &mut ReadBuf,
	) -> task::Poll<io::Result<()>> {
		self.project().inner.poll_read(cx, buf)
	}
}

impl AsyncWrite for ConnectedStream {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut task::Context,
		buf: &[u8],
	) -> task::Poll<Result<usize, io::Error>> {
		self.project().inner.poll_write(cx, buf)
	}

	fn poll_flush(
		self: Pin<&mut Self>,
		cx: &mut task::Context,
	) -> task::Poll<Result<(), io::Error>> {
		self.project().inner.poll_flush(cx)
	}

	fn poll_shutdown(
		self: Pin<&mut Self>,
		cx: &mut task::Context,
	) -> task::Poll<Result<(), io::Error>> {
		self.project().inner.poll_shutdown(cx)
	}

	fn poll_write_vectored(
		self: Pin<&mut Self>,
		cx: &mut task::Context,
		bufs: &[io::IoSlice],
	) -> task::Poll<Result<usize, io::Error>> {
		self.project().inner.poll_write_vectored(cx, bufs)
	}

	fn is_write_vectored(&self) -> bool {
		self.inner.is_write_vectored()
	}
}

impl TryFrom<ConnectedStream> for Socket {
	type Error = io::Error;

	fn try_from(stream: ConnectedStream) -> Result<Self, Self::Error> {
		stream.inner.into_std().map(Socket::from)
	}
}

#[cfg(not(windows))]
impl AsFd for ConnectedStream {
	fn as_fd(&self) -> BorrowedFd {
		self.inner.as_fd()
	}
}

#[cfg(not(windows))]
impl AsRawFd for ConnectedStream {
	fn as_raw_fd(&self) -> RawFd {
		self.inner.as_raw_fd()
	}
}

#[cfg(windows)]
impl AsRawSocket for ConnectedStream {
	fn as_raw_socket(&self) -> RawSocket {
		self.inner.as_raw_socket()
	}
}

#[cfg(windows)]
impl AsSocket for ConnectedStream {
	fn as_socket(&self) -> BorrowedSocket {
		self.inner.as_socket()
	}
}

/// A listening stream socket, as issued by
/// [`StreamSocketBuilder::bind`][crate::StreamSocketBuilder::bind].
///
/// [`accept`][Self::accept] pulls connections lazily: each call suspends
/// until one inbound connection is available and produces exactly that one.
/// The listener never buffers beyond the platform's own backlog, and it can
/// be accepted from indefinitely.
pub struct Listener {
	socket: Socket,
	selector: Arc<dyn Selector>,
}

impl std::fmt::Debug for Listener {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Listener")
		.field("socket", &self.socket)
		.finish_non_exhaustive()
	}
}

impl Listener {
	pub(crate) fn new(socket: Socket, selector: Arc<dyn Selector>) -> Self {
		Self { socket, selector }
	}

	/// Accepts one inbound connection, suspending until one arrives.
	///
	/// Cancelling a pending accept (dropping the future) retires the
	/// readiness registration but leaves the listener itself untouched;
	/// later accept calls work normally.
	pub async fn accept(&self) -> Result<ConnectedStream, AcceptError> {
		loop {
			match self.socket.accept() {
				Ok((socket, peer)) => {
					socket.set_nonblocking(true)
					.map_err(|error| AcceptError::Accept { error })?;

					tracing::debug!(peer = ?peer.as_socket(), "accepted connection");

					return ConnectedStream::from_established(socket)
					.map_err(|error| AcceptError::Wrap { error });
				}

				Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
					selector::wait_for_ready(
						&*self.selector,
						sys::as_raw_socket(&self.socket),
						Interest::ACCEPTABLE,
					)
					.await?;
				}

				Err(error) => return Err(AcceptError::Accept { error }),
			}
		}
	}

	/// Returns the local address that this listener is bound to. Binding to
	/// port zero resolves here to the platform-allocated ephemeral port.
	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.socket.local_addr().and_then(sockaddr_into)
	}

	/// Adapts the listener into an unbounded [`futures::Stream`] of accepted
	/// connections.
	///
	/// # Availability
	///
	/// Requires the `futures` feature.
	#[cfg(feature = "futures")]
	pub fn incoming(&self) -> Incoming<'_> {
		Incoming {
			listener: self,
			pending: None,
		}
	}
}

impl From<Listener> for Socket {
	fn from(listener: Listener) -> Self {
		listener.socket
	}
}

#[cfg(not(windows))]
impl AsFd for Listener {
	fn as_fd(&self) -> BorrowedFd {
		self.socket.as_fd()
	}
}

#[cfg(not(windows))]
impl AsRawFd for Listener {
	fn as_raw_fd(&self) -> RawFd {
		self.socket.as_raw_fd()
	}
}

#[cfg(windows)]
impl AsRawSocket for Listener {
	fn as_raw_socket(&self) -> RawSocket {
		self.socket.as_raw_socket()
	}
}

/// The stream of connections accepted by a [`Listener`], created by
/// [`Listener::incoming`].
///
/// # Availability
///
/// Requires the `futures` feature.
#[cfg(feature = "futures")]
pub struct Incoming<'a> {
	listener: &'a Listener,
	pending: Option<Pin<Box<dyn Future<Output = Result<ConnectedStream, AcceptError>> + Send + 'a>>>,
}

#[cfg(feature = "futures")]
impl futures::Stream for Incoming<'_> {
	type Item = Result<ConnectedStream, AcceptError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Option<Self::Item>> {
		let this = self.get_mut();
		let listener = this.listener;

		let pending = this.pending.get_or_insert_with(|| Box::pin(listener.accept()));

		match pending.as_mut().poll(cx) {
			task::Poll::Ready(result) => {
				this.pending = None;
				task::Poll::Ready(Some(result))
			}
			task::Poll::Pending => task::Poll::Pending,
		}
	}
}

/// A bound datagram socket, as issued by
/// [`DatagramSocketBuilder::bind`][crate::DatagramSocketBuilder::bind].
///
/// Can send to arbitrary peers and receives from any sender at its bound
/// local address.
#[derive(Debug)]
pub struct BoundDatagram {
	inner: tokio::net::UdpSocket,
}

impl BoundDatagram {
	pub(crate) fn from_bound(socket: Socket) -> io::Result<Self> {
		let socket: std::net::UdpSocket = socket.into();
		let inner = tokio::net::UdpSocket::from_std(socket)?;

		Ok(Self { inner })
	}

	/// Sends a datagram to `target`.
	pub async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
		self.inner.send_to(buf, target).await
	}

	/// Receives one datagram, returning its length and sender.
	pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
		self.inner.recv_from(buf).await
	}

	/// Returns the local address that this socket is bound to.
	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.inner.local_addr()
	}
}

impl TryFrom<BoundDatagram> for Socket {
	type Error = io::Error;

	fn try_from(socket: BoundDatagram) -> Result<Self, Self::Error> {
		socket.inner.into_std().map(Socket::from)
	}
}

#[cfg(not(windows))]
impl AsFd for BoundDatagram {
	fn as_fd(&self) -> BorrowedFd {
		self.inner.as_fd()
	}
}

#[cfg(not(windows))]
impl AsRawFd for BoundDatagram {
	fn as_raw_fd(&self) -> RawFd {
		self.inner.as_raw_fd()
	}
}

#[cfg(windows)]
impl AsRawSocket for BoundDatagram {
	fn as_raw_socket(&self) -> RawSocket {
		self.inner.as_raw_socket()
	}
}

/// A datagram socket fixed to one remote peer, as issued by
/// [`DatagramSocketBuilder::connect`][crate::DatagramSocketBuilder::connect].
///
/// Outbound datagrams go to the fixed peer; inbound datagrams from any other
/// sender are filtered out by the underlying transport and never delivered.
#[derive(Debug)]
pub struct ConnectedDatagram {
	inner: tokio::net::UdpSocket,
}

impl ConnectedDatagram {
	pub(crate) fn from_connected(socket: Socket) -> io::Result<Self> {
		let socket: std::net::UdpSocket = socket.into();
		let inner = tokio::net::UdpSocket::from_std(socket)?;

		Ok(Self { inner })
	}

	/// Sends a datagram to the fixed peer.
	pub async fn send(&self, buf: &[u8]) -> io::Result<usize> {
		self.inner.send(buf).await
	}

	/// Receives one datagram from the fixed peer.
	pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
		self.inner.recv(buf).await
	}

	/// Returns the local address that this socket is bound to.
	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.inner.local_addr()
	}

	/// Returns the fixed remote peer's address.
	pub fn peer_addr(&self) -> io::Result<SocketAddr> {
		self.inner.peer_addr()
	}
}

impl TryFrom<ConnectedDatagram> for Socket {
	type Error = io::Error;

	fn try_from(socket: ConnectedDatagram) -> Result<Self, Self::Error> {
		socket.inner.into_std().map(Socket::from)
	}
}

#[cfg(not(windows))]
impl AsFd for ConnectedDatagram {
	fn as_fd(&self) -> BorrowedFd {
		self.inner.as_fd()
	}
}

#[cfg(not(windows))]
impl AsRawFd for ConnectedDatagram {
	fn as_raw_fd(&self) -> RawFd {
		self.inner.as_raw_fd()
	}
}

#[cfg(windows)]
impl AsRawSocket for ConnectedDatagram {
	fn as_raw_socket(&self) -> RawSocket {
		self.inner.as_raw_socket()
	}
}

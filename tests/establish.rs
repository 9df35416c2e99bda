//! Scenario tests for the builder layer: establishment through the selector
//! boundary, cancellation hygiene, and datagram peer filtering.

#![cfg(unix)]

use asocket::{
	errors::SelectorError,
	open_socket,
	selector::{Interest, ReadySender, Selector, SubscriptionId, TokioSelector},
	Configurable,
};
use assert_matches::assert_matches;
use std::{
	io,
	net::{Ipv4Addr, SocketAddr},
	os::fd::RawFd,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
		Mutex,
	},
	time::Duration,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
	.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
	.try_init();
}

fn localhost() -> SocketAddr {
	SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)
}

/// Delegates to a real [`TokioSelector`] while counting the boundary calls,
/// so tests can assert that every registration is retired.
#[derive(Default)]
struct CountingSelector {
	inner: TokioSelector,
	registered: AtomicUsize,
	unregistered: AtomicUsize,
}

impl CountingSelector {
	fn counts(&self) -> (usize, usize) {
		(
			self.registered.load(Ordering::SeqCst),
			self.unregistered.load(Ordering::SeqCst),
		)
	}
}

impl Selector for CountingSelector {
	fn register(
		&self,
		socket: RawFd,
		interest: Interest,
		ready: ReadySender,
	) -> Result<SubscriptionId, SelectorError> {
		let id = self.inner.register(socket, interest, ready)?;
		self.registered.fetch_add(1, Ordering::SeqCst);
		Ok(id)
	}

	fn unregister(&self, subscription: SubscriptionId) {
		self.unregistered.fetch_add(1, Ordering::SeqCst);
		self.inner.unregister(subscription);
	}
}

/// Records registrations without ever reporting readiness on its own. The
/// held [`ReadySender`]s keep suspended tasks pending until a test fires one
/// by hand (or drops it).
#[derive(Default)]
struct ManualSelector {
	next_id: AtomicUsize,
	pending: Mutex<Vec<(SubscriptionId, Interest, ReadySender)>>,
	/// Every fd ever registered, surviving unregistration, so tests can
	/// probe handle lifecycle after cancellation.
	seen_fds: Mutex<Vec<RawFd>>,
	unregistered: AtomicUsize,
}

impl ManualSelector {
	fn registered(&self) -> usize {
		self.next_id.load(Ordering::SeqCst)
	}

	fn unregistered(&self) -> usize {
		self.unregistered.load(Ordering::SeqCst)
	}

	fn last_registered_fd(&self) -> RawFd {
		*self.seen_fds.lock().unwrap().last().unwrap()
	}

	/// Fires the oldest still-pending registration with its full interest
	/// set.
	fn fire_oldest(&self) {
		let (_, interest, ready) = self.pending.lock().unwrap().remove(0);
		let _ = ready.send(interest);
	}

	/// Drops every pending registration's channel, as a shutting-down
	/// selector would.
	fn drop_pending(&self) {
		self.pending.lock().unwrap().clear();
	}
}

impl Selector for ManualSelector {
	fn register(
		&self,
		socket: RawFd,
		interest: Interest,
		ready: ReadySender,
	) -> Result<SubscriptionId, SelectorError> {
		let id = SubscriptionId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst) as u64);
		self.pending.lock().unwrap().push((id, interest, ready));
		self.seen_fds.lock().unwrap().push(socket);
		Ok(id)
	}

	fn unregister(&self, subscription: SubscriptionId) {
		self.unregistered.fetch_add(1, Ordering::SeqCst);
		self.pending.lock().unwrap().retain(|(id, ..)| *id != subscription);
	}
}

#[tokio::test]
async fn stream_bind_allocates_an_ephemeral_port() {
	init_tracing();

	let listener = open_socket(Arc::new(TokioSelector::new()))
	.stream()
	.bind(None)
	.unwrap();

	let local = listener.local_addr().unwrap();
	assert_ne!(local.port(), 0);
}

#[tokio::test]
async fn refused_connect_surfaces_the_platform_error_and_balances_the_selector() {
	init_tracing();

	// Grab a loopback port that momentarily had a listener, then drop it so
	// nothing is listening there.
	let dead_port = {
		let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
		listener.local_addr().unwrap().port()
	};

	let selector = Arc::new(CountingSelector::default());

	let result = open_socket(selector.clone())
	.stream()
	.connect(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), dead_port))
	.await;

	let error = result.err().expect("connecting to a dead port must fail");
	let error = io::Error::from(error);
	assert_eq!(error.kind(), io::ErrorKind::ConnectionRefused);

	// However the refusal was delivered (synchronously or via readiness),
	// no selector registration may be leaked.
	let (registered, unregistered) = selector.counts();
	assert_eq!(registered, unregistered);
}

#[tokio::test]
async fn connect_and_accept_roundtrip() {
	init_tracing();

	let selector: Arc<dyn Selector> = Arc::new(TokioSelector::new());

	let listener = open_socket(selector.clone())
	.stream()
	.bind(Some(localhost()))
	.unwrap();
	let server_addr = listener.local_addr().unwrap();

	let server = tokio::spawn(async move {
		let mut accepted = listener.accept().await.unwrap();

		let mut greeting = [0u8; 5];
		accepted.read_exact(&mut greeting).await.unwrap();
		accepted.write_all(&greeting).await.unwrap();

		greeting
	});

	let mut connection = open_socket(selector)
	.stream()
	.configure(|options| options.send_buffer_size = 64 * 1024)
	.connect(server_addr)
	.await
	.unwrap();

	assert_eq!(connection.peer_addr().unwrap(), server_addr);

	connection.write_all(b"hello").await.unwrap();

	let mut echoed = [0u8; 5];
	connection.read_exact(&mut echoed).await.unwrap();
	assert_eq!(&echoed, b"hello");

	assert_eq!(&server.await.unwrap(), b"hello");
}

#[tokio::test]
async fn cancelled_connect_unregisters_and_closes_the_socket() {
	init_tracing();

	// A live listener guarantees the non-blocking connect goes through the
	// in-progress path; the manual selector then never resumes it.
	let target = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	let target_addr = target.local_addr().unwrap();

	let selector = Arc::new(ManualSelector::default());
	let stream = open_socket(selector.clone()).stream();

	let pending = stream.connect(target_addr);
	let cancelled = tokio::time::timeout(Duration::from_millis(100), pending).await;
	assert_matches!(cancelled, Err(_));

	assert_eq!(selector.registered(), 1);
	assert_eq!(selector.unregistered(), 1);

	// The partially created socket must be gone: probing its descriptor
	// reports EBADF.
	let fd = selector.last_registered_fd();
	let rc = unsafe { libc::fcntl(fd, libc::F_GETFD) };
	assert_eq!(rc, -1);
	assert_eq!(
		io::Error::last_os_error().raw_os_error(),
		Some(libc::EBADF),
	);
}

#[tokio::test]
async fn selector_side_cancellation_is_distinct_from_network_failure() {
	init_tracing();

	let target = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	let target_addr = target.local_addr().unwrap();

	let selector = Arc::new(ManualSelector::default());
	let stream = open_socket(selector.clone()).stream();

	let pending = stream.connect(target_addr);
	tokio::pin!(pending);

	// Drive the connect to its suspend point, then drop the registration's
	// sender from the selector side.
	let premature =
		tokio::time::timeout(Duration::from_millis(50), pending.as_mut()).await;
	assert_matches!(premature, Err(_));
	selector.drop_pending();

	let result = pending.await;
	assert_matches!(
		result,
		Err(asocket::errors::ConnectError::Selector(SelectorError::Cancelled))
	);
}

#[tokio::test]
async fn cancelled_accept_leaves_the_listener_usable() {
	init_tracing();

	let selector = Arc::new(ManualSelector::default());

	let listener = open_socket(selector.clone())
	.stream()
	.bind(Some(localhost()))
	.unwrap();
	let server_addr = listener.local_addr().unwrap();

	// First accept: suspend, then cancel.
	{
		let pending = listener.accept();
		let cancelled = tokio::time::timeout(Duration::from_millis(50), pending).await;
		assert_matches!(cancelled, Err(_));
	}
	assert_eq!(selector.registered(), 1);
	assert_eq!(selector.unregistered(), 1);

	// The listener is unaffected: a second accept suspends afresh, and once
	// a client connects and readiness is delivered by hand, it produces the
	// connection.
	let accept = listener.accept();
	tokio::pin!(accept);
	let premature = tokio::time::timeout(Duration::from_millis(50), accept.as_mut()).await;
	assert_matches!(premature, Err(_));
	assert_eq!(selector.registered(), 2);

	let client = std::net::TcpStream::connect(server_addr).unwrap();
	selector.fire_oldest();

	let accepted = accept.await.unwrap();
	assert_eq!(accepted.local_addr().unwrap(), server_addr);

	drop(client);
}

#[tokio::test]
async fn connected_datagram_filters_foreign_senders() {
	init_tracing();

	let builder = open_socket(Arc::new(TokioSelector::new()));

	// The fixed remote peer.
	let peer = builder.datagram().bind(Some(localhost())).unwrap();
	let peer_addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), peer.local_addr().unwrap().port());

	// The socket under test, fixed to that peer.
	let connected = builder
	.datagram()
	.connect(peer_addr, Some(localhost()))
	.unwrap();
	let connected_addr =
		SocketAddr::new(Ipv4Addr::LOCALHOST.into(), connected.local_addr().unwrap().port());

	// An unrelated third sender.
	let intruder = builder.datagram().bind(Some(localhost())).unwrap();

	intruder.send_to(b"intruder", connected_addr).await.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;
	peer.send_to(b"legit", connected_addr).await.unwrap();

	// Only the fixed peer's datagram is delivered, regardless of arrival
	// order.
	let mut buf = [0u8; 16];
	let len = connected.recv(&mut buf).await.unwrap();
	assert_eq!(&buf[..len], b"legit");

	// And nothing else ever is.
	let nothing =
		tokio::time::timeout(Duration::from_millis(100), connected.recv(&mut buf)).await;
	assert_matches!(nothing, Err(_));
}

#[tokio::test]
async fn bound_datagram_receives_from_any_sender() {
	init_tracing();

	let builder = open_socket(Arc::new(TokioSelector::new()));

	let bound = builder.datagram().bind(Some(localhost())).unwrap();
	let bound_addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), bound.local_addr().unwrap().port());

	let sender_a = builder.datagram().bind(Some(localhost())).unwrap();
	let sender_b = builder.datagram().bind(Some(localhost())).unwrap();

	sender_a.send_to(b"from a", bound_addr).await.unwrap();
	sender_b.send_to(b"from b", bound_addr).await.unwrap();

	let mut buf = [0u8; 16];
	let mut seen = Vec::new();
	for _ in 0..2 {
		let (len, _) = bound.recv_from(&mut buf).await.unwrap();
		seen.push(buf[..len].to_vec());
	}
	seen.sort();

	assert_eq!(seen, vec![b"from a".to_vec(), b"from b".to_vec()]);
}

use crate::{
	errors::SelectorError,
	selector::{Interest, ReadySender, Selector, SubscriptionId},
	sys,
};
use std::{
	collections::HashMap,
	io,
	os::fd::{AsRawFd, RawFd},
	sync::{
		atomic::{AtomicU64, Ordering},
		Mutex,
		PoisonError,
	},
};
use tokio::{
	io::unix::AsyncFd,
	task::AbortHandle,
};

/// A [`Selector`] backed by the tokio reactor.
///
/// Each registration wraps the raw socket in an [`AsyncFd`] and spawns a
/// small watch task that suspends on the requested interest and fires the
/// readiness channel once. Unregistering aborts the watch; dropping the
/// selector aborts every watch still pending, which surfaces to suspended
/// tasks as [`SelectorError::Cancelled`].
///
/// The watched socket must stay open for as long as its registration is
/// live. The suspending operations in this crate guarantee that by owning
/// the socket across the suspend point.
///
/// # Availability
///
/// Unix-like platforms only, since the tokio reactor exposes foreign file
/// descriptors through `AsyncFd`.
#[derive(Debug, Default)]
pub struct TokioSelector {
	next_id: AtomicU64,
	watches: Mutex<HashMap<SubscriptionId, AbortHandle>>,
}

impl TokioSelector {
	/// Creates a selector. Must be used from within a tokio runtime.
	pub fn new() -> Self {
		Self::default()
	}

	fn watches(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, AbortHandle>> {
		self.watches.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// `AsyncFd` wants ownership of something fd-like; the registration only
/// borrows the caller's socket, so wrap the raw descriptor without taking
/// over its lifetime.
#[derive(Debug)]
struct Watched(RawFd);

impl AsRawFd for Watched {
	fn as_raw_fd(&self) -> RawFd {
		self.0
	}
}

fn runtime_interest(interest: Interest) -> io::Result<tokio::io::Interest> {
	let readable = interest.intersects(Interest::READABLE | Interest::ACCEPTABLE);
	let writable = interest.intersects(Interest::WRITABLE | Interest::CONNECTABLE);

	match (readable, writable) {
		(true, true) => Ok(tokio::io::Interest::READABLE | tokio::io::Interest::WRITABLE),
		(true, false) => Ok(tokio::io::Interest::READABLE),
		(false, true) => Ok(tokio::io::Interest::WRITABLE),
		(false, false) => Err(io::Error::new(
			io::ErrorKind::InvalidInput,
			"empty interest set",
		)),
	}
}

impl Selector for TokioSelector {
	fn register(
		&self,
		socket: sys::RawSocket,
		interest: Interest,
		ready: ReadySender,
	) -> Result<SubscriptionId, SelectorError> {
		let reactor_interest =
			runtime_interest(interest)
			.map_err(|error| SelectorError::Register { error })?;

		let async_fd =
			AsyncFd::with_interest(Watched(socket), reactor_interest)
			.map_err(|error| SelectorError::Register { error })?;

		let id = SubscriptionId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));

		let watch = tokio::spawn(async move {
			match async_fd.ready(reactor_interest).await {
				Ok(guard) => {
					let ready_set = guard.ready();
					let mut readiness = Interest::empty();

					if ready_set.is_readable() || ready_set.is_read_closed() {
						readiness |= interest & (Interest::READABLE | Interest::ACCEPTABLE);
					}
					if ready_set.is_writable() || ready_set.is_write_closed() {
						readiness |= interest & (Interest::WRITABLE | Interest::CONNECTABLE);
					}
					if readiness.is_empty() {
						readiness = interest;
					}

					let _ = ready.send(readiness);
				}
				Err(error) => {
					// Dropping `ready` reports the failed watch as a
					// cancellation to the suspended task.
					tracing::debug!(socket, %error, "readiness watch failed");
				}
			}
		});

		self.watches().insert(id, watch.abort_handle());

		tracing::trace!(socket, subscription = %id, ?interest, "registered with tokio reactor");

		Ok(id)
	}

	fn unregister(&self, subscription: SubscriptionId) {
		if let Some(watch) = self.watches().remove(&subscription) {
			watch.abort();
			tracing::trace!(%subscription, "unregistered");
		}
	}
}

impl Drop for TokioSelector {
	fn drop(&mut self) {
		for (_, watch) in self.watches().drain() {
			watch.abort();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use assert_matches::assert_matches;
	use std::os::unix::net::UnixStream;

	#[tokio::test]
	async fn writable_pair_becomes_ready() {
		let selector = TokioSelector::new();
		let (left, _right) = UnixStream::pair().unwrap();
		left.set_nonblocking(true).unwrap();

		let (ready_tx, ready_rx) = ::tokio::sync::oneshot::channel();
		let id = selector
		.register(left.as_raw_fd(), Interest::WRITABLE, ready_tx)
		.unwrap();

		let readiness = ready_rx.await.unwrap();
		assert!(readiness.contains(Interest::WRITABLE));

		selector.unregister(id);
	}

	#[tokio::test]
	async fn unregister_before_ready_cancels() {
		let selector = TokioSelector::new();
		let (left, _right) = UnixStream::pair().unwrap();
		left.set_nonblocking(true).unwrap();

		// Nothing is written to the pair, so READABLE never fires.
		let (ready_tx, ready_rx) = ::tokio::sync::oneshot::channel();
		let id = selector
		.register(left.as_raw_fd(), Interest::READABLE, ready_tx)
		.unwrap();

		selector.unregister(id);

		assert_matches!(ready_rx.await, Err(_));
	}

	#[tokio::test]
	async fn empty_interest_is_rejected() {
		let selector = TokioSelector::new();
		let (left, _right) = UnixStream::pair().unwrap();

		let (ready_tx, _ready_rx) = ::tokio::sync::oneshot::channel();
		let result = selector.register(left.as_raw_fd(), Interest::empty(), ready_tx);

		assert_matches!(result, Err(SelectorError::Register { .. }));
	}
}

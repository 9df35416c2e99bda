//! The integration boundary between the builders and the external readiness
//! engine.
//!
//! The builders in this crate never poll for readiness themselves. Whenever a
//! suspending operation (stream connect, listener accept) needs to wait for a
//! socket to become ready, it registers the socket and an interest set with a
//! [`Selector`], hands over the sending half of a readiness event channel,
//! and suspends on the receiving half. The selector, which is the
//! external readiness-multiplexing engine, fires the channel when the
//! interest is ready, or drops it to signal cancellation.
//!
//! The boundary is deliberately narrow: register, deliver readiness,
//! unregister. Timer wheels, thread pools, and the polling loop itself are
//! the selector's own business.

use crate::{
	errors::SelectorError,
	sys,
};
use cfg_if::cfg_if;
use std::fmt;

cfg_if! {
	if #[cfg(unix)] {
		mod tokio;
		pub use self::tokio::TokioSelector;
	}
}

bitflags::bitflags! {
	/// The readiness interests a socket can be registered for.
	///
	/// `CONNECTABLE` and `ACCEPTABLE` exist so that registrations state what
	/// the caller is actually waiting for; selectors backed by engines that
	/// only know readable/writable (epoll, kqueue) are expected to map
	/// `CONNECTABLE` to writable and `ACCEPTABLE` to readable.
	#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
	pub struct Interest: u8 {
		/// The socket has data to read.
		const READABLE = 1 << 0;

		/// The socket can accept more outgoing data.
		const WRITABLE = 1 << 1;

		/// A listening socket has a pending inbound connection.
		const ACCEPTABLE = 1 << 2;

		/// An in-progress outbound connect has finished, successfully or
		/// not.
		const CONNECTABLE = 1 << 3;
	}
}

/// Identifies one registration with a [`Selector`], for the purpose of
/// unregistering it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
	/// Wraps a raw identifier. Selector implementations allocate these
	/// however they like; the only requirement is uniqueness among the
	/// selector's live registrations.
	pub const fn from_raw(id: u64) -> Self {
		Self(id)
	}

	/// The raw identifier.
	pub const fn as_raw(self) -> u64 {
		self.0
	}
}

impl fmt::Display for SubscriptionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

/// The sending half of a readiness event channel, handed to the selector at
/// registration time.
///
/// The selector fires it at most once, with the subset of the registered
/// interest that became ready. Dropping it without sending tells the
/// suspended task that the registration was cancelled on the selector's
/// side.
pub type ReadySender = ::tokio::sync::oneshot::Sender<Interest>;

/// The readiness-multiplexer boundary.
///
/// This is everything the builders require from the asynchronous engine.
/// Implementations must be safe to call from any task.
///
/// # Contract
///
/// * [`register`][Self::register] associates a native socket and an interest
///   set with the `ready` channel and returns a [`SubscriptionId`]. The
///   selector sends on the channel once the interest is ready; if the
///   selector shuts down first, it drops the channel instead.
/// * [`unregister`][Self::unregister] retires a registration. This crate
///   calls it exactly once for every successful `register`, on every exit
///   path (completion, failure, and cancellation alike), so implementations
///   may treat an unknown or already-fired id as a no-op.
pub trait Selector: Send + Sync {
	/// Registers `socket` for `interest`, delivering readiness on `ready`.
	fn register(
		&self,
		socket: sys::RawSocket,
		interest: Interest,
		ready: ReadySender,
	) -> Result<SubscriptionId, SelectorError>;

	/// Retires the registration identified by `subscription`.
	fn unregister(&self, subscription: SubscriptionId);
}

/// Unregisters a subscription when dropped, making the suspend points below
/// cancellation-safe: whether the enclosing future completes, fails, or is
/// dropped mid-wait, the registration is retired exactly once.
struct UnregisterGuard<'a> {
	selector: &'a dyn Selector,
	subscription: SubscriptionId,
}

impl Drop for UnregisterGuard<'_> {
	fn drop(&mut self) {
		self.selector.unregister(self.subscription);
	}
}

/// Suspends the calling task until `socket` is ready for `interest`.
///
/// Returns the ready subset reported by the selector, or
/// [`SelectorError::Cancelled`] if the selector dropped the subscription
/// before it became ready.
pub(crate) async fn wait_for_ready(
	selector: &dyn Selector,
	socket: sys::RawSocket,
	interest: Interest,
) -> Result<Interest, SelectorError> {
	let (ready_tx, ready_rx) = ::tokio::sync::oneshot::channel();

	let subscription = selector.register(socket, interest, ready_tx)?;
	let _guard = UnregisterGuard {
		selector,
		subscription,
	};

	tracing::trace!(%subscription, ?interest, "suspending until ready");

	let readiness = ready_rx.await.map_err(|_| SelectorError::Cancelled)?;

	tracing::trace!(%subscription, ?readiness, "readiness delivered");

	Ok(readiness)
}

#[cfg(test)]
mod tests {
	// `super::*` would also pull in the `tokio` submodule and make the
	// `tokio` crate name ambiguous here, so import explicitly.
	use super::{wait_for_ready, Interest, ReadySender, Selector, SubscriptionId};
	use crate::{
		errors::SelectorError,
		sys,
	};
	use assert_matches::assert_matches;
	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		Mutex,
	};

	/// Records registrations and lets the test decide when (and whether) to
	/// fire them.
	#[derive(Default)]
	struct ScriptedSelector {
		pending: Mutex<Vec<(SubscriptionId, Interest, ReadySender)>>,
		registered: AtomicUsize,
		unregistered: AtomicUsize,
	}

	impl Selector for ScriptedSelector {
		fn register(
			&self,
			_socket: sys::RawSocket,
			interest: Interest,
			ready: ReadySender,
		) -> Result<SubscriptionId, SelectorError> {
			let id = SubscriptionId::from_raw(self.registered.fetch_add(1, Ordering::SeqCst) as u64);
			self.pending.lock().unwrap().push((id, interest, ready));
			Ok(id)
		}

		fn unregister(&self, _subscription: SubscriptionId) {
			self.unregistered.fetch_add(1, Ordering::SeqCst);
		}
	}

	#[tokio::test]
	async fn readiness_resumes_the_task() {
		let selector = ScriptedSelector::default();

		let wait = wait_for_ready(&selector, 0, Interest::CONNECTABLE);
		::tokio::pin!(wait);

		// Not ready yet: the future must stay pending.
		assert!(futures_poll_once(wait.as_mut()).await.is_none());

		let (_, interest, ready) = selector.pending.lock().unwrap().pop().unwrap();
		assert_eq!(interest, Interest::CONNECTABLE);
		ready.send(Interest::CONNECTABLE).unwrap();

		assert_matches!(wait.await, Ok(Interest::CONNECTABLE));
		assert_eq!(selector.registered.load(Ordering::SeqCst), 1);
		assert_eq!(selector.unregistered.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn dropped_sender_surfaces_as_cancelled() {
		let selector = ScriptedSelector::default();

		let wait = wait_for_ready(&selector, 0, Interest::ACCEPTABLE);
		::tokio::pin!(wait);

		assert!(futures_poll_once(wait.as_mut()).await.is_none());
		selector.pending.lock().unwrap().clear();

		assert_matches!(wait.await, Err(SelectorError::Cancelled));
		assert_eq!(selector.unregistered.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn dropping_the_wait_unregisters() {
		let selector = ScriptedSelector::default();

		{
			let wait = wait_for_ready(&selector, 0, Interest::READABLE);
			::tokio::pin!(wait);
			assert!(futures_poll_once(wait.as_mut()).await.is_none());
		}

		assert_eq!(selector.registered.load(Ordering::SeqCst), 1);
		assert_eq!(selector.unregistered.load(Ordering::SeqCst), 1);
	}

	/// Polls `future` exactly once, returning its output if it completed.
	async fn futures_poll_once<F: std::future::Future + Unpin>(future: F) -> Option<F::Output> {
		use std::{
			future::Future,
			pin::Pin,
			task::Poll,
		};

		let mut future = future;

		std::future::poll_fn(move |cx| {
			match Pin::new(&mut future).poll(cx) {
				Poll::Ready(output) => Poll::Ready(Some(output)),
				Poll::Pending => Poll::Ready(None),
			}
		})
		.await
	}
}

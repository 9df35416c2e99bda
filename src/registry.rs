use std::{
	any::Any,
	collections::HashMap,
	fmt,
	marker::PhantomData,
	sync::Arc,
};

/// A typed key into [`CustomOptions`].
///
/// A key pairs a stable string identifier with the Rust type of the value
/// stored under it. Keys are intended to be declared as constants, one per
/// platform-specific or forward-compatible knob:
///
/// ```
/// use asocket::OptionKey;
///
/// /// Number of SYN retransmits before giving up (Linux `TCP_SYNCNT`).
/// pub const SYN_COUNT: OptionKey<u32> = OptionKey::new("tcp_syn_count");
/// ```
///
/// Two keys with the same name but different value types address different
/// entries as far as [`CustomOptions::get`] is concerned: a lookup only
/// succeeds when both the name and the stored type match.
pub struct OptionKey<T> {
	name: &'static str,
	_value: PhantomData<fn() -> T>,
}

impl<T> OptionKey<T> {
	/// Declares a key with the given stable identifier.
	pub const fn new(name: &'static str) -> Self {
		Self {
			name,
			_value: PhantomData,
		}
	}

	/// The key's stable identifier.
	pub const fn name(&self) -> &'static str {
		self.name
	}
}

impl<T> Clone for OptionKey<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for OptionKey<T> {}

impl<T> fmt::Debug for OptionKey<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("OptionKey").field(&self.name).finish()
	}
}

/// An open-ended registry of custom socket options, carried by every option
/// value in this crate.
///
/// Entries are addressed through typed [`OptionKey`]s, so values come back
/// out with their concrete type rather than as a type-erased blob.
///
/// Cloning a `CustomOptions` produces a structurally independent registry:
/// inserting, replacing, or removing an entry in the clone never affects the
/// original. This is what makes the copy-on-write protocol of the builders
/// sound for custom options as well as for the built-in fields.
#[derive(Clone, Default)]
pub struct CustomOptions {
	entries: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl CustomOptions {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `value` under `key`, replacing any previous entry with the
	/// same name.
	pub fn set<T: Any + Send + Sync>(&mut self, key: OptionKey<T>, value: T) {
		self.entries.insert(key.name, Arc::new(value));
	}

	/// Looks up the value stored under `key`.
	///
	/// Returns `None` if no entry with that name exists, or if the entry was
	/// stored under a key of the same name but a different value type.
	pub fn get<T: Any + Send + Sync>(&self, key: OptionKey<T>) -> Option<&T> {
		self.entries
		.get(key.name)
		.and_then(|value| value.downcast_ref())
	}

	/// Removes the entry stored under `key`, if any. Returns whether an
	/// entry was removed.
	///
	/// The entry is removed by name regardless of its stored type.
	pub fn remove<T>(&mut self, key: OptionKey<T>) -> bool {
		self.entries.remove(key.name).is_some()
	}

	/// Whether an entry with the key's name exists, regardless of its type.
	pub fn contains<T>(&self, key: OptionKey<T>) -> bool {
		self.entries.contains_key(key.name)
	}

	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the registry is empty.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for CustomOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// Values are type-erased; only the identifiers are meaningful here.
		f.debug_set().entries(self.entries.keys()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const RETRIES: OptionKey<u32> = OptionKey::new("retries");
	const LABEL: OptionKey<String> = OptionKey::new("label");

	#[test]
	fn typed_roundtrip() {
		let mut options = CustomOptions::new();
		options.set(RETRIES, 3);
		options.set(LABEL, "edge".to_owned());

		assert_eq!(options.get(RETRIES), Some(&3));
		assert_eq!(options.get(LABEL).map(String::as_str), Some("edge"));
		assert_eq!(options.len(), 2);
	}

	#[test]
	fn type_mismatch_is_invisible() {
		const RETRIES_AS_STRING: OptionKey<String> = OptionKey::new("retries");

		let mut options = CustomOptions::new();
		options.set(RETRIES, 3);

		assert_eq!(options.get(RETRIES_AS_STRING), None);
		assert!(options.contains(RETRIES_AS_STRING));
	}

	#[test]
	fn clone_is_structurally_independent() {
		let mut original = CustomOptions::new();
		original.set(RETRIES, 3);

		let mut copy = original.clone();
		copy.set(RETRIES, 7);
		assert_eq!(original.get(RETRIES), Some(&3));
		assert_eq!(copy.get(RETRIES), Some(&7));

		assert!(copy.remove(RETRIES));
		assert_eq!(original.get(RETRIES), Some(&3));
		assert!(copy.is_empty());
	}
}

/// Identifies one registration of an identifier. A handle that outlived its
/// entry carries a key that no longer matches, so its release is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey(u64);

impl EntryKey {
    pub(crate) fn next(counter: &mut u64) -> Self {
        *counter += 1;
        EntryKey(*counter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other references remain.
    Remaining(usize),
    /// The last reference was released; the owner must tear the value down.
    Last,
}

/// A value shared through explicit acquire/release, owned by a registry table.
#[derive(Debug)]
pub struct RefCounted<T> {
    value: T,
    count: usize,
    key: EntryKey,
}

impl<T> RefCounted<T> {
    /// Created holding one reference.
    pub(crate) fn new(value: T, key: EntryKey) -> Self {
        Self {
            value,
            count: 1,
            key,
        }
    }

    pub fn acquire(&mut self) -> &T {
        self.count += 1;
        &self.value
    }

    pub fn release(&mut self) -> Release {
        debug_assert!(self.count > 0, "released more references than were acquired");
        self.count = self.count.saturating_sub(1);
        match self.count {
            0 => Release::Last,
            remaining => Release::Remaining(remaining),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn key(&self) -> EntryKey {
        self.key
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub(crate) fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let mut counter = 0;
        let mut counted = RefCounted::new("doc", EntryKey::next(&mut counter));
        assert_eq!(counted.count(), 1);

        assert_eq!(*counted.acquire(), "doc");
        assert_eq!(counted.count(), 2);

        assert_eq!(counted.release(), Release::Remaining(1));
        assert_eq!(counted.release(), Release::Last);
        assert_eq!(counted.count(), 0);
    }

    #[test]
    fn test_keys_are_unique() {
        let mut counter = 0;
        let first = EntryKey::next(&mut counter);
        let second = EntryKey::next(&mut counter);
        assert_ne!(first, second);
    }
}

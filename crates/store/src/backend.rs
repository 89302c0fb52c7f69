use crate::StoreResult;

/// Named storage for UTF-8 JSON documents.
///
/// Each call is independent; nothing here groups calls into a transaction,
/// so a sequence like rename-then-put can interleave with other callers.
pub trait SlotBackend {
    /// Contents of `name`, or `None` when it doesn't exist.
    fn get(&self, name: &str) -> StoreResult<Option<String>>;

    /// Writes `contents` to `name`, replacing whatever was there.
    fn put(&self, name: &str, contents: &str) -> StoreResult<()>;

    fn exists(&self, name: &str) -> StoreResult<bool>;

    /// Every stored name starting with `prefix`.
    fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Moves `from` to `to`. Fails when `from` doesn't exist.
    fn rename(&self, from: &str, to: &str) -> StoreResult<()>;
}

impl<B: SlotBackend + ?Sized> SlotBackend for Box<B> {
    fn get(&self, name: &str) -> StoreResult<Option<String>> {
        (**self).get(name)
    }

    fn put(&self, name: &str, contents: &str) -> StoreResult<()> {
        (**self).put(name, contents)
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        (**self).exists(name)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        (**self).list(prefix)
    }

    fn rename(&self, from: &str, to: &str) -> StoreResult<()> {
        (**self).rename(from, to)
    }
}

//! Single-flight lazy initialization.

use tokio::sync::Mutex;

/// A lazily initialized slot.
///
/// `get_or_try_init` runs the initializer under the slot lock, so
/// concurrent first callers wait for the one in-flight attempt and reuse
/// its result instead of racing into duplicate builds. A failed attempt
/// leaves the slot empty, so a later caller may retry.
pub(crate) struct Slot<T> {
    cell: Mutex<Option<T>>,
}

impl<T: Clone> Slot<T> {
    pub(crate) fn new() -> Self {
        Self { cell: Mutex::new(None) }
    }

    /// Get the stored value, initializing it first if absent.
    pub(crate) async fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let mut guard = self.cell.lock().await;
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }

        let value = init()?;
        *guard = Some(value.clone());
        Ok(value)
    }

    /// The stored value, if initialized.
    pub(crate) async fn peek(&self) -> Option<T> {
        self.cell.lock().await.clone()
    }

    /// Empty the slot, returning what it held.
    pub(crate) async fn take(&self) -> Option<T> {
        self.cell.lock().await.take()
    }
}

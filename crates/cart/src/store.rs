//! Persistent storage for the cart.
//!
//! The cart lives in a single slot under [`CART_STORAGE_KEY`], serialized as
//! a JSON array of line items. The [`Cart`](crate::Cart) is the only writer;
//! every write replaces the whole collection.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use paperback_core::LineItem;
use thiserror::Error;
use tracing::warn;

/// Fixed key of the cart slot.
pub const CART_STORAGE_KEY: &str = "shopping_cart";

/// Errors that can occur when reading or writing the cart slot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The slot content is not a JSON array.
    #[error("Corrupt cart data: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A durable key-value slot holding the serialized cart.
///
/// Implementations are synchronous: the cart persists before returning from
/// every mutation.
pub trait CartStore: Send + Sync {
    /// Load the stored lines. A missing slot is an empty cart.
    ///
    /// # Errors
    ///
    /// Returns error if the slot cannot be read or is not a JSON array.
    fn load(&self) -> Result<Vec<LineItem>, StoreError>;

    /// Replace the stored lines.
    ///
    /// # Errors
    ///
    /// Returns error if the slot cannot be written.
    fn save(&self, items: &[LineItem]) -> Result<(), StoreError>;

    /// Remove the slot entirely.
    ///
    /// # Errors
    ///
    /// Returns error if the slot exists but cannot be removed.
    fn erase(&self) -> Result<(), StoreError>;
}

/// Decode a stored cart.
///
/// Entries that do not parse as a line item are skipped, as are lines with a
/// zero quantity. Unknown fields are ignored.
///
/// # Errors
///
/// Returns error if the document is not a JSON array.
pub fn decode_lines(json: &str) -> Result<Vec<LineItem>, StoreError> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(json)?;

    let items = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<LineItem>(value) {
            Ok(item) if item.quantity > 0 => Some(item),
            Ok(item) => {
                warn!(product_id = %item.product_id, "Dropping stored line with zero quantity");
                None
            }
            Err(e) => {
                warn!(index, error = %e, "Skipping unreadable stored cart line");
                None
            }
        })
        .collect();

    Ok(items)
}

// =============================================================================
// FileStore
// =============================================================================

/// Stores the cart as `<dir>/shopping_cart.json`.
///
/// Writes go to a temporary file that is renamed over the slot, so a crash
/// mid-write leaves the previous cart intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{CART_STORAGE_KEY}.json")),
        }
    }

    /// Path of the slot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CartStore for FileStore {
    fn load(&self) -> Result<Vec<LineItem>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => decode_lines(&json),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, items: &[LineItem]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string(items)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn erase(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-process store that keeps the serialized slot in memory.
///
/// Useful for tests and for sessions that must not touch the disk. The slot
/// still goes through JSON so it behaves like the file store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose slot already holds `json`.
    #[must_use]
    pub fn with_contents(json: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(json.into())),
        }
    }

    /// Raw slot content, if any.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CartStore for MemoryStore {
    fn load(&self) -> Result<Vec<LineItem>, StoreError> {
        self.contents()
            .map_or_else(|| Ok(Vec::new()), |json| decode_lines(&json))
    }

    fn save(&self, items: &[LineItem]) -> Result<(), StoreError> {
        let json = serde_json::to_string(items)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(json);
        Ok(())
    }

    fn erase(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

impl<S: CartStore + ?Sized> CartStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Vec<LineItem>, StoreError> {
        (**self).load()
    }

    fn save(&self, items: &[LineItem]) -> Result<(), StoreError> {
        (**self).save(items)
    }

    fn erase(&self) -> Result<(), StoreError> {
        (**self).erase()
    }
}

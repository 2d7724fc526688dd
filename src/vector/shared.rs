//! Thread-safe handle for publishing a built index to concurrent readers.
//!
//! Readers take an `Arc` snapshot under a short read lock and search without
//! holding it. A rebuild happens off to the side and is swapped in under the
//! write lock, so no query ever observes a half-built index.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::vector::ivf::IvfIndex;
use crate::vector::types::{IndexState, VectorError};

#[derive(Clone, Default)]
pub struct SharedIndex {
    inner: Arc<RwLock<Option<Arc<IvfIndex>>>>,
}

impl SharedIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces the published index.
    ///
    /// # Errors
    /// Returns `IndexNotBuilt` if `index` is not `Ready`; the previously
    /// published index stays in place.
    pub fn publish(&self, index: IvfIndex) -> Result<(), VectorError> {
        if index.state() != IndexState::Ready {
            return Err(VectorError::IndexNotBuilt {
                state: index.state(),
            });
        }
        let index = Arc::new(index);
        *self.inner.write() = Some(index);
        Ok(())
    }

    /// The currently published index, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<IvfIndex>> {
        self.inner.read().clone()
    }

    /// Withdraws the published index.
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl std::fmt::Debug for SharedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_read() {
            Some(guard) => match guard.as_ref() {
                Some(index) => write!(
                    f,
                    "SharedIndex {{ clusters: {}, vectors: {} }}",
                    index.num_clusters(),
                    index.len()
                ),
                None => write!(f, "SharedIndex {{ <empty> }}"),
            },
            None => write!(f, "SharedIndex {{ <locked> }}"),
        }
    }
}

//! Revocable handles to processed frames.
//!
//! A handle binds a downloaded image to a transient URI for as long as it is
//! alive. Handles are not `Clone`; releasing one consumes it and dropping one
//! releases it, so every exit path revokes the URI exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{error, trace};

use framefilter_ipc::OverlayRef;
use framefilter_transport::ProcessedImage;

/// Scheme prefix of handle URIs.
pub const HANDLE_URI_SCHEME: &str = "blob:framefilter/";

struct Entry {
    data: Bytes,
    content_type: String,
}

/// Store of live processed images, addressable by handle URI.
pub struct HandleRegistry {
    entries: Mutex<HashMap<u64, Entry>>,
    next_id: AtomicU64,
    minted: AtomicU64,
    released: AtomicU64,
}

impl HandleRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            minted: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    /// Bind a processed image to a new handle.
    pub fn mint(self: &Arc<Self>, image: ProcessedImage) -> ProcessedFrameHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let byte_len = image.data.len();
        let content_type = image.content_type;

        self.entries.lock().insert(
            id,
            Entry {
                data: image.data,
                content_type: content_type.clone(),
            },
        );
        self.minted.fetch_add(1, Ordering::Relaxed);
        trace!(id, byte_len, "Minted processed frame handle");

        ProcessedFrameHandle {
            id,
            uri: format!("{HANDLE_URI_SCHEME}{id}"),
            content_type,
            byte_len,
            registry: Arc::clone(self),
        }
    }

    /// Look up the image behind a live URI.
    pub fn resolve(&self, uri: &str) -> Option<(Bytes, String)> {
        let id = uri.strip_prefix(HANDLE_URI_SCHEME)?.parse::<u64>().ok()?;
        self.entries
            .lock()
            .get(&id)
            .map(|entry| (entry.data.clone(), entry.content_type.clone()))
    }

    /// Handles minted and not yet released.
    pub fn outstanding(&self) -> usize {
        self.entries.lock().len()
    }

    /// Total handles ever minted.
    pub fn minted_count(&self) -> u64 {
        self.minted.load(Ordering::Relaxed)
    }

    /// Total handles released.
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    fn revoke(&self, id: u64) -> bool {
        let removed = self.entries.lock().remove(&id).is_some();
        if removed {
            self.released.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }
}

/// Exclusive, revocable reference to one displayable processed image.
pub struct ProcessedFrameHandle {
    id: u64,
    uri: String,
    content_type: String,
    byte_len: usize,
    registry: Arc<HandleRegistry>,
}

impl ProcessedFrameHandle {
    /// Registry identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Transient URI the image is reachable under.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Image bytes. Always present while the handle exists.
    pub fn data(&self) -> Bytes {
        self.registry
            .resolve(&self.uri)
            .map(|(data, _)| data)
            .unwrap_or_default()
    }

    /// Serializable description for events.
    pub fn descriptor(&self) -> OverlayRef {
        OverlayRef {
            id: self.id,
            uri: self.uri.clone(),
            content_type: self.content_type.clone(),
            byte_len: self.byte_len,
        }
    }

    /// Revoke the URI and free the image.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ProcessedFrameHandle {
    fn drop(&mut self) {
        if self.registry.revoke(self.id) {
            trace!(id = self.id, "Released processed frame handle");
        } else {
            error!(id = self.id, "Processed frame handle released twice");
        }
    }
}

impl fmt::Debug for ProcessedFrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedFrameHandle")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("content_type", &self.content_type)
            .field("byte_len", &self.byte_len)
            .finish()
    }
}

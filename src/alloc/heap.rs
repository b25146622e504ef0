//! `ManagedHeap` - the default managed allocator.
//!
//! Objects are reference-counted individually; the heap itself only keeps the
//! books (how many objects and arrays it minted and how many bytes of payload
//! they carry) and enforces an optional ceiling on the number of objects.

use super::allocator::{AllocError, ManagedAlloc};
use crate::ptr::{ManagedArray, ManagedPtr};
use core::sync::atomic::{AtomicU64, Ordering};
use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Heap configuration.
///
/// Loadable from JSON; every field has a default.
///
/// ```rust
/// use isoctx::alloc::HeapConfig;
///
/// let cfg = HeapConfig::from_json(r#"{ "max_objects": 1000 }"#).unwrap();
/// assert_eq!(cfg.max_objects, Some(1000));
/// assert_eq!(HeapConfig::from_json("{}").unwrap(), HeapConfig::default());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeapConfig {
    /// Maximum number of objects (arrays included) the heap will mint.
    /// `None` means unlimited.
    pub max_objects: Option<u64>,
}

impl HeapConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    /// Returns the `serde_json` error for malformed input or unknown fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Counters reported by [`ManagedHeap::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    /// Objects minted, arrays included.
    pub objects: u64,
    /// Arrays minted.
    pub arrays: u64,
    /// Payload bytes minted (inline size of each object; array element storage included).
    pub bytes: u64,
}

/// The default managed allocator.
#[derive(Debug, Default)]
pub struct ManagedHeap {
    config: HeapConfig,
    objects: CachePadded<AtomicU64>,
    arrays: CachePadded<AtomicU64>,
    bytes: CachePadded<AtomicU64>,
}

impl ManagedHeap {
    /// A heap with the default (unlimited) configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// A heap with the given configuration.
    pub fn with_config(config: HeapConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The process-wide default heap.
    pub fn global() -> &'static ManagedHeap {
        static GLOBAL: OnceLock<ManagedHeap> = OnceLock::new();
        GLOBAL.get_or_init(ManagedHeap::new)
    }

    /// The heap's configuration.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// A snapshot of the heap's counters.
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            objects: self.objects.load(Ordering::Relaxed),
            arrays: self.arrays.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }

    fn reserve(&self, bytes: usize) -> Result<(), AllocError> {
        let limit = self.config.max_objects;
        self.objects
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match limit {
                Some(max) if n >= max => None,
                _ => Some(n + 1),
            })
            .map_err(|_| {
                let limit = limit.unwrap_or(u64::MAX);
                tracing::warn!(limit, "managed heap refused allocation");
                AllocError::Exhausted { limit }
            })?;
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        Ok(())
    }
}

impl ManagedAlloc for ManagedHeap {
    fn alloc<T: Send + Sync + 'static>(&self, value: T) -> Result<ManagedPtr<T>, AllocError> {
        self.reserve(core::mem::size_of::<T>())?;
        Ok(ManagedPtr::from_shared(Arc::new(value)))
    }

    fn alloc_array<T: Send + Sync + 'static>(
        &self,
        elems: Vec<T>,
    ) -> Result<ManagedPtr<ManagedArray<T>>, AllocError> {
        let payload = core::mem::size_of::<ManagedArray<T>>() + core::mem::size_of_val(elems.as_slice());
        self.reserve(payload)?;
        self.arrays.fetch_add(1, Ordering::Relaxed);
        Ok(ManagedPtr::from_shared(Arc::new(ManagedArray::from_vec(elems))))
    }
}

impl<A: ManagedAlloc> ManagedAlloc for &A {
    fn alloc<T: Send + Sync + 'static>(&self, value: T) -> Result<ManagedPtr<T>, AllocError> {
        (**self).alloc(value)
    }

    fn alloc_array<T: Send + Sync + 'static>(
        &self,
        elems: Vec<T>,
    ) -> Result<ManagedPtr<ManagedArray<T>>, AllocError> {
        (**self).alloc_array(elems)
    }
}

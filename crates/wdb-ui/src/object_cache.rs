use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use wdb_runtime::{CapturedException, ObjectId, Value};

/// Opaque integer naming a cached object on the wire (`href="7"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectHandle {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CachedObject {
    Value(Value),
    Exception(CapturedException),
}

#[derive(Default)]
struct Inner {
    next_handle: u64,
    identity_to_handle: HashMap<ObjectId, ObjectHandle>,
    entries: HashMap<ObjectHandle, CachedObject>,
}

impl Inner {
    fn allocate(&mut self, object: CachedObject) -> ObjectHandle {
        self.next_handle += 1;
        let handle = ObjectHandle(self.next_handle);
        self.entries.insert(handle, object);
        handle
    }
}

/// Handle → object map shared by every session of a debugger.
///
/// Entries are never evicted: a handle printed to the front-end stays valid for
/// the lifetime of the cache. Reference objects are keyed by runtime identity,
/// so the same object always maps to the same handle.
#[derive(Clone, Default)]
pub struct ObjectCache {
    inner: Arc<Mutex<Inner>>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_value(&self, value: &Value) -> ObjectHandle {
        let mut inner = self.inner.lock();
        match value.identity() {
            Some(identity) => {
                if let Some(handle) = inner.identity_to_handle.get(&identity).copied() {
                    return handle;
                }
                let handle = inner.allocate(CachedObject::Value(value.clone()));
                inner.identity_to_handle.insert(identity, handle);
                handle
            }
            None => inner.allocate(CachedObject::Value(value.clone())),
        }
    }

    /// Every capture gets a fresh handle.
    pub fn track_exception(&self, exception: CapturedException) -> ObjectHandle {
        self.inner
            .lock()
            .allocate(CachedObject::Exception(exception))
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<CachedObject> {
        self.inner.lock().entries.get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

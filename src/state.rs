//! Dialog state values
//!
//! Dialogs see their state as a concrete `&mut D::State`. Everything between
//! the dispatcher and the dialog (interceptors, switches) carries it as a
//! [`BoundState`], which owns the value and remembers how to encode it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::{self, Any};
use std::fmt;

/// Bounds every dialog state type must satisfy
pub trait DialogState: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {}

impl<T> DialogState for T where T: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {}

trait ErasedState: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn encode(&self) -> serde_json::Result<Vec<u8>>;
    fn to_value(&self) -> serde_json::Result<Value>;
    fn type_name(&self) -> &'static str;
    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: DialogState> ErasedState for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }

    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Type-erased, owned state of one dialog invocation
pub struct BoundState {
    inner: Box<dyn ErasedState>,
}

impl BoundState {
    pub fn new<T: DialogState>(value: T) -> Self {
        Self {
            inner: Box::new(value),
        }
    }

    /// Decode a stored blob. An empty blob is an error like any other
    /// malformed record.
    pub(crate) fn decode<T: DialogState>(raw: &[u8]) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::from_slice::<T>(raw)?))
    }

    pub fn is<T: DialogState>(&self) -> bool {
        self.inner.as_any().is::<T>()
    }

    pub fn downcast_ref<T: DialogState>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: DialogState>(&mut self) -> Option<&mut T> {
        self.inner.as_any_mut().downcast_mut()
    }

    /// Canonical byte encoding, used for persistence and change detection
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        self.inner.encode()
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        self.inner.to_value()
    }

    /// Rust type name of the carried value
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }
}

impl fmt::Debug for BoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.debug(f)
    }
}

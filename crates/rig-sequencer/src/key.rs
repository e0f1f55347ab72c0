//! Load names

use serde::{Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Name of a load operation and of the state it produces
///
/// Cheap to clone; compares by content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadKey(Arc<str>);

impl LoadKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Key text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LoadKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LoadKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LoadKey {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&LoadKey> for LoadKey {
    fn from(key: &LoadKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for LoadKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for LoadKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

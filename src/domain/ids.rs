//! Identifier newtypes
//!
//! Host objects are referenced through opaque numeric handles. The newtypes
//! keep image handles and item handles from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a host image (document)
///
/// # Examples
///
/// ```
/// use batcher::domain::ids::ImageId;
///
/// let image = ImageId::new(3);
/// assert_eq!(image.get(), 3);
/// assert_eq!(image.to_string(), "image#3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(u64);

impl ImageId {
    /// Creates an image handle from a raw host value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw host value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image#{}", self.0)
    }
}

/// Handle of a host item (layer or group layer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RawItemId(u64);

impl RawItemId {
    /// Creates an item handle from a raw host value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw host value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RawItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

impl From<RawItemId> for serde_json::Value {
    fn from(id: RawItemId) -> Self {
        serde_json::Value::from(id.0)
    }
}

/// Identifier of an action registered in an [`Invoker`](crate::core::invoker::Invoker)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub(crate) u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// Identifier of a rule or subfilter inside an
/// [`ObjectFilter`](crate::core::objectfilter::ObjectFilter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId(pub(crate) u64);

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display() {
        assert_eq!(ImageId::new(1).to_string(), "image#1");
        assert_eq!(RawItemId::new(7).to_string(), "item#7");
        assert_eq!(ActionId(2).to_string(), "action#2");
        assert_eq!(FilterId(5).to_string(), "filter#5");
    }

    #[test]
    fn test_raw_item_id_into_value() {
        let value: serde_json::Value = RawItemId::new(42).into();
        assert_eq!(value, serde_json::json!(42));
    }

    #[test]
    fn test_ids_serde_roundtrip() {
        let id = RawItemId::new(9);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "9");
        let back: RawItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

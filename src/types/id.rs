// ABOUTME: Phantom-typed identifiers for engine-assigned ids.
// ABOUTME: Keeps image ids and layer ids from being swapped at compile time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for phantom type parameters.
pub enum ImageMarker {}
pub enum LayerMarker {}

/// An engine-assigned identifier tagged with what it identifies.
///
/// An `ImageId` cannot be passed where a `LayerId` is expected:
///
/// ```compile_fail
/// use hoist::types::{ImageId, LayerId};
///
/// fn takes_layer(_id: LayerId) {}
///
/// takes_layer(ImageId::new("sha256:abc".to_string()));
/// ```
#[must_use = "ids reference engine resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: String) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }

    /// The short form the docker CLI prints: 12 hex chars without the algorithm.
    pub fn short(&self) -> &str {
        let hex = self
            .value
            .split_once(':')
            .map_or(self.value.as_str(), |(_, hex)| hex);
        hex.char_indices().nth(12).map_or(hex, |(i, _)| &hex[..i])
    }
}

// T is only a marker, so these impls must not require T: Trait.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

pub type ImageId = Id<ImageMarker>;
pub type LayerId = Id<LayerMarker>;

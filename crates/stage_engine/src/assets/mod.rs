//! Asset management system
//!
//! Content is fetched and decoded by an external [`AssetFetcher`]; the
//! [`AssetCache`] coalesces concurrent requests for one identifier, keeps the
//! decoded source around under a reference-count/threshold eviction policy,
//! and hands every caller an independently mutable clone.

pub mod cache;
pub mod content;
pub mod eviction;
pub mod fetch;

pub use cache::{AssetCache, AssetState, RetainedContent};
pub use content::{
    AlphaMode, AnimationClip, AnimationTrack, Geometry, Material, Mesh, NodeIndex, SceneGraphContent,
    SceneNode, Skin, TrackValues,
};
pub use eviction::CacheEvictionPolicy;
pub use fetch::{AssetFetcher, MemoryFetcher};

use std::fmt;
use thiserror::Error;

/// Source identifier (URL or path) of a piece of content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(String);

impl AssetId {
    /// Create an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&AssetId> for AssetId {
    fn from(id: &AssetId) -> Self {
        id.clone()
    }
}

/// Asset loading errors
///
/// Cloneable because every coalesced request for one identifier receives the
/// same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(AssetId),

    /// Network or disk failure
    #[error("Failed to fetch {url}: {reason}")]
    Fetch {
        /// Identifier being fetched
        url: AssetId,
        /// Failure description from the fetcher
        reason: String,
    },

    /// The fetched bytes could not be decoded
    #[error("Failed to parse {url}: {reason}")]
    Parse {
        /// Identifier being parsed
        url: AssetId,
        /// Failure description from the parser
        reason: String,
    },
}

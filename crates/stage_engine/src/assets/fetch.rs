//! Fetcher seam between the cache and the outside world
//!
//! Network or disk access and file-format parsing happen behind this trait.
//! The cache only ever sees decoded [`SceneGraphContent`].

use super::{AssetId, LoadError, SceneGraphContent};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::collections::HashMap;

/// Fetches and decodes content by identifier
pub trait AssetFetcher {
    /// Start fetching `id`
    ///
    /// Called at most once per cache miss; the cache coalesces duplicates.
    fn fetch(&self, id: &AssetId) -> LocalBoxFuture<'static, Result<SceneGraphContent, LoadError>>;
}

/// Fetcher serving pre-decoded content from memory
///
/// Resolves immediately; unknown identifiers fail with [`LoadError::NotFound`].
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    contents: HashMap<AssetId, SceneGraphContent>,
}

impl MemoryFetcher {
    /// Create an empty fetcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register content under `id`
    pub fn with_content(mut self, id: impl Into<AssetId>, content: SceneGraphContent) -> Self {
        self.contents.insert(id.into(), content);
        self
    }
}

impl AssetFetcher for MemoryFetcher {
    fn fetch(&self, id: &AssetId) -> LocalBoxFuture<'static, Result<SceneGraphContent, LoadError>> {
        let result = self
            .contents
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(id.clone()));
        futures::future::ready(result).boxed_local()
    }
}

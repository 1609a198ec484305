//! Source tree abstraction.
//!
//! A [`SourceTree`] enumerates the files under a root as a lazy stream of
//! [`RepoItem`]s and serves their content on demand. Implementations must
//! return stable hashes for unchanged content.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::models::RepoItem;

/// A remote (or local) tree of text files.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docsync_core::error::Result;
/// use docsync_core::models::RepoItem;
/// use docsync_core::source::SourceTree;
/// use futures::stream::{self, BoxStream, StreamExt};
///
/// struct Fixed(Vec<(RepoItem, String)>);
///
/// #[async_trait]
/// impl SourceTree for Fixed {
///     fn enumerate<'a>(&'a self, _root: &'a str) -> BoxStream<'a, Result<RepoItem>> {
///         stream::iter(self.0.iter().map(|(i, _)| Ok(i.clone()))).boxed()
///     }
///
///     async fn fetch_content(&self, _root: &str, relative_path: &str) -> Result<String> {
///         Ok(self.0.iter().find(|(i, _)| i.relative_path == relative_path)
///             .map(|(_, text)| text.clone())
///             .unwrap_or_default())
///     }
/// }
/// ```
#[async_trait]
pub trait SourceTree: Send + Sync {
    /// Walk `root` recursively. The stream is finite and single-use; any
    /// listing failure ends it with an error.
    fn enumerate<'a>(&'a self, root: &'a str) -> BoxStream<'a, Result<RepoItem>>;

    /// Fetch the text of one file, addressed relative to `root`.
    async fn fetch_content(&self, root: &str, relative_path: &str) -> Result<String>;
}

//! Feed collaborator interface.
//!
//! Applications that publish or consume RSS/Atom feeds plug an implementation
//! of [`FeedProvider`] in next to the router. waypost ships no implementation:
//! fetching and XML handling belong to the application's own HTTP stack.

use std::collections::BTreeMap;

use crate::error::WaypostResult;

/// A feed channel or item as flat tag/content pairs (`title`, `link`,
/// `pubDate`, ...).
pub type FeedItem = BTreeMap<String, String>;

/// Reads and writes syndication feeds.
pub trait FeedProvider: Send + Sync {
    /// Fetches the feed at `source` and returns its items.
    fn parse(&self, source: &str) -> WaypostResult<Vec<FeedItem>>;

    /// Renders a feed document for `channel` containing `items`.
    fn create(&self, channel: &FeedItem, items: &[FeedItem]) -> WaypostResult<String>;
}

//! External inbox seam.
//!
//! The retriever depends only on listing rows, opening a row, and reading the
//! rendered message. The message may land in one of several containers, so
//! reads are addressed by [`ContentContainer`].

use anyhow::Result;

use crate::core::extract::LinkCandidate;

/// Places a rendered message body may live in, tried in [`ContentContainer::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentContainer {
    /// HTML rendering frame.
    HtmlBody,
    /// Plain text rendering frame.
    TextBody,
    /// Frame addressed by name rather than id.
    NamedFrame,
    /// The whole inbox page, used as the last resort.
    Page,
}

impl ContentContainer {
    pub const ORDER: [ContentContainer; 4] = [
        ContentContainer::HtmlBody,
        ContentContainer::TextBody,
        ContentContainer::NamedFrame,
        ContentContainer::Page,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentContainer::HtmlBody => "html-body",
            ContentContainer::TextBody => "text-body",
            ContentContainer::NamedFrame => "named-frame",
            ContentContainer::Page => "page",
        }
    }
}

/// Read-only view of a public inbox.
///
/// None of these operations may delete or mark messages; the retriever relies
/// on polling being repeatable.
#[allow(async_fn_in_trait)]
pub trait Inbox {
    /// Navigate to the inbox of `identity`.
    async fn open(&self, identity: &str) -> Result<()>;

    /// Reload the current inbox listing.
    async fn refresh(&self) -> Result<()>;

    /// Visible text of each listing row, newest first.
    async fn entries(&self) -> Result<Vec<String>>;

    /// Open the row at `index` of the current listing.
    async fn open_entry(&self, index: usize) -> Result<()>;

    /// Text of the opened message in `container`, `None` when that container
    /// is not rendered.
    async fn read_content(&self, container: ContentContainer) -> Result<Option<String>>;

    /// Links rendered in `container`.
    async fn links(&self, container: ContentContainer) -> Result<Vec<LinkCandidate>>;

    /// Activate a link previously returned by [`Inbox::links`].
    async fn follow(&self, link: &LinkCandidate) -> Result<()>;
}

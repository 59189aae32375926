/// Best-effort extraction of a Record from one candidate element
use chrono::{DateTime, Utc};
use log::debug;

use crate::locate::Locators;
use crate::node::{PostNode, Walk};
use crate::normalize::clean_link;
use crate::record::Record;

pub type Clock = fn() -> DateTime<Utc>;

#[derive(Debug, Clone)]
pub struct Extractor {
    locators: Locators,
    clock: Clock,
    page_url: Option<String>,
}

impl Extractor {
    pub fn new(locators: Locators) -> Self {
        Extractor {
            locators,
            clock: Utc::now,
            page_url: None,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Base for resolving relative links.
    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    pub fn locators(&self) -> &Locators {
        &self.locators
    }

    /// Returns `None` when the candidate has no locatable author or content,
    /// which is the normal outcome for feed widgets that are not posts.
    /// Never mutates the candidate.
    pub fn extract<N: PostNode>(&self, candidate: &N) -> Option<Record> {
        let walk = Walk::new(candidate);
        let Some(author) = self.locators.author.locate(&walk) else {
            debug!("skipping <{}> candidate: no author", candidate.tag());
            return None;
        };
        let Some(content) = self.locators.content.locate(&walk) else {
            debug!("skipping post by {}: no content", author);
            return None;
        };

        let mut record = Record::new(&content, &author, (self.clock)())?;
        let base = self.page_url.as_deref();

        record.profile_link = self
            .locators
            .profile_link
            .locate(&walk)
            .and_then(|href| clean_link(&href, base))
            .unwrap_or_default();
        record.post_url = self
            .locators
            .post_url
            .locate(&walk)
            .and_then(|href| clean_link(&href, base));
        record.image_url = self
            .locators
            .image
            .locate(&walk)
            .and_then(|src| clean_link(&src, base));
        record.likes = self.locators.likes.locate_count(&walk);
        record.comments = self.locators.comments.locate_count(&walk);
        record.shares = self.locators.shares.locate_count(&walk);

        Some(record)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor::new(Locators::default())
    }
}

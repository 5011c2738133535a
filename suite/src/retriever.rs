//! Retrieval of out-of-band artifacts (one-time codes, reset links) from a
//! public inbox.
//!
//! Delivery is eventually consistent: the listing is polled in bounded rounds,
//! the newest matching row is opened, and the body is read from whichever
//! container renders it, with linear backoff between extraction attempts.
//! Nothing here deletes or marks messages, so retries are safe to repeat.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::core::extract::{
    DeliveryFilter, LinkCandidate, LinkQuery, LinkStrategy, extract_code, normalize_row, snippet,
};
use crate::io::config::RetrievalConfig;
use crate::io::inbox::{ContentContainer, Inbox};

const BODY_SNIPPET_CHARS: usize = 100;

/// A value extracted from a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncArtifact {
    pub identity: String,
    pub filter: DeliveryFilter,
    pub value: String,
    /// Listing round (1-based) in which the matching message was found.
    pub arrival_attempt: u32,
}

/// No matching message arrived within the polling budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryNotFoundError {
    pub identity: String,
    pub keywords: Vec<String>,
    pub attempts: u32,
    /// Distinct listing rows observed across all rounds, newest first.
    pub seen_subjects: Vec<String>,
}

impl fmt::Display for DeliveryNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no email for {} matching [{}] after {} attempts",
            self.identity,
            self.keywords.join(", "),
            self.attempts
        )?;
        if self.seen_subjects.is_empty() {
            write!(f, "; inbox was empty")
        } else {
            write!(f, "; seen: {}", self.seen_subjects.join(" | "))
        }
    }
}

impl Error for DeliveryNotFoundError {}

/// A matching message was opened but no container yielded the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailedError {
    pub identity: String,
    pub artifact: &'static str,
    pub last_body: String,
}

impl fmt::Display for ExtractionFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} extraction failed for {}. Email body snippet: {:?}",
            self.artifact, self.identity, self.last_body
        )
    }
}

impl Error for ExtractionFailedError {}

/// Link that was followed, and how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowedLink {
    pub container: ContentContainer,
    pub strategy: LinkStrategy,
    pub link: LinkCandidate,
}

#[derive(Debug, Clone, Copy)]
struct Matched {
    index: usize,
    attempt: u32,
}

pub struct ArtifactRetriever<'a, I> {
    inbox: &'a I,
    config: &'a RetrievalConfig,
}

impl<'a, I: Inbox> ArtifactRetriever<'a, I> {
    pub fn new(inbox: &'a I, config: &'a RetrievalConfig) -> Self {
        Self { inbox, config }
    }

    /// Find the latest message matching `filter` and extract its six-digit code.
    #[instrument(skip(self, filter), fields(filter = %filter.describe()))]
    pub async fn retrieve_code(&self, identity: &str, filter: &DeliveryFilter) -> Result<AsyncArtifact> {
        let matched = self.find_latest(identity, filter).await?;
        let value = self.extract_code_with_retries(identity, matched.index).await?;
        info!(attempt = matched.attempt, "one-time code retrieved");
        Ok(AsyncArtifact {
            identity: identity.to_string(),
            filter: filter.clone(),
            value,
            arrival_attempt: matched.attempt,
        })
    }

    /// Find the latest message matching `filter` and follow the link selected by `query`.
    #[instrument(skip(self, filter, query), fields(filter = %filter.describe()))]
    pub async fn follow_link(
        &self,
        identity: &str,
        filter: &DeliveryFilter,
        query: &LinkQuery,
    ) -> Result<FollowedLink> {
        self.find_latest(identity, filter).await?;

        let mut last_body = String::new();
        for container in ContentContainer::ORDER {
            if container == ContentContainer::Page {
                warn!("link not found in message frames, checking page body");
            }
            let links = match self.inbox.links(container).await {
                Ok(links) => links,
                Err(err) => {
                    debug!(container = container.as_str(), err = %format!("{err:#}"), "links unavailable");
                    continue;
                }
            };
            if let Some((strategy, link)) = query.select(&links) {
                info!(
                    container = container.as_str(),
                    strategy = ?strategy,
                    href = link.href.as_deref().unwrap_or(""),
                    "following link"
                );
                self.inbox
                    .follow(link)
                    .await
                    .with_context(|| format!("follow link {:?} for {identity}", link.text))?;
                return Ok(FollowedLink {
                    container,
                    strategy,
                    link: link.clone(),
                });
            }
            if let Ok(Some(body)) = self.inbox.read_content(container).await {
                last_body = body;
            }
        }
        Err(ExtractionFailedError {
            identity: identity.to_string(),
            artifact: "link",
            last_body: snippet(&last_body, BODY_SNIPPET_CHARS),
        }
        .into())
    }

    async fn find_latest(&self, identity: &str, filter: &DeliveryFilter) -> Result<Matched> {
        self.inbox
            .open(identity)
            .await
            .with_context(|| format!("open inbox for {identity}"))?;

        let share = self.config.per_attempt_timeout();
        let pause = Duration::from_millis(self.config.refresh_pause_ms);
        let mut seen_subjects: Vec<String> = Vec::new();

        for attempt in 1..=self.config.attempts {
            match timeout(share, self.wait_for_entries()).await {
                Ok(Ok(rows)) => {
                    for row in rows.iter().take(self.config.scan_limit) {
                        let subject = normalize_row(row);
                        if !subject.is_empty() && !seen_subjects.contains(&subject) {
                            seen_subjects.push(subject);
                        }
                    }
                    if let Some(index) = filter.latest_match(&rows, self.config.scan_limit) {
                        match self.inbox.open_entry(index).await {
                            Ok(()) => {
                                info!(attempt, index, "matching email found");
                                return Ok(Matched { index, attempt });
                            }
                            Err(err) => warn!(attempt, index, err = %format!("{err:#}"), "could not open matching email"),
                        }
                    } else {
                        debug!(attempt, rows = rows.len(), "no matching email yet");
                    }
                }
                Ok(Err(err)) => warn!(attempt, err = %format!("{err:#}"), "inbox listing unavailable"),
                Err(_) => debug!(attempt, share_ms = share.as_millis() as u64, "inbox still empty"),
            }

            if attempt < self.config.attempts {
                warn!(attempt, attempts = self.config.attempts, "refreshing inbox");
                if let Err(err) = self.inbox.refresh().await {
                    warn!(err = %format!("{err:#}"), "inbox refresh failed");
                }
                sleep(pause).await;
            }
        }

        Err(DeliveryNotFoundError {
            identity: identity.to_string(),
            keywords: filter.keywords().to_vec(),
            attempts: self.config.attempts,
            seen_subjects,
        }
        .into())
    }

    /// Poll the listing until at least one row is visible.
    async fn wait_for_entries(&self) -> Result<Vec<String>> {
        let poll = Duration::from_millis(self.config.entry_poll_ms);
        loop {
            let rows = self.inbox.entries().await.context("list inbox entries")?;
            if !rows.is_empty() {
                return Ok(rows);
            }
            sleep(poll).await;
        }
    }

    async fn extract_code_with_retries(&self, identity: &str, index: usize) -> Result<String> {
        let backoff = Duration::from_millis(self.config.extract_backoff_ms);
        let mut last_body = String::new();

        for attempt in 1..=self.config.extract_attempts {
            sleep(backoff * attempt).await;
            for container in ContentContainer::ORDER {
                match self.inbox.read_content(container).await {
                    Ok(Some(body)) => {
                        if let Some(code) = extract_code(&body) {
                            debug!(attempt, container = container.as_str(), "code found");
                            return Ok(code);
                        }
                        last_body = body;
                    }
                    Ok(None) => {}
                    Err(err) => debug!(
                        attempt,
                        container = container.as_str(),
                        err = %format!("{err:#}"),
                        "container unreadable"
                    ),
                }
            }
            if attempt < self.config.extract_attempts {
                warn!(attempt, "code not rendered yet, reloading inbox and reopening email");
                if let Err(err) = self.inbox.refresh().await {
                    warn!(err = %format!("{err:#}"), "inbox reload failed");
                }
                if let Err(err) = self.inbox.open_entry(index).await {
                    warn!(err = %format!("{err:#}"), "reopen email failed");
                }
            }
        }

        Err(ExtractionFailedError {
            identity: identity.to_string(),
            artifact: "OTP",
            last_body: snippet(&last_body, BODY_SNIPPET_CHARS),
        }
        .into())
    }
}

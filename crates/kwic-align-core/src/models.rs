//! Core data models used throughout kwic-align.
//!
//! These types represent the committed citations, the imported batches
//! awaiting review, and the lock state that guards a batch during an
//! interactive review session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a citation within its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    None,
    Rubric,
    Segment,
}

impl ContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::None => "none",
            ContextKind::Rubric => "rubric",
            ContextKind::Segment => "segment",
        }
    }

    pub fn parse(s: &str) -> ContextKind {
        match s {
            "rubric" => ContextKind::Rubric,
            "segment" => ContextKind::Segment,
            _ => ContextKind::None,
        }
    }
}

/// Role a committed context plays in the group structure.
///
/// A `Group` context owns an ordered list of `Member` context ids; its
/// textual fields are derived from the members (see [`crate::group`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    None,
    Group,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::None => "none",
            GroupRole::Group => "group",
            GroupRole::Member => "member",
        }
    }

    pub fn parse(s: &str) -> GroupRole {
        match s {
            "group" => GroupRole::Group,
            "member" => GroupRole::Member,
            _ => GroupRole::None,
        }
    }
}

/// The textual fields shared by committed and inbound citations.
///
/// The similarity metric and the matcher operate over this trait so a
/// freshly imported sequence can be aligned against either another
/// import or the already-committed contexts.
pub trait Citation {
    fn location(&self) -> &str;
    fn number(&self) -> i64;
    fn preceding(&self) -> &str;
    fn keyword(&self) -> &str;
    fn following(&self) -> &str;
}

/// A committed keyword-in-context citation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    /// Source reference (e.g. a folio or line marker).
    pub location: String,
    /// Sequence position within its location.
    pub number: i64,
    pub preceding: String,
    pub keyword: String,
    pub following: String,
    pub kind: ContextKind,
    pub group_role: GroupRole,
    /// Ordered member ids; populated only when `group_role` is `Group`.
    /// Membership is an explicit id list, never embedded references.
    pub member_ids: Vec<String>,
    /// Linked lemma id, if the keyword has been lemmatised.
    pub lemma: Option<String>,
    /// Cached lemma display name, maintained by the curation layer for
    /// fast filtering.
    pub lemma_string: Option<String>,
    /// Linked part-of-speech id.
    pub pos: Option<String>,
    /// Cached part-of-speech display name.
    pub pos_string: Option<String>,
    /// Linked sense id.
    pub sense: Option<String>,
    /// Marks a context as interesting for the glossary.
    pub interesting: bool,
}

impl Context {
    /// Creates an unlinked context from raw citation fields.
    pub fn new(
        location: impl Into<String>,
        number: i64,
        preceding: impl Into<String>,
        keyword: impl Into<String>,
        following: impl Into<String>,
        kind: ContextKind,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            location: location.into(),
            number,
            preceding: preceding.into(),
            keyword: keyword.into(),
            following: following.into(),
            kind,
            group_role: GroupRole::None,
            member_ids: Vec::new(),
            lemma: None,
            lemma_string: None,
            pos: None,
            pos_string: None,
            sense: None,
            interesting: false,
        }
    }

    /// Creates a committed context from a confirmed inbound context,
    /// with no lemma, part-of-speech, or sense links yet.
    pub fn from_inbound(inbound: &InboundContext) -> Self {
        Self::new(
            inbound.location.clone(),
            inbound.number,
            inbound.preceding.clone(),
            inbound.keyword.clone(),
            inbound.following.clone(),
            inbound.kind,
        )
    }
}

impl Citation for Context {
    fn location(&self) -> &str {
        &self.location
    }
    fn number(&self) -> i64 {
        self.number
    }
    fn preceding(&self) -> &str {
        &self.preceding
    }
    fn keyword(&self) -> &str {
        &self.keyword
    }
    fn following(&self) -> &str {
        &self.following
    }
}

/// An imported, not-yet-committed citation awaiting review.
///
/// Owned by exactly one [`InboundContextGroup`]; created in bulk at
/// import time and deleted once its batch is finalized or discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundContext {
    pub id: String,
    /// Owning batch id.
    pub batch_id: String,
    pub location: String,
    pub number: i64,
    pub preceding: String,
    pub keyword: String,
    pub following: String,
    pub kind: ContextKind,
}

impl InboundContext {
    pub fn new(
        batch_id: impl Into<String>,
        location: impl Into<String>,
        number: i64,
        preceding: impl Into<String>,
        keyword: impl Into<String>,
        following: impl Into<String>,
        kind: ContextKind,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            batch_id: batch_id.into(),
            location: location.into(),
            number,
            preceding: preceding.into(),
            keyword: keyword.into(),
            following: following.into(),
            kind,
        }
    }
}

impl Citation for InboundContext {
    fn location(&self) -> &str {
        &self.location
    }
    fn number(&self) -> i64 {
        self.number
    }
    fn preceding(&self) -> &str {
        &self.preceding
    }
    fn keyword(&self) -> &str {
        &self.keyword
    }
    fn following(&self) -> &str {
        &self.following
    }
}

/// Review-lock state of an inbound batch.
///
/// Modeled as a tagged variant so a lock timestamp can never exist
/// without a lock owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum LockState {
    Unlocked,
    Locked { owner: String, since: DateTime<Utc> },
}

impl LockState {
    /// Returns the lock owner, if any.
    pub fn holder(&self) -> Option<&str> {
        match self {
            LockState::Unlocked => None,
            LockState::Locked { owner, .. } => Some(owner),
        }
    }

    /// A lock is stale once it has been held longer than `threshold`.
    /// An unlocked batch is never stale.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match self {
            LockState::Unlocked => false,
            LockState::Locked { since, .. } => now - *since > threshold,
        }
    }
}

/// A batch of inbound contexts imported together and reviewed as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundContextGroup {
    pub id: String,
    /// Import timestamp.
    pub timestamp: DateTime<Utc>,
    /// User who imported the batch.
    pub user: String,
    /// Optimistic-concurrency token; bumped on every persisted write.
    pub version: i64,
    pub lock: LockState,
    /// Ordered member contexts.
    pub contexts: Vec<InboundContext>,
}

impl InboundContextGroup {
    pub fn new(user: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            user: user.into(),
            version: 0,
            lock: LockState::Unlocked,
            contexts: Vec::new(),
        }
    }
}

/// Lightweight batch listing for the CLI and lock inspection.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub lock: LockState,
    pub context_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_state_holder() {
        assert_eq!(LockState::Unlocked.holder(), None);
        let lock = LockState::Locked {
            owner: "alice".to_string(),
            since: Utc::now(),
        };
        assert_eq!(lock.holder(), Some("alice"));
    }

    #[test]
    fn lock_staleness_threshold() {
        let since = Utc::now();
        let lock = LockState::Locked {
            owner: "alice".to_string(),
            since,
        };
        let threshold = Duration::minutes(5);

        assert!(!lock.is_stale(since + Duration::minutes(2), threshold));
        assert!(lock.is_stale(since + Duration::minutes(6), threshold));
        assert!(!LockState::Unlocked.is_stale(since + Duration::hours(1), threshold));
    }

    #[test]
    fn kind_round_trip() {
        for kind in [ContextKind::None, ContextKind::Rubric, ContextKind::Segment] {
            assert_eq!(ContextKind::parse(kind.as_str()), kind);
        }
        assert_eq!(ContextKind::parse("unknown"), ContextKind::None);
    }
}

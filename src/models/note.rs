use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{KeyPair, RealmRef, Relations};

/// Where a phrase was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// The passage the phrase was captured from.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub captured_at: Option<OffsetDateTime>,
}

impl Citation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
            url: None,
            captured_at: None,
        }
    }
}

/// A stored phrase entry.
///
/// Records are owned by the index; every accessor hands out clones so a
/// caller can edit and diff its copy without touching the cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub key: KeyPair,
    /// The phrase as first entered, before normalization.
    pub phrase: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub relations: Relations,
    #[serde(default)]
    pub starred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Freeform fields carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NoteRecord {
    /// Creates an empty record for a freshly allocated key.
    pub fn new(key: KeyPair, phrase: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            key,
            phrase: phrase.into(),
            citations: Vec::new(),
            tags: BTreeSet::new(),
            relations: Relations::new(),
            starred: false,
            annotation: None,
            created_at: now,
            updated_at: now,
            extra: serde_json::Map::new(),
        }
    }

    /// Replaces the content fields with those of `data`.
    ///
    /// Key, phrase and creation time are kept. Relations are handled by the
    /// index, which has to keep reverse edges in step.
    pub(crate) fn apply(&mut self, data: &NoteData, now: OffsetDateTime) {
        self.citations = data.citations.clone();
        self.tags = data.tags.clone();
        self.starred = data.starred;
        self.annotation = data.annotation.clone();
        self.extra = data.extra.clone();
        self.updated_at = now;
    }
}

/// Input to [`PhraseIndex::add`](crate::PhraseIndex::add).
///
/// # Examples
///
/// ```
/// use phrasedex::NoteData;
///
/// let data = NoteData::new("en")
///     .tag("animals")
///     .starred(true);
///
/// assert!(data.tags.contains("animals"));
/// assert!(data.relations.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteData {
    pub realm: RealmRef,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub relations: Relations,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NoteData {
    /// Creates empty note data targeting `realm`.
    pub fn new(realm: impl Into<RealmRef>) -> Self {
        Self {
            realm: realm.into(),
            ..Self::default()
        }
    }

    /// Starts from an existing record so unchanged fields are kept on `add`.
    pub fn from_record(record: &NoteRecord) -> Self {
        Self {
            realm: RealmRef::Pk(record.key.realm),
            citations: record.citations.clone(),
            tags: record.tags.clone(),
            relations: record.relations.clone(),
            starred: record.starred,
            annotation: record.annotation.clone(),
            extra: record.extra.clone(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn relation(mut self, label: &str, target: KeyPair) -> Self {
        self.relations.insert(label, target);
        self
    }

    pub fn citation(mut self, citation: Citation) -> Self {
        self.citations.push(citation);
        self
    }

    pub fn starred(mut self, starred: bool) -> Self {
        self.starred = starred;
        self
    }

    pub fn annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by [`PhraseIndex`](crate::PhraseIndex) operations.
///
/// Lookups that find nothing, or find the phrase in several realms, are not
/// errors; see [`Lookup`](crate::Lookup).
#[derive(Debug, Error)]
pub enum IndexError {
    /// The backing store failed; surfaced as-is, never retried.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Stored state contradicts the index (missing relation target,
    /// undecodable value under an engine key).
    #[error("Consistency violation at {key}: {reason}")]
    ConsistencyViolation { key: String, reason: String },

    /// Relation label not allowed for this edge.
    #[error("Invalid relation {label:?} in realm {realm:?}")]
    InvalidRelation { label: String, realm: String },

    /// The realm already holds phrases, so its normalizer and the relation
    /// labels its notes use are fixed.
    #[error("Realm {0:?} is not empty; its normalizer and relations in use cannot change")]
    RealmNotEmpty(String),

    #[error("The default realm cannot be removed")]
    DefaultRealm,

    #[error("The default sorter cannot be changed or removed")]
    DefaultSorter,

    /// Phrase is blank after normalization.
    #[error("Phrase is empty after normalization")]
    EmptyPhrase,

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A compiled matcher exceeded the regex size limit.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl IndexError {
    pub(crate) fn consistency(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConsistencyViolation {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the caller's input rather than by the
    /// store or by corrupt state.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRelation { .. }
                | Self::RealmNotEmpty(_)
                | Self::DefaultRealm
                | Self::DefaultSorter
                | Self::EmptyPhrase
        )
    }
}

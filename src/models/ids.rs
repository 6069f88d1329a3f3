use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primary key of a realm.
///
/// Realm `0` is the default realm and always exists once an index is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealmPk(u32);

impl RealmPk {
    /// The always-present default realm.
    pub const DEFAULT: RealmPk = RealmPk(0);

    /// Creates a new realm key.
    pub fn new(pk: u32) -> Self {
        Self(pk)
    }

    /// Returns the underlying key value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Returns true for the default realm.
    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

impl fmt::Display for RealmPk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of a phrase within its realm.
///
/// Only unique per realm; the pair of both keys is a [`KeyPair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhrasePk(u32);

impl PhrasePk {
    /// Creates a new phrase key.
    pub fn new(pk: u32) -> Self {
        Self(pk)
    }

    /// Returns the underlying key value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// The key allocated after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PhrasePk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique identifier of a stored note.
///
/// Serializes as a two-element array `[realm, phrase]` and displays as
/// `realm:phrase`, which is also the record's store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(RealmPk, PhrasePk)", into = "(RealmPk, PhrasePk)")]
pub struct KeyPair {
    pub realm: RealmPk,
    pub phrase: PhrasePk,
}

impl KeyPair {
    /// Creates a key pair from both primary keys.
    pub fn new(realm: RealmPk, phrase: PhrasePk) -> Self {
        Self { realm, phrase }
    }
}

impl From<(RealmPk, PhrasePk)> for KeyPair {
    fn from((realm, phrase): (RealmPk, PhrasePk)) -> Self {
        Self { realm, phrase }
    }
}

impl From<KeyPair> for (RealmPk, PhrasePk) {
    fn from(key: KeyPair) -> Self {
        (key.realm, key.phrase)
    }
}

impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.realm, self.phrase)
    }
}

/// Error returned when a string is not of the form `realm:phrase`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid key pair: {0:?}")]
pub struct ParseKeyPairError(String);

impl FromStr for KeyPair {
    type Err = ParseKeyPairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (realm, phrase) = s
            .split_once(':')
            .ok_or_else(|| ParseKeyPairError(s.to_string()))?;
        let realm = realm
            .trim()
            .parse()
            .map_err(|_| ParseKeyPairError(s.to_string()))?;
        let phrase = phrase
            .trim()
            .parse()
            .map_err(|_| ParseKeyPairError(s.to_string()))?;
        Ok(Self::new(RealmPk::new(realm), PhrasePk::new(phrase)))
    }
}

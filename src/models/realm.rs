use serde::{Deserialize, Serialize};

use super::RealmPk;

/// The relation label allowed across realms. Always symmetric.
pub const SEE_ALSO: &str = "see also";

/// Stored attributes of a realm; the realm's name is kept alongside, as the
/// key of the realm table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmInfo {
    pub pk: RealmPk,
    pub description: String,
    /// Name of the normalizer applied to this realm's phrases.
    pub normalizer: String,
    /// Relation label pairs `(label, reverse)`. `(L, L)` is symmetric.
    pub relations: Vec<(String, String)>,
}

impl RealmInfo {
    /// Attributes of the default realm.
    pub fn default_realm() -> Self {
        Self {
            pk: RealmPk::DEFAULT,
            description: String::new(),
            normalizer: String::new(),
            relations: default_relations(),
        }
    }

    /// Looks up the reverse of `label` in this realm's relation pairs.
    ///
    /// Returns `None` if the label is not part of the realm's vocabulary.
    pub fn reverse(&self, label: &str) -> Option<&str> {
        self.relations.iter().find_map(|(a, b)| {
            if a == label {
                Some(b.as_str())
            } else if b == label {
                Some(a.as_str())
            } else {
                None
            }
        })
    }

    /// Every distinct label usable in this realm.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .relations
            .iter()
            .flat_map(|(a, b)| [a.as_str(), b.as_str()])
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

/// Relation vocabulary given to realms that do not declare one.
pub fn default_relations() -> Vec<(String, String)> {
    vec![(SEE_ALSO.to_string(), SEE_ALSO.to_string())]
}

/// A realm together with its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Realm {
    pub name: String,
    #[serde(flatten)]
    pub info: RealmInfo,
}

impl Realm {
    pub fn pk(&self) -> RealmPk {
        self.info.pk
    }
}

/// Any of the ways a caller may identify a realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RealmRef {
    Pk(RealmPk),
    Name(String),
}

impl Default for RealmRef {
    fn default() -> Self {
        RealmRef::Pk(RealmPk::DEFAULT)
    }
}

impl From<RealmPk> for RealmRef {
    fn from(pk: RealmPk) -> Self {
        RealmRef::Pk(pk)
    }
}

impl From<u32> for RealmRef {
    fn from(pk: u32) -> Self {
        RealmRef::Pk(RealmPk::new(pk))
    }
}

impl From<&str> for RealmRef {
    fn from(name: &str) -> Self {
        RealmRef::Name(name.to_string())
    }
}

impl From<String> for RealmRef {
    fn from(name: String) -> Self {
        RealmRef::Name(name)
    }
}

impl From<&Realm> for RealmRef {
    fn from(realm: &Realm) -> Self {
        RealmRef::Pk(realm.pk())
    }
}

/// Input to realm creation or update. The realm is identified by `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to the default normalizer (`""`).
    #[serde(default)]
    pub normalizer: Option<String>,
    /// Defaults to a single symmetric `"see also"` pair.
    #[serde(default)]
    pub relations: Option<Vec<(String, String)>>,
}

impl RealmDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn normalizer(mut self, normalizer: impl Into<String>) -> Self {
        self.normalizer = Some(normalizer.into());
        self
    }

    pub fn relation(mut self, label: impl Into<String>, reverse: impl Into<String>) -> Self {
        self.relations
            .get_or_insert_with(Vec::new)
            .push((label.into(), reverse.into()));
        self
    }
}

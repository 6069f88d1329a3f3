//! In-memory index state and the staged changes applied to it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::IndexError;
use crate::models::{KeyPair, NoteRecord, PhrasePk, Realm, RealmInfo, RealmPk, RealmRef, Sorter};
use crate::normalizer::collapse_whitespace;
use crate::store::WriteBatch;

pub(crate) const REALMS_KEY: &str = "realms";
pub(crate) const INDEX_KEY: &str = "index";
pub(crate) const TAGS_KEY: &str = "tags";
pub(crate) const SORTERS_KEY: &str = "sorters";

/// Realm-normalized phrase to phrase pk.
pub(crate) type RealmIndex = BTreeMap<String, PhrasePk>;

/// Default-normalized phrase to the realms holding it.
pub(crate) type GlobalIndex = BTreeMap<String, Vec<RealmPk>>;

/// Everything the index keeps in memory. Guarded by the index mutex.
#[derive(Debug, Default)]
pub(crate) struct State {
    pub realms: BTreeMap<String, RealmInfo>,
    pub global: GlobalIndex,
    pub tags: BTreeSet<String>,
    pub sorters: Vec<Sorter>,
    /// Loaded lazily, one per realm.
    pub realm_indexes: HashMap<RealmPk, RealmIndex>,
    pub cache: HashMap<KeyPair, NoteRecord>,
}

impl State {
    /// State right after initializing an empty store.
    pub fn fresh() -> Self {
        let mut state = Self::default();
        state.ensure_defaults();
        state
    }

    /// Adds the default realm and sorter when missing. Returns which of the
    /// two had to be created.
    pub fn ensure_defaults(&mut self) -> (bool, bool) {
        let add_realm = !self.realms.values().any(|info| info.pk.is_default());
        if add_realm {
            self.realms
                .insert(String::new(), RealmInfo::default_realm());
        }
        let add_sorter = !self.sorters.iter().any(|s| s.pk == 0);
        if add_sorter {
            self.sorters.insert(0, Sorter::default_sorter());
        }
        (add_realm, add_sorter)
    }

    pub fn realm_by_pk(&self, pk: RealmPk) -> Option<(String, RealmInfo)> {
        self.realms
            .iter()
            .find(|(_, info)| info.pk == pk)
            .map(|(name, info)| (name.clone(), info.clone()))
    }

    /// Resolves a realm identifier, or `None` when nothing matches.
    pub fn lookup_realm(&self, realm: &RealmRef) -> Option<(String, RealmInfo)> {
        match realm {
            RealmRef::Pk(pk) => self.realm_by_pk(*pk),
            RealmRef::Name(name) => {
                let name = collapse_whitespace(name);
                self.realms
                    .get(&name)
                    .map(|info| (name.clone(), info.clone()))
            }
        }
    }

    /// Resolves a realm identifier, falling back to the default realm.
    pub fn resolve_realm(&self, realm: &RealmRef) -> (String, RealmInfo) {
        self.lookup_realm(realm)
            .or_else(|| self.realm_by_pk(RealmPk::DEFAULT))
            .unwrap_or_else(|| (String::new(), RealmInfo::default_realm()))
    }

    /// Realm table sorted by pk.
    pub fn realm_list(&self) -> Vec<Realm> {
        let mut realms: Vec<Realm> = self
            .realms
            .iter()
            .map(|(name, info)| Realm {
                name: name.clone(),
                info: info.clone(),
            })
            .collect();
        realms.sort_by_key(Realm::pk);
        realms
    }

    pub fn sorter(&self, name: &str) -> Sorter {
        let name = collapse_whitespace(name);
        self.sorters
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.sorters.iter().find(|s| s.pk == 0))
            .cloned()
            .unwrap_or_default()
    }

    pub fn apply(&mut self, changes: Changes) {
        if let Some(realms) = changes.realms {
            self.realms = realms;
        }
        if let Some(global) = changes.global {
            self.global = global;
        }
        if let Some(tags) = changes.tags {
            self.tags = tags;
        }
        if let Some(sorters) = changes.sorters {
            self.sorters = sorters;
        }
        for (pk, index) in changes.realm_indexes {
            match index {
                Some(index) => {
                    self.realm_indexes.insert(pk, index);
                }
                None => {
                    self.realm_indexes.remove(&pk);
                }
            }
        }
        for (key, record) in changes.records {
            match record {
                Some(record) => {
                    self.cache.insert(key, record);
                }
                None => {
                    self.cache.remove(&key);
                }
            }
        }
    }
}

/// Mutations staged against a [`State`], persisted as one batch before they
/// are applied in memory.
#[derive(Debug, Default)]
pub(crate) struct Changes {
    pub realms: Option<BTreeMap<String, RealmInfo>>,
    pub global: Option<GlobalIndex>,
    pub tags: Option<BTreeSet<String>>,
    pub sorters: Option<Vec<Sorter>>,
    /// `None` removes the realm's index.
    pub realm_indexes: BTreeMap<RealmPk, Option<RealmIndex>>,
    /// `None` deletes the record.
    pub records: BTreeMap<KeyPair, Option<NoteRecord>>,
}

impl Changes {
    pub fn put_record(&mut self, record: NoteRecord) {
        self.records.insert(record.key, Some(record));
    }

    pub fn delete_record(&mut self, key: KeyPair) {
        self.records.insert(key, None);
    }

    pub fn is_empty(&self) -> bool {
        self.realms.is_none()
            && self.global.is_none()
            && self.tags.is_none()
            && self.sorters.is_none()
            && self.realm_indexes.is_empty()
            && self.records.is_empty()
    }

    pub fn to_batch(&self) -> Result<WriteBatch, IndexError> {
        let mut batch = WriteBatch::new();
        if let Some(realms) = &self.realms {
            batch.put(REALMS_KEY, encode_realms(realms)?);
        }
        if let Some(global) = &self.global {
            batch.put(INDEX_KEY, encode_pairs(global)?);
        }
        if let Some(tags) = &self.tags {
            batch.put(TAGS_KEY, serde_json::to_value(tags)?);
        }
        if let Some(sorters) = &self.sorters {
            batch.put(SORTERS_KEY, serde_json::to_value(sorters)?);
        }
        for (pk, index) in &self.realm_indexes {
            match index {
                Some(index) => batch.put(pk.to_string(), encode_pairs(index)?),
                None => batch.delete(pk.to_string()),
            }
        }
        for (key, record) in &self.records {
            match record {
                Some(record) => batch.put(key.to_string(), serde_json::to_value(record)?),
                None => batch.delete(key.to_string()),
            }
        }
        Ok(batch)
    }
}

/// Realm table as a list of `[name, info]` pairs, ordered by pk.
pub(crate) fn encode_realms(realms: &BTreeMap<String, RealmInfo>) -> Result<Value, IndexError> {
    let mut pairs: Vec<(&String, &RealmInfo)> = realms.iter().collect();
    pairs.sort_by_key(|(_, info)| info.pk);
    Ok(serde_json::to_value(pairs)?)
}

/// Map as a list of `[key, value]` pairs.
fn encode_pairs<K: Serialize, V: Serialize>(map: &BTreeMap<K, V>) -> Result<Value, IndexError> {
    Ok(serde_json::to_value(map.iter().collect::<Vec<_>>())?)
}

/// Decodes a stored value, reporting undecodable data against its key.
pub(crate) fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, IndexError> {
    serde_json::from_value(value)
        .map_err(|e| IndexError::consistency(key, format!("undecodable value: {e}")))
}

/// Decodes a list of `[key, value]` pairs into a map.
pub(crate) fn decode_pairs<K, V>(key: &str, value: Value) -> Result<BTreeMap<K, V>, IndexError>
where
    K: DeserializeOwned + Ord,
    V: DeserializeOwned,
{
    let pairs: Vec<(K, V)> = decode(key, value)?;
    Ok(pairs.into_iter().collect())
}

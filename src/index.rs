//! Realm-partitioned phrase index.
//!
//! [`PhraseIndex`] owns the realm table, one lookup map per realm, the
//! cross-realm disambiguation map, the tag set, the sorter table and a
//! write-through record cache, all kept on top of a flat [`KeyValueStore`].
//!
//! Every operation takes the same FIFO lock, so a read never observes a
//! half-applied mutation. Mutations stage their changes, persist them as a
//! single [`WriteBatch`](crate::store::WriteBatch) and only then update the
//! in-memory state: a failed write leaves the index exactly as it was.

mod state;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::config::IndexConfig;
use crate::distance::Metric;
use crate::error::IndexError;
use crate::models::{
    KeyPair, NoteData, NoteRecord, PhrasePk, Realm, RealmDraft, RealmInfo, RealmPk, RealmRef,
    SEE_ALSO, Sorter, default_relations,
};
use crate::normalizer::{self, NormalizerRegistry, collapse_whitespace};
use crate::store::{KeyValueStore, WriteBatch};
use crate::trie::{self, CompiledTrie, TrieOptions};

use state::{
    Changes, INDEX_KEY, REALMS_KEY, RealmIndex, SORTERS_KEY, State, TAGS_KEY, decode,
    decode_pairs, encode_realms,
};

/// Outcome of [`PhraseIndex::find`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(NoteRecord),
    NotFound,
    /// No realm was given and the phrase exists in several realms.
    Ambiguous(Vec<RealmSummary>),
}

impl Lookup {
    pub fn found(self) -> Option<NoteRecord> {
        match self {
            Lookup::Found(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }
}

/// Realm candidate returned by an ambiguous lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmSummary {
    pub pk: RealmPk,
    pub name: String,
    pub description: String,
}

/// One ranked result of [`PhraseIndex::find_similar`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    pub key: KeyPair,
    /// Realm-normalized phrase.
    pub phrase: String,
    pub distance: f64,
}

/// Phrase index over a key/value store.
///
/// # Examples
///
/// ```
/// use phrasedex::{IndexConfig, Lookup, MemoryStore, NoteData, PhraseIndex, RealmPk};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), phrasedex::IndexError> {
/// let index = PhraseIndex::open(MemoryStore::new(), IndexConfig::default()).await?;
///
/// let key = index.add("Cat", NoteData::new(RealmPk::DEFAULT).tag("animals")).await?;
/// match index.find("cat", None).await? {
///     Lookup::Found(record) => assert_eq!(record.key, key),
///     other => panic!("unexpected lookup {other:?}"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct PhraseIndex<S> {
    store: S,
    config: IndexConfig,
    normalizers: NormalizerRegistry,
    state: Mutex<State>,
}

impl<S: KeyValueStore> PhraseIndex<S> {
    /// Opens the index with the built-in normalizers.
    pub async fn open(store: S, config: IndexConfig) -> Result<Self, IndexError> {
        Self::open_with_normalizers(store, config, NormalizerRegistry::builtin()).await
    }

    /// Opens the index, loading the realm table, the global index, the tag
    /// set and the sorters. The default realm and sorter are created and
    /// persisted when the store does not hold them yet.
    pub async fn open_with_normalizers(
        store: S,
        config: IndexConfig,
        normalizers: NormalizerRegistry,
    ) -> Result<Self, IndexError> {
        let keys = [REALMS_KEY, INDEX_KEY, TAGS_KEY, SORTERS_KEY].map(String::from);
        let mut found = store.get(&keys).await?;

        let mut state = State::default();
        if let Some(value) = found.remove(REALMS_KEY) {
            state.realms = decode_pairs(REALMS_KEY, value)?;
        }
        if let Some(value) = found.remove(INDEX_KEY) {
            state.global = decode_pairs(INDEX_KEY, value)?;
        }
        if let Some(value) = found.remove(TAGS_KEY) {
            state.tags = decode(TAGS_KEY, value)?;
        }
        if let Some(value) = found.remove(SORTERS_KEY) {
            state.sorters = decode(SORTERS_KEY, value)?;
        }

        let (add_realm, add_sorter) = state.ensure_defaults();
        let mut batch = WriteBatch::new();
        if add_realm {
            batch.put(REALMS_KEY, encode_realms(&state.realms)?);
        }
        if add_sorter {
            batch.put(SORTERS_KEY, serde_json::to_value(&state.sorters)?);
        }
        if !batch.is_empty() {
            store.commit(batch).await?;
            tracing::info!("initialized default realm and sorter");
        }

        tracing::debug!(
            realms = state.realms.len(),
            phrases = state.global.len(),
            tags = state.tags.len(),
            "opened phrase index"
        );

        Ok(Self {
            store,
            config,
            normalizers,
            state: Mutex::new(state),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn normalizers(&self) -> &NormalizerRegistry {
        &self.normalizers
    }

    // --- Lookups ---

    /// Finds a phrase.
    ///
    /// With a realm, the phrase is normalized by that realm's normalizer and
    /// looked up in its index. Without one, every realm holding the phrase's
    /// default form is a candidate: none gives [`Lookup::NotFound`], one
    /// resolves to its record and several give [`Lookup::Ambiguous`].
    pub async fn find(
        &self,
        phrase: &str,
        realm: Option<RealmRef>,
    ) -> Result<Lookup, IndexError> {
        let mut state = self.state.lock().await;
        match realm {
            Some(realm) => {
                let (_, info) = state.resolve_realm(&realm);
                let normalized = self.apply_normalizer(&info, phrase);
                self.find_in_realm(&mut state, info.pk, &normalized).await
            }
            None => self.find_anywhere(&mut state, phrase).await,
        }
    }

    async fn find_in_realm(
        &self,
        state: &mut State,
        realm: RealmPk,
        normalized: &str,
    ) -> Result<Lookup, IndexError> {
        if normalized.is_empty() {
            return Ok(Lookup::NotFound);
        }
        self.load_realm_index(state, realm).await?;
        let Some(pk) = state
            .realm_indexes
            .get(&realm)
            .and_then(|index| index.get(normalized))
            .copied()
        else {
            tracing::debug!(%realm, phrase = normalized, "phrase not found");
            return Ok(Lookup::NotFound);
        };

        let record = self.load_record(state, KeyPair::new(realm, pk)).await?;
        Ok(Lookup::Found(record))
    }

    async fn find_anywhere(&self, state: &mut State, phrase: &str) -> Result<Lookup, IndexError> {
        // A realm's global entry is the default form of its own normalized
        // phrase, so the key is computed per realm.
        let mut candidates = Vec::new();
        for realm in state.realm_list() {
            let normalized = self.apply_normalizer(&realm.info, phrase);
            let global_key = normalizer::default_normalize(&normalized);
            let listed = state
                .global
                .get(&global_key)
                .is_some_and(|pks| pks.contains(&realm.pk()));
            if listed {
                candidates.push((realm, normalized, global_key));
            }
        }

        match candidates.len() {
            0 => {
                tracing::debug!(phrase, "phrase not found in any realm");
                Ok(Lookup::NotFound)
            }
            1 => {
                let (realm, normalized, global_key) = candidates.remove(0);
                let pk = realm.pk();
                let lookup = self.find_in_realm(state, pk, &normalized).await?;
                if !lookup.is_not_found() {
                    return Ok(lookup);
                }
                // Listed under the default form, but stored under a different
                // realm form: fall back to the entry sharing the default form.
                let shared = state.realm_indexes.get(&pk).and_then(|index| {
                    index
                        .iter()
                        .find(|(entry, _)| normalizer::default_normalize(entry) == global_key)
                        .map(|(_, phrase_pk)| *phrase_pk)
                });
                match shared {
                    Some(phrase_pk) => {
                        let record = self.load_record(state, KeyPair::new(pk, phrase_pk)).await?;
                        Ok(Lookup::Found(record))
                    }
                    None => {
                        tracing::warn!(realm = %pk, key = %global_key, "stale global index entry");
                        Ok(Lookup::NotFound)
                    }
                }
            }
            _ => Ok(Lookup::Ambiguous(
                candidates
                    .into_iter()
                    .map(|(realm, _, _)| RealmSummary {
                        pk: realm.pk(),
                        name: realm.name,
                        description: realm.info.description,
                    })
                    .collect(),
            )),
        }
    }

    /// Resolves a realm identifier to its name and settings, falling back to
    /// the default realm.
    pub async fn find_realm(&self, realm: impl Into<RealmRef>) -> (String, RealmInfo) {
        self.state.lock().await.resolve_realm(&realm.into())
    }

    /// Normalizes `phrase` with the realm's normalizer.
    pub async fn normalize(&self, phrase: &str, realm: impl Into<RealmRef>) -> String {
        let (_, info) = self.find_realm(realm).await;
        self.apply_normalizer(&info, phrase)
    }

    /// Normalizes `phrase` with the default normalizer.
    pub fn default_normalize(&self, phrase: &str) -> String {
        normalizer::default_normalize(phrase)
    }

    /// Realm table, ordered by pk.
    pub async fn realms(&self) -> Vec<Realm> {
        self.state.lock().await.realm_list()
    }

    /// Every tag used so far, sorted.
    pub async fn tags(&self) -> Vec<String> {
        self.state.lock().await.tags.iter().cloned().collect()
    }

    /// The realm's `(normalized phrase, pk)` entries, sorted by phrase.
    pub async fn phrases(
        &self,
        realm: impl Into<RealmRef>,
    ) -> Result<Vec<(String, PhrasePk)>, IndexError> {
        let mut state = self.state.lock().await;
        let (_, info) = state.resolve_realm(&realm.into());
        let index = self.load_realm_index(&mut state, info.pk).await?;
        Ok(index.iter().map(|(p, pk)| (p.clone(), *pk)).collect())
    }

    /// Free capacity of the store: configured capacity minus bytes in use.
    pub async fn memfree(&self) -> Result<i64, IndexError> {
        let _state = self.state.lock().await;
        let in_use = self.store.bytes_in_use().await?;
        Ok(self.config.capacity_bytes as i64 - in_use as i64)
    }

    // --- Phrase mutations ---

    /// Adds `phrase` to the realm named by `data.realm`, or updates it when
    /// the realm already holds it. Returns the phrase's key.
    ///
    /// The record's content is replaced by `data`. Relation edges are
    /// diffed against the stored ones: each new edge gets its reverse edge
    /// on the target, each dropped edge loses it. Targets not yet cached are
    /// fetched; a target absent from the store is a consistency violation.
    pub async fn add(&self, phrase: &str, data: NoteData) -> Result<KeyPair, IndexError> {
        let mut state = self.state.lock().await;
        let (realm_name, info) = state.resolve_realm(&data.realm);
        let normalized = self.apply_normalizer(&info, phrase);
        if normalized.is_empty() {
            return Err(IndexError::EmptyPhrase);
        }

        let index = self.load_realm_index(&mut state, info.pk).await?.clone();
        let now = OffsetDateTime::now_utc();
        let mut changes = Changes::default();

        let (mut record, created) = match index.get(&normalized) {
            Some(pk) => {
                let record = self.load_record(&mut state, KeyPair::new(info.pk, *pk)).await?;
                (record, false)
            }
            None => {
                let pk = index
                    .values()
                    .max()
                    .map_or(PhrasePk::new(0), |max| max.next());
                let key = KeyPair::new(info.pk, pk);
                (NoteRecord::new(key, collapse_whitespace(phrase), now), true)
            }
        };
        let key = record.key;

        for (label, target) in data.relations.edges() {
            validate_edge(&realm_name, &info, key, label, target)?;
        }

        let added: Vec<(&str, KeyPair)> = data
            .relations
            .edges()
            .filter(|(label, target)| !record.relations.contains(label, *target))
            .collect();
        let removed: Vec<(String, KeyPair)> = record
            .relations
            .edges()
            .filter(|(label, target)| !data.relations.contains(label, *target))
            .map(|(label, target)| (label.to_string(), target))
            .collect();

        let targets = added
            .iter()
            .map(|(_, t)| *t)
            .chain(removed.iter().map(|(_, t)| *t));
        let mut touched = self.load_records(&mut state, targets).await?;

        for (label, target) in &added {
            let Some(other) = touched.get_mut(target) else {
                return Err(IndexError::consistency(
                    target.to_string(),
                    format!("relation target of {key} does not exist"),
                ));
            };
            other.relations.insert(reverse_label(&info, label), key);
        }
        for (label, target) in &removed {
            match touched.get_mut(target) {
                Some(other) => {
                    other.relations.remove(reverse_label(&info, label), key);
                }
                None => tracing::warn!(%key, %target, "dropping edge to missing note"),
            }
        }

        record.apply(&data, now);
        record.relations = data.relations.clone();

        if created {
            let mut index = index;
            index.insert(normalized.clone(), key.phrase);
            changes.realm_indexes.insert(info.pk, Some(index));
        }

        let global_key = normalizer::default_normalize(&normalized);
        let listed = state
            .global
            .get(&global_key)
            .is_some_and(|pks| pks.contains(&info.pk));
        if !listed {
            let mut global = state.global.clone();
            global.entry(global_key).or_default().push(info.pk);
            changes.global = Some(global);
        }

        if !data.tags.is_subset(&state.tags) {
            changes.tags = Some(state.tags.union(&data.tags).cloned().collect());
        }

        for (_, mut other) in touched {
            other.updated_at = now;
            changes.put_record(other);
        }
        changes.put_record(record);

        self.commit(&mut state, changes).await?;
        tracing::info!(%key, phrase = %normalized, created, "saved phrase");
        Ok(key)
    }

    /// Deletes a phrase, stripping the reverse edges other notes hold to it.
    /// Returns false when the realm does not hold the phrase.
    pub async fn delete(&self, phrase: &str, realm: impl Into<RealmRef>) -> Result<bool, IndexError> {
        let mut state = self.state.lock().await;
        let (_, info) = state.resolve_realm(&realm.into());
        let normalized = self.apply_normalizer(&info, phrase);

        let mut index = self.load_realm_index(&mut state, info.pk).await?.clone();
        let Some(pk) = index.remove(&normalized) else {
            return Ok(false);
        };
        let key = KeyPair::new(info.pk, pk);

        let record = self.load_records(&mut state, [key]).await?.remove(&key);
        let targets: BTreeSet<KeyPair> = match &record {
            Some(record) => record.relations.edges().map(|(_, t)| t).collect(),
            None => {
                tracing::warn!(%key, "indexed phrase has no stored record");
                BTreeSet::new()
            }
        };

        let mut changes = Changes::default();
        let now = OffsetDateTime::now_utc();
        let touched = self.load_records(&mut state, targets.iter().copied()).await?;
        for target in &targets {
            match touched.get(target) {
                Some(other) => {
                    let mut other = other.clone();
                    if !other.relations.remove_target(key).is_empty() {
                        other.updated_at = now;
                        changes.put_record(other);
                    }
                }
                None => tracing::warn!(%key, %target, "skipping missing relation target"),
            }
        }

        let global_key = normalizer::default_normalize(&normalized);
        let still_shared = index
            .keys()
            .any(|entry| normalizer::default_normalize(entry) == global_key);
        if !still_shared {
            let mut global = state.global.clone();
            if unlist(&mut global, &global_key, info.pk) {
                changes.global = Some(global);
            }
        }

        changes.realm_indexes.insert(info.pk, Some(index));
        changes.delete_record(key);

        self.commit(&mut state, changes).await?;
        tracing::info!(%key, phrase = %normalized, "deleted phrase");
        Ok(true)
    }

    /// Removes the edge `phrase --relation--> pair` and its reverse.
    /// Returns false, without writing, when the edge does not exist.
    pub async fn delete_relation(
        &self,
        phrase: &str,
        realm: impl Into<RealmRef>,
        relation: &str,
        pair: KeyPair,
    ) -> Result<bool, IndexError> {
        let mut state = self.state.lock().await;
        let (_, info) = state.resolve_realm(&realm.into());
        let normalized = self.apply_normalizer(&info, phrase);

        let index = self.load_realm_index(&mut state, info.pk).await?;
        let Some(pk) = index.get(&normalized).copied() else {
            return Ok(false);
        };
        let key = KeyPair::new(info.pk, pk);

        let mut loaded = self.load_records(&mut state, [key, pair]).await?;
        let Some(mut record) = loaded.remove(&key) else {
            return Err(IndexError::consistency(key.to_string(), "indexed phrase has no stored record"));
        };
        if !record.relations.remove(relation, pair) {
            return Ok(false);
        }

        let now = OffsetDateTime::now_utc();
        let mut changes = Changes::default();
        record.updated_at = now;
        changes.put_record(record);
        match loaded.remove(&pair) {
            Some(mut other) => {
                other.relations.remove(reverse_label(&info, relation), key);
                other.updated_at = now;
                changes.put_record(other);
            }
            None => tracing::warn!(%key, target = %pair, "dropping edge to missing note"),
        }

        self.commit(&mut state, changes).await?;
        tracing::info!(%key, relation, target = %pair, "deleted relation");
        Ok(true)
    }

    // --- Realm management ---

    /// Creates a realm, or updates the realm with the same name.
    ///
    /// Name and description are whitespace-normalized. A new realm gets the
    /// next free pk, the default normalizer and the `"see also"` relation
    /// unless the draft says otherwise; an update keeps whatever the draft
    /// leaves unset. The `"see also"` pair is always part of the vocabulary.
    ///
    /// Once a realm holds phrases its normalizer is fixed, and a relation
    /// label its notes use can be neither dropped nor given another reverse.
    pub async fn save_realm(&self, draft: RealmDraft) -> Result<RealmPk, IndexError> {
        let mut state = self.state.lock().await;
        let name = collapse_whitespace(&draft.name);
        let description = collapse_whitespace(&draft.description);

        let relations = draft.relations.map(clean_relations);
        let info = match state.realms.get(&name).cloned() {
            Some(existing) => {
                let normalizer = draft.normalizer.unwrap_or_else(|| existing.normalizer.clone());
                if normalizer != existing.normalizer {
                    let index = self.load_realm_index(&mut state, existing.pk).await?;
                    if !index.is_empty() {
                        return Err(IndexError::RealmNotEmpty(name));
                    }
                }
                let updated = RealmInfo {
                    pk: existing.pk,
                    description,
                    normalizer,
                    relations: relations.unwrap_or_else(|| existing.relations.clone()),
                };
                let remapped: BTreeSet<&str> = existing
                    .labels()
                    .into_iter()
                    .filter(|label| updated.reverse(label) != existing.reverse(label))
                    .collect();
                if !remapped.is_empty() {
                    let index = self.load_realm_index(&mut state, existing.pk).await?;
                    let keys: Vec<KeyPair> = index
                        .values()
                        .map(|pk| KeyPair::new(existing.pk, *pk))
                        .collect();
                    let records = self.load_records(&mut state, keys).await?;
                    let in_use = records
                        .values()
                        .any(|record| record.relations.labels().any(|l| remapped.contains(l)));
                    if in_use {
                        return Err(IndexError::RealmNotEmpty(name));
                    }
                }
                updated
            }
            None => {
                let pk = state
                    .realms
                    .values()
                    .map(|info| info.pk.get())
                    .max()
                    .map_or(1, |max| max + 1);
                RealmInfo {
                    pk: RealmPk::new(pk),
                    description,
                    normalizer: draft.normalizer.unwrap_or_default(),
                    relations: relations.unwrap_or_else(default_relations),
                }
            }
        };

        if !self.normalizers.contains(&info.normalizer) {
            tracing::warn!(
                realm = %name,
                normalizer = %info.normalizer,
                "unknown normalizer; the default one will be used"
            );
        }

        let pk = info.pk;
        let mut realms = state.realms.clone();
        realms.insert(name.clone(), info);
        let changes = Changes {
            realms: Some(realms),
            ..Changes::default()
        };
        self.commit(&mut state, changes).await?;
        tracing::info!(realm = %name, %pk, "saved realm");
        Ok(pk)
    }

    /// Removes a realm with all of its phrases and returns how many phrases
    /// were deleted. Edges other realms hold to those phrases are stripped.
    /// An unknown realm removes nothing.
    pub async fn remove_realm(&self, realm: impl Into<RealmRef>) -> Result<usize, IndexError> {
        let mut state = self.state.lock().await;
        let Some((name, info)) = state.lookup_realm(&realm.into()) else {
            return Ok(0);
        };
        if info.pk.is_default() {
            return Err(IndexError::DefaultRealm);
        }

        let index = self.load_realm_index(&mut state, info.pk).await?.clone();
        let keys: Vec<KeyPair> = index.values().map(|pk| KeyPair::new(info.pk, *pk)).collect();
        let records = self.load_records(&mut state, keys.iter().copied()).await?;

        let outside: BTreeSet<KeyPair> = records
            .values()
            .flat_map(|record| record.relations.edges().map(|(_, t)| t))
            .filter(|target| target.realm != info.pk)
            .collect();
        let touched = self.load_records(&mut state, outside.iter().copied()).await?;

        let mut changes = Changes::default();
        let now = OffsetDateTime::now_utc();
        for target in &outside {
            let Some(other) = touched.get(target) else {
                tracing::warn!(%target, "skipping missing relation target");
                continue;
            };
            let mut other = other.clone();
            let mut stripped = false;
            for key in &keys {
                stripped |= !other.relations.remove_target(*key).is_empty();
            }
            if stripped {
                other.updated_at = now;
                changes.put_record(other);
            }
        }

        let mut global = state.global.clone();
        let mut listed = false;
        global.retain(|_, pks| {
            let len = pks.len();
            pks.retain(|pk| *pk != info.pk);
            listed |= pks.len() != len;
            !pks.is_empty()
        });
        if listed {
            changes.global = Some(global);
        }

        let mut realms = state.realms.clone();
        realms.remove(&name);
        changes.realms = Some(realms);
        changes.realm_indexes.insert(info.pk, None);
        for key in &keys {
            changes.delete_record(*key);
        }

        self.commit(&mut state, changes).await?;
        // Records that were cached but never indexed belong to the realm too.
        state.cache.retain(|key, _| key.realm != info.pk);
        tracing::info!(realm = %name, pk = %info.pk, phrases = keys.len(), "removed realm");
        Ok(keys.len())
    }

    // --- Sorters and similarity ---

    /// Sorter table, ordered by pk.
    pub async fn sorters(&self) -> Vec<Sorter> {
        let mut sorters = self.state.lock().await.sorters.clone();
        sorters.sort_by_key(|s| s.pk);
        sorters
    }

    /// Creates a sorter, or updates the sorter with the same name. The pk of
    /// `sorter` is ignored. The default sorter cannot be changed.
    pub async fn save_sorter(&self, mut sorter: Sorter) -> Result<u32, IndexError> {
        let mut state = self.state.lock().await;
        sorter.name = collapse_whitespace(&sorter.name);
        if sorter.name.is_empty() {
            return Err(IndexError::DefaultSorter);
        }

        let mut sorters = state.sorters.clone();
        match sorters.iter_mut().find(|s| s.name == sorter.name) {
            Some(existing) => {
                sorter.pk = existing.pk;
                *existing = sorter.clone();
            }
            None => {
                sorter.pk = sorters.iter().map(|s| s.pk).max().map_or(1, |max| max + 1);
                sorters.push(sorter.clone());
            }
        }

        let changes = Changes {
            sorters: Some(sorters),
            ..Changes::default()
        };
        self.commit(&mut state, changes).await?;
        tracing::info!(sorter = %sorter.name, pk = sorter.pk, "saved sorter");
        Ok(sorter.pk)
    }

    /// Removes a sorter by name. Returns false when no such sorter exists.
    pub async fn remove_sorter(&self, name: &str) -> Result<bool, IndexError> {
        let mut state = self.state.lock().await;
        let name = collapse_whitespace(name);
        if name.is_empty() {
            return Err(IndexError::DefaultSorter);
        }
        let mut sorters = state.sorters.clone();
        let before = sorters.len();
        sorters.retain(|s| s.name != name);
        if sorters.len() == before {
            return Ok(false);
        }

        let changes = Changes {
            sorters: Some(sorters),
            ..Changes::default()
        };
        self.commit(&mut state, changes).await?;
        tracing::info!(sorter = %name, "removed sorter");
        Ok(true)
    }

    /// Ranks the realm's phrases by their distance to `phrase` under the
    /// named sorter (the default sorter when unknown), closest first.
    pub async fn find_similar(
        &self,
        phrase: &str,
        realm: impl Into<RealmRef>,
        sorter: &str,
        limit: usize,
    ) -> Result<Vec<SimilarMatch>, IndexError> {
        let mut state = self.state.lock().await;
        let (_, info) = state.resolve_realm(&realm.into());
        let metric = Metric::new(&state.sorter(sorter));
        let query = self.apply_normalizer(&info, phrase);

        let index = self.load_realm_index(&mut state, info.pk).await?;
        let mut matches: Vec<SimilarMatch> = index
            .iter()
            .map(|(entry, pk)| SimilarMatch {
                key: KeyPair::new(info.pk, *pk),
                phrase: entry.clone(),
                distance: metric.distance(&query, entry),
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.phrase.cmp(&b.phrase))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    /// Compiles every phrase of the realm into one matcher.
    pub async fn matcher(
        &self,
        realm: impl Into<RealmRef>,
        options: TrieOptions,
    ) -> Result<CompiledTrie, IndexError> {
        let mut state = self.state.lock().await;
        let (_, info) = state.resolve_realm(&realm.into());
        let index = self.load_realm_index(&mut state, info.pk).await?;
        Ok(trie::compile(index.keys(), options)?)
    }

    /// Deletes every key the index owns and starts over with only the
    /// default realm and sorter.
    pub async fn clear_all(&self) -> Result<(), IndexError> {
        let mut state = self.state.lock().await;

        let mut batch = WriteBatch::new();
        for realm in state.realm_list() {
            let index = self.load_realm_index(&mut state, realm.pk()).await?;
            for pk in index.values() {
                batch.delete(KeyPair::new(realm.pk(), *pk).to_string());
            }
            batch.delete(realm.pk().to_string());
        }
        batch.delete(INDEX_KEY);
        batch.delete(TAGS_KEY);

        let fresh = State::fresh();
        batch.put(REALMS_KEY, encode_realms(&fresh.realms)?);
        batch.put(SORTERS_KEY, serde_json::to_value(&fresh.sorters)?);

        let removed = batch.len();
        self.store.commit(batch).await?;
        *state = fresh;
        tracing::info!(keys = removed, "cleared phrase index");
        Ok(())
    }

    // --- Internals ---

    fn apply_normalizer(&self, info: &RealmInfo, phrase: &str) -> String {
        self.normalizers.get(&info.normalizer).apply(phrase)
    }

    /// Persists `changes` as one batch, then applies them in memory.
    async fn commit(&self, state: &mut State, changes: Changes) -> Result<(), IndexError> {
        if changes.is_empty() {
            return Ok(());
        }
        let batch = changes.to_batch()?;
        let keys = batch.len();
        self.store.commit(batch).await?;
        state.apply(changes);
        tracing::debug!(keys, "committed batch");
        Ok(())
    }

    async fn load_realm_index<'a>(
        &self,
        state: &'a mut State,
        realm: RealmPk,
    ) -> Result<&'a RealmIndex, IndexError> {
        if !state.realm_indexes.contains_key(&realm) {
            let key = realm.to_string();
            let index = match self.store.get(std::slice::from_ref(&key)).await?.remove(&key) {
                Some(value) => decode_pairs(&key, value)?,
                None => RealmIndex::new(),
            };
            tracing::debug!(%realm, phrases = index.len(), "loaded realm index");
            state.realm_indexes.insert(realm, index);
        }
        Ok(state.realm_indexes.entry(realm).or_default())
    }

    async fn load_record(&self, state: &mut State, key: KeyPair) -> Result<NoteRecord, IndexError> {
        self.load_records(state, [key])
            .await?
            .remove(&key)
            .ok_or_else(|| IndexError::consistency(key.to_string(), "indexed phrase has no stored record"))
    }

    /// Returns copies of the requested records, fetching uncached ones in a
    /// single read. Records absent from the store are absent from the map.
    async fn load_records(
        &self,
        state: &mut State,
        keys: impl IntoIterator<Item = KeyPair>,
    ) -> Result<HashMap<KeyPair, NoteRecord>, IndexError> {
        let keys: BTreeSet<KeyPair> = keys.into_iter().collect();
        let absent: Vec<KeyPair> = keys
            .iter()
            .filter(|key| !state.cache.contains_key(key))
            .copied()
            .collect();

        if !absent.is_empty() {
            let raw_keys: Vec<String> = absent.iter().map(KeyPair::to_string).collect();
            let mut found = self.store.get(&raw_keys).await?;
            for (key, raw) in absent.into_iter().zip(raw_keys) {
                if let Some(value) = found.remove(&raw) {
                    let record: NoteRecord = decode(&raw, value)?;
                    state.cache.insert(key, record);
                }
            }
        }

        Ok(keys
            .iter()
            .filter_map(|key| state.cache.get(key).map(|record| (*key, record.clone())))
            .collect())
    }
}

/// Checks that an edge from `source` is allowed in its realm.
fn validate_edge(
    realm_name: &str,
    info: &RealmInfo,
    source: KeyPair,
    label: &str,
    target: KeyPair,
) -> Result<(), IndexError> {
    let invalid = || IndexError::InvalidRelation {
        label: label.to_string(),
        realm: realm_name.to_string(),
    };
    if target == source {
        return Err(invalid());
    }
    if info.reverse(label).is_none() {
        return Err(invalid());
    }
    if target.realm != source.realm && label != SEE_ALSO {
        return Err(invalid());
    }
    Ok(())
}

fn reverse_label<'a>(info: &'a RealmInfo, label: &'a str) -> &'a str {
    info.reverse(label).unwrap_or(label)
}

/// Drops `realm` from the global entry `key`, and the entry once it lists
/// no realm. Returns true if anything changed.
fn unlist(global: &mut BTreeMap<String, Vec<RealmPk>>, key: &str, realm: RealmPk) -> bool {
    let Some(pks) = global.get_mut(key) else {
        return false;
    };
    let before = pks.len();
    pks.retain(|pk| *pk != realm);
    let changed = pks.len() != before;
    if pks.is_empty() {
        global.remove(key);
    }
    changed
}

/// Trims relation labels, drops blank pairs and guarantees the
/// `"see also"` pair.
fn clean_relations(relations: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut cleaned: Vec<(String, String)> = Vec::new();
    for (label, reverse) in relations {
        let pair = (collapse_whitespace(&label), collapse_whitespace(&reverse));
        if pair.0.is_empty() || pair.1.is_empty() || cleaned.contains(&pair) {
            continue;
        }
        cleaned.push(pair);
    }
    if !cleaned.iter().any(|(a, b)| a == SEE_ALSO && b == SEE_ALSO) {
        cleaned.extend(default_relations());
    }
    cleaned
}

#[cfg(test)]
mod tests;

use super::*;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::models::Relations;
use crate::store::{MemoryStore, StoreError};

type TestIndex = PhraseIndex<Arc<MemoryStore>>;

async fn open_index() -> (TestIndex, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let index = PhraseIndex::open(Arc::clone(&store), IndexConfig::default())
        .await
        .expect("failed to open index");
    (index, store)
}

fn default_realm() -> NoteData {
    NoteData::new(RealmPk::DEFAULT)
}

fn key(realm: u32, phrase: u32) -> KeyPair {
    KeyPair::new(RealmPk::new(realm), PhrasePk::new(phrase))
}

async fn record(index: &TestIndex, phrase: &str, realm: impl Into<RealmRef>) -> NoteRecord {
    index
        .find(phrase, Some(realm.into()))
        .await
        .expect("find failed")
        .found()
        .unwrap_or_else(|| panic!("{phrase:?} should be stored"))
}

/// Realm "en" (pk 1) with a hypernym/hyponym pair and realm "fr" (pk 2).
async fn with_language_realms(index: &TestIndex) {
    let en = index
        .save_realm(RealmDraft::new("en").relation("hypernym", "hyponym"))
        .await
        .unwrap();
    let fr = index.save_realm(RealmDraft::new("fr")).await.unwrap();
    assert_eq!((en.get(), fr.get()), (1, 2));
}

// --- Opening ---

#[tokio::test]
async fn open_persists_default_realm_and_sorter() {
    let (index, store) = open_index().await;

    assert_eq!(
        store.peek("realms"),
        Some(json!([["", {
            "pk": 0,
            "description": "",
            "normalizer": "",
            "relations": [["see also", "see also"]]
        }]]))
    );
    assert_eq!(index.sorters().await, vec![Sorter::default_sorter()]);
    assert_eq!(store.keys(), vec!["realms".to_string(), "sorters".to_string()]);
}

#[tokio::test]
async fn reopening_reads_everything_back_from_the_store() {
    let (index, store) = open_index().await;
    with_language_realms(&index).await;
    let cat = index.add("cat", NoteData::new("en").tag("pets")).await.unwrap();
    drop(index);

    let index = PhraseIndex::open(store, IndexConfig::default()).await.unwrap();
    assert_eq!(index.realms().await.len(), 3);
    assert_eq!(index.tags().await, vec!["pets".to_string()]);
    assert_eq!(record(&index, "cat", "en").await.key, cat);
}

#[tokio::test]
async fn open_rejects_corrupt_realm_table() {
    let store = MemoryStore::new();
    let mut batch = WriteBatch::new();
    batch.put("realms", json!({"not": "a list"}));
    store.commit(batch).await.unwrap();

    let result = PhraseIndex::open(store, IndexConfig::default()).await;
    assert!(matches!(
        result,
        Err(IndexError::ConsistencyViolation { key, .. }) if key == "realms"
    ));
}

// --- find / add ---

#[tokio::test]
async fn cat_then_dog_get_consecutive_keys() {
    let (index, _store) = open_index().await;

    let cat = index.add("cat", default_realm()).await.unwrap();
    let dog = index.add("dog", default_realm()).await.unwrap();
    assert_eq!(cat, key(0, 0));
    assert_eq!(dog, key(0, 1));

    match index.find("cat", None).await.unwrap() {
        Lookup::Found(found) => {
            assert_eq!(found.key, cat);
            assert_eq!(found.phrase, "cat");
        }
        other => panic!("expected a single match, got {other:?}"),
    }
}

#[tokio::test]
async fn find_uses_the_realm_normalizer() {
    let (index, _store) = open_index().await;
    let added = index.add("  Crème   Brûlée ", default_realm()).await.unwrap();

    let found = record(&index, "creme brulee", RealmPk::DEFAULT).await;
    assert_eq!(found.key, added);
    assert_eq!(found.phrase, "Crème Brûlée");
    assert!(index.find("creme brulees", None).await.unwrap().is_not_found());
}

#[tokio::test]
async fn unknown_realm_falls_back_to_default() {
    let (index, _store) = open_index().await;
    let added = index.add("cat", NoteData::new("nowhere")).await.unwrap();
    assert_eq!(added.realm, RealmPk::DEFAULT);

    let (name, info) = index.find_realm(99u32).await;
    assert_eq!(name, "");
    assert!(info.pk.is_default());
}

#[tokio::test]
async fn bank_in_two_realms_is_ambiguous() {
    let (index, _store) = open_index().await;
    with_language_realms(&index).await;
    index.add("bank", NoteData::new("en")).await.unwrap();
    index.add("Bank", NoteData::new("fr")).await.unwrap();

    match index.find("bank", None).await.unwrap() {
        Lookup::Ambiguous(realms) => {
            let names: Vec<&str> = realms.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["en", "fr"]);
            assert_eq!(realms[0].pk, RealmPk::new(1));
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }

    // Naming the realm resolves it.
    assert_eq!(record(&index, "bank", "fr").await.key, key(2, 0));
}

#[tokio::test]
async fn realm_specific_forms_share_one_global_entry() {
    let (index, store) = open_index().await;
    let exact = index
        .save_realm(RealmDraft::new("exact").normalizer("exact"))
        .await
        .unwrap();
    index.add("Café", NoteData::new(exact)).await.unwrap();

    assert_eq!(store.peek("index"), Some(json!([["cafe", [1]]])));
    assert_eq!(store.peek("1"), Some(json!([["café", 0]])));

    // Only the exact realm holds it; its stored form differs from the query.
    let found = index.find("cafe", None).await.unwrap().found().unwrap();
    assert_eq!(found.key, key(1, 0));

    index.add("cafe", default_realm()).await.unwrap();
    assert_eq!(store.peek("index"), Some(json!([["cafe", [1, 0]]])));
    assert!(matches!(
        index.find("CAFÉ", None).await.unwrap(),
        Lookup::Ambiguous(realms) if realms.len() == 2
    ));
}

#[tokio::test]
async fn adding_again_updates_in_place() {
    let (index, _store) = open_index().await;
    let first = index
        .add("cat", default_realm().tag("pets").annotation("meows"))
        .await
        .unwrap();
    let created = record(&index, "cat", RealmPk::DEFAULT).await.created_at;

    let second = index
        .add("CAT", default_realm().tag("felines").starred(true))
        .await
        .unwrap();
    assert_eq!(first, second);

    let updated = record(&index, "cat", RealmPk::DEFAULT).await;
    assert_eq!(updated.tags, BTreeSet::from(["felines".to_string()]));
    assert_eq!(updated.annotation, None);
    assert!(updated.starred);
    assert_eq!(updated.created_at, created);
    assert_eq!(updated.phrase, "cat");

    // The tag set only grows.
    assert_eq!(index.tags().await, vec!["felines".to_string(), "pets".to_string()]);
}

#[tokio::test]
async fn callers_get_copies_of_cached_records() {
    let (index, _store) = open_index().await;
    index.add("cat", default_realm().tag("pets")).await.unwrap();

    let mut copy = record(&index, "cat", RealmPk::DEFAULT).await;
    copy.tags.clear();
    copy.starred = true;

    let fresh = record(&index, "cat", RealmPk::DEFAULT).await;
    assert!(fresh.tags.contains("pets"));
    assert!(!fresh.starred);
}

#[tokio::test]
async fn blank_phrase_is_rejected() {
    let (index, store) = open_index().await;
    let err = index.add(" !? ", default_realm()).await.unwrap_err();
    assert!(matches!(err, IndexError::EmptyPhrase));
    assert_eq!(store.keys().len(), 2);
}

#[tokio::test]
async fn freeform_fields_are_stored_with_the_record() {
    let (index, store) = open_index().await;
    let mut data = default_realm();
    data.extra.insert("ease".to_string(), json!(2.5));
    index.add("cat", data).await.unwrap();

    assert_eq!(store.peek("0:0").unwrap()["ease"], json!(2.5));
    let found = record(&index, "cat", RealmPk::DEFAULT).await;
    assert_eq!(found.extra.get("ease"), Some(&json!(2.5)));
}

// --- Relations ---

#[tokio::test]
async fn linking_adds_the_reverse_edge() {
    let (index, _store) = open_index().await;
    with_language_realms(&index).await;
    let animal = index.add("animal", NoteData::new("en")).await.unwrap();
    let cat = index
        .add("cat", NoteData::new("en").relation("hypernym", animal))
        .await
        .unwrap();

    let animal_record = record(&index, "animal", "en").await;
    assert_eq!(animal_record.relations.get("hyponym"), &[cat]);
    let cat_record = record(&index, "cat", "en").await;
    assert_eq!(cat_record.relations.get("hypernym"), &[animal]);
}

#[tokio::test]
async fn symmetric_labels_reverse_to_themselves() {
    let (index, _store) = open_index().await;
    let dog = index.add("dog", default_realm()).await.unwrap();
    let cat = index
        .add("cat", default_realm().relation(SEE_ALSO, dog))
        .await
        .unwrap();

    assert_eq!(record(&index, "dog", RealmPk::DEFAULT).await.relations.get(SEE_ALSO), &[cat]);
}

#[tokio::test]
async fn delete_relation_removes_both_directions() {
    let (index, store) = open_index().await;
    with_language_realms(&index).await;
    let animal = index.add("animal", NoteData::new("en")).await.unwrap();
    index
        .add("cat", NoteData::new("en").relation("hypernym", animal))
        .await
        .unwrap();

    assert!(index.delete_relation("cat", "en", "hypernym", animal).await.unwrap());
    assert!(record(&index, "cat", "en").await.relations.is_empty());
    assert!(record(&index, "animal", "en").await.relations.is_empty());
    assert_eq!(store.peek("1:0").unwrap()["relations"], json!({}));

    // Already gone: no-op.
    assert!(!index.delete_relation("cat", "en", "hypernym", animal).await.unwrap());
    assert!(!index.delete_relation("nothing", "en", "hypernym", animal).await.unwrap());
}

#[tokio::test]
async fn re_adding_without_an_edge_drops_its_reverse() {
    let (index, _store) = open_index().await;
    let dog = index.add("dog", default_realm()).await.unwrap();
    index
        .add("cat", default_realm().relation(SEE_ALSO, dog))
        .await
        .unwrap();

    let mut data = NoteData::from_record(&record(&index, "cat", RealmPk::DEFAULT).await);
    data.relations = Relations::new();
    index.add("cat", data).await.unwrap();

    assert!(record(&index, "dog", RealmPk::DEFAULT).await.relations.is_empty());
}

#[tokio::test]
async fn uncached_targets_are_fetched() {
    let (index, store) = open_index().await;
    let dog = index.add("dog", default_realm()).await.unwrap();
    drop(index);

    // Fresh index, empty cache.
    let index = PhraseIndex::open(store, IndexConfig::default()).await.unwrap();
    let cat = index
        .add("cat", default_realm().relation(SEE_ALSO, dog))
        .await
        .unwrap();
    assert_eq!(record(&index, "dog", RealmPk::DEFAULT).await.relations.get(SEE_ALSO), &[cat]);
}

#[tokio::test]
async fn cached_and_uncached_records_load_together() {
    let (index, store) = open_index().await;
    with_language_realms(&index).await;
    let bank = index.add("bank", NoteData::new("en")).await.unwrap();
    index.add("river", NoteData::new("en")).await.unwrap();
    index
        .add("banque", NoteData::new("fr").relation(SEE_ALSO, bank))
        .await
        .unwrap();
    drop(index);

    // Only "bank" is cached after reopening.
    let index = PhraseIndex::open(store, IndexConfig::default()).await.unwrap();
    record(&index, "bank", "en").await;

    assert_eq!(index.remove_realm("en").await.unwrap(), 2);
    assert!(record(&index, "banque", "fr").await.relations.is_empty());
}

#[tokio::test]
async fn missing_target_is_a_consistency_violation() {
    let (index, store) = open_index().await;
    let err = index
        .add("cat", default_realm().relation(SEE_ALSO, key(0, 7)))
        .await
        .unwrap_err();

    assert!(matches!(err, IndexError::ConsistencyViolation { key, .. } if key == "0:7"));
    assert!(index.find("cat", None).await.unwrap().is_not_found());
    assert_eq!(store.keys(), vec!["realms".to_string(), "sorters".to_string()]);
}

#[tokio::test]
async fn invalid_relations_are_rejected() {
    let (index, _store) = open_index().await;
    with_language_realms(&index).await;
    let animal = index.add("animal", NoteData::new("en")).await.unwrap();
    let chien = index.add("chien", NoteData::new("fr")).await.unwrap();

    // Not in the realm vocabulary.
    let err = index
        .add("cat", NoteData::new("en").relation("synonym", animal))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidRelation { ref label, .. } if label == "synonym"));
    assert!(err.is_user_error());

    // Cross-realm edges must be "see also".
    let err = index
        .add("dog", NoteData::new("en").relation("hypernym", chien))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidRelation { .. }));

    // No self-edges.
    let err = index
        .add("animal", NoteData::new("en").relation(SEE_ALSO, animal))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidRelation { .. }));

    assert!(index.find("cat", Some("en".into())).await.unwrap().is_not_found());
}

// --- delete ---

#[tokio::test]
async fn delete_strips_reverse_edges_and_global_entry() {
    let (index, store) = open_index().await;
    let dog = index.add("dog", default_realm()).await.unwrap();
    let cat = index
        .add("cat", default_realm().relation(SEE_ALSO, dog).tag("pets"))
        .await
        .unwrap();

    assert!(index.delete("Cat", RealmPk::DEFAULT).await.unwrap());

    assert!(index.find("cat", None).await.unwrap().is_not_found());
    assert!(record(&index, "dog", RealmPk::DEFAULT).await.relations.is_empty());
    assert_eq!(store.peek(&cat.to_string()), None);
    assert_eq!(store.peek("0"), Some(json!([["dog", 0]])));
    assert_eq!(store.peek("index"), Some(json!([["dog", [0]]])));
    // Tags are never dropped by a delete.
    assert_eq!(index.tags().await, vec!["pets".to_string()]);
}

#[tokio::test]
async fn delete_keeps_global_entry_shared_by_another_phrase() {
    let (index, store) = open_index().await;
    let exact = index
        .save_realm(RealmDraft::new("exact").normalizer("exact"))
        .await
        .unwrap();
    index.add("Café", NoteData::new(exact)).await.unwrap();
    index.add("cafe", NoteData::new(exact)).await.unwrap();
    assert_eq!(store.peek("index"), Some(json!([["cafe", [1]]])));

    assert!(index.delete("café", exact).await.unwrap());
    assert_eq!(store.peek("index"), Some(json!([["cafe", [1]]])));

    assert!(index.delete("cafe", exact).await.unwrap());
    assert_eq!(store.peek("index"), Some(json!([])));
}

#[tokio::test]
async fn deleting_an_unknown_phrase_writes_nothing() {
    let (index, store) = open_index().await;
    index.add("cat", default_realm()).await.unwrap();
    let keys = store.keys();

    store.fail_writes(true);
    assert!(!index.delete("dog", RealmPk::DEFAULT).await.unwrap());
    assert_eq!(store.keys(), keys);
}

#[tokio::test]
async fn keys_are_allocated_after_the_maximum() {
    let (index, _store) = open_index().await;
    for phrase in ["a1", "b2", "c3"] {
        index.add(phrase, default_realm()).await.unwrap();
    }
    index.delete("b2", RealmPk::DEFAULT).await.unwrap();
    assert_eq!(index.add("d4", default_realm()).await.unwrap(), key(0, 3));

    index.delete("d4", RealmPk::DEFAULT).await.unwrap();
    index.delete("c3", RealmPk::DEFAULT).await.unwrap();
    assert_eq!(index.add("e5", default_realm()).await.unwrap(), key(0, 1));
}

// --- Realms ---

#[tokio::test]
async fn save_realm_creates_and_updates_by_name() {
    let (index, _store) = open_index().await;
    let pk = index
        .save_realm(RealmDraft::new("  Old   Norse ").description(" sagas\tand  runes "))
        .await
        .unwrap();
    assert_eq!(pk, RealmPk::new(1));

    let (name, info) = index.find_realm("Old Norse").await;
    assert_eq!(name, "Old Norse");
    assert_eq!(info.description, "sagas and runes");
    assert_eq!(info.normalizer, "");
    assert_eq!(info.relations, default_relations());

    let again = index
        .save_realm(RealmDraft::new("Old Norse").relation("synonym", "synonym"))
        .await
        .unwrap();
    assert_eq!(again, pk);
    let (_, info) = index.find_realm(pk).await;
    assert_eq!(info.description, "");
    assert_eq!(info.labels(), vec!["see also", "synonym"]);
    assert_eq!(index.realms().await.len(), 2);
}

#[tokio::test]
async fn normalizer_is_fixed_once_a_realm_has_phrases() {
    let (index, _store) = open_index().await;
    let pk = index.save_realm(RealmDraft::new("de")).await.unwrap();

    // Empty realm: allowed.
    index
        .save_realm(RealmDraft::new("de").normalizer("loose"))
        .await
        .unwrap();
    assert_eq!(index.find_realm(pk).await.1.normalizer, "loose");

    index.add("Straße", NoteData::new(pk)).await.unwrap();
    let err = index
        .save_realm(RealmDraft::new("de").normalizer("exact"))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::RealmNotEmpty(name) if name == "de"));

    // Same normalizer, new description: fine.
    index
        .save_realm(RealmDraft::new("de").description("German"))
        .await
        .unwrap();
}

#[tokio::test]
async fn relation_labels_in_use_cannot_be_dropped() {
    let (index, store) = open_index().await;
    let en = index
        .save_realm(RealmDraft::new("en").relation("broader", "narrower"))
        .await
        .unwrap();
    let animal = index.add("animal", NoteData::new(en)).await.unwrap();
    let cat = index
        .add("cat", NoteData::new(en).relation("broader", animal))
        .await
        .unwrap();
    let realms_before = store.peek("realms");

    for draft in [
        RealmDraft::new("en").relation(SEE_ALSO, SEE_ALSO),
        RealmDraft::new("en").relation("broader", "broader"),
    ] {
        let err = index.save_realm(draft).await.unwrap_err();
        assert!(matches!(err, IndexError::RealmNotEmpty(name) if name == "en"));
    }
    assert_eq!(index.find_realm(en).await.1.reverse("broader"), Some("narrower"));
    assert_eq!(store.peek("realms"), realms_before);

    // Unrelated labels may still be added.
    index
        .save_realm(
            RealmDraft::new("en")
                .relation("broader", "narrower")
                .relation("synonym", "synonym"),
        )
        .await
        .unwrap();

    assert!(index.delete_relation("cat", en, "broader", animal).await.unwrap());
    assert!(record(&index, "cat", en).await.relations.is_empty());
    assert!(record(&index, "animal", en).await.relations.is_empty());

    // With no edge left, the pair can go.
    index
        .save_realm(RealmDraft::new("en").relation(SEE_ALSO, SEE_ALSO))
        .await
        .unwrap();
    assert_eq!(index.find_realm(en).await.1.labels(), vec!["see also"]);
    assert_eq!(record(&index, "cat", en).await.key, cat);
}

#[tokio::test]
async fn concurrent_adds_are_serialized() {
    let (index, _store) = open_index().await;

    let (cat, dog) = tokio::join!(
        index.add("cat", default_realm()),
        index.add("dog", default_realm())
    );
    let (cat, dog) = (cat.unwrap(), dog.unwrap());

    let mut pks = vec![cat.phrase.get(), dog.phrase.get()];
    pks.sort_unstable();
    assert_eq!(pks, vec![0, 1]);
    assert_eq!(
        index.phrases(RealmPk::DEFAULT).await.unwrap(),
        vec![
            ("cat".to_string(), cat.phrase),
            ("dog".to_string(), dog.phrase)
        ]
    );
    assert_eq!(record(&index, "cat", 0u32).await.key, cat);
    assert_eq!(record(&index, "dog", 0u32).await.key, dog);
}

#[tokio::test]
async fn unknown_normalizer_behaves_like_the_default() {
    let (index, _store) = open_index().await;
    let pk = index
        .save_realm(RealmDraft::new("xx").normalizer("does-not-exist"))
        .await
        .unwrap();
    assert_eq!(index.find_realm(pk).await.1.normalizer, "does-not-exist");
    assert_eq!(index.normalize("  Ça VA ", pk).await, "ca va");
    assert_eq!(index.default_normalize("  Ça VA "), "ca va");
}

#[tokio::test]
async fn remove_realm_deletes_phrases_and_cross_realm_edges() {
    let (index, store) = open_index().await;
    with_language_realms(&index).await;
    let chien = index.add("chien", NoteData::new("fr")).await.unwrap();
    index.add("chat", NoteData::new("fr")).await.unwrap();
    let dog = index
        .add("dog", NoteData::new("en").relation(SEE_ALSO, chien))
        .await
        .unwrap();
    assert_eq!(record(&index, "chien", "fr").await.relations.get(SEE_ALSO), &[dog]);

    assert_eq!(index.remove_realm("fr").await.unwrap(), 2);

    assert!(record(&index, "dog", "en").await.relations.is_empty());
    assert!(index.find("chien", None).await.unwrap().is_not_found());
    assert!(index.realms().await.iter().all(|r| r.name != "fr"));
    assert_eq!(store.peek("2"), None);
    assert_eq!(store.peek("2:0"), None);
    assert_eq!(store.peek("index"), Some(json!([["dog", [1]]])));

    // A realm saved later reuses nothing of the removed one.
    let it = index.save_realm(RealmDraft::new("it")).await.unwrap();
    assert!(index.phrases(it).await.unwrap().is_empty());
}

#[tokio::test]
async fn default_realm_cannot_be_removed() {
    let (index, _store) = open_index().await;
    let err = index.remove_realm(RealmPk::DEFAULT).await.unwrap_err();
    assert!(matches!(err, IndexError::DefaultRealm));
    assert_eq!(index.remove_realm("missing").await.unwrap(), 0);
}

#[tokio::test]
async fn phrases_lists_realm_entries() {
    let (index, _store) = open_index().await;
    index.add("zebra", default_realm()).await.unwrap();
    index.add("Aardvark", default_realm()).await.unwrap();

    assert_eq!(
        index.phrases(RealmPk::DEFAULT).await.unwrap(),
        vec![
            ("aardvark".to_string(), PhrasePk::new(1)),
            ("zebra".to_string(), PhrasePk::new(0)),
        ]
    );
}

// --- Store failures ---

#[tokio::test]
async fn failed_write_leaves_state_untouched() {
    let (index, store) = open_index().await;
    let dog = index.add("dog", default_realm()).await.unwrap();

    store.fail_writes(true);
    let err = index
        .add("cat", default_realm().tag("pets").relation(SEE_ALSO, dog))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::Store(_)));
    assert!(matches!(
        index.save_realm(RealmDraft::new("en")).await,
        Err(IndexError::Store(_))
    ));
    store.fail_writes(false);

    assert!(index.find("cat", None).await.unwrap().is_not_found());
    assert!(record(&index, "dog", RealmPk::DEFAULT).await.relations.is_empty());
    assert!(index.tags().await.is_empty());
    assert_eq!(index.realms().await.len(), 1);
    assert_eq!(index.add("cat", default_realm()).await.unwrap(), key(0, 1));
}

#[tokio::test]
async fn failed_delete_keeps_the_phrase() {
    let (index, store) = open_index().await;
    index.add("cat", default_realm()).await.unwrap();

    store.fail_writes(true);
    assert!(index.delete("cat", RealmPk::DEFAULT).await.is_err());
    store.fail_writes(false);

    assert_eq!(record(&index, "cat", RealmPk::DEFAULT).await.key, key(0, 0));
}

#[tokio::test]
async fn read_errors_surface_unchanged() {
    let (index, store) = open_index().await;
    store.fail_reads(true);

    let err = index.find("cat", Some(RealmPk::DEFAULT.into())).await.unwrap_err();
    assert!(matches!(err, IndexError::Store(StoreError::Unavailable(_))));
    assert!(matches!(index.memfree().await, Err(IndexError::Store(_))));
}

#[tokio::test]
async fn memfree_is_capacity_minus_bytes_in_use() {
    let (index, store) = open_index().await;
    index.add("cat", default_realm().tag("pets")).await.unwrap();

    let in_use = store.bytes_in_use().await.unwrap() as i64;
    assert!(in_use > 0);
    assert_eq!(index.memfree().await.unwrap(), 5_242_880 - in_use);

    let small = PhraseIndex::open(Arc::clone(&store), IndexConfig::default().with_capacity(10))
        .await
        .unwrap();
    assert_eq!(small.memfree().await.unwrap(), 10 - in_use);
}

// --- Sorters, similarity, matchers ---

#[tokio::test]
async fn sorters_are_saved_by_name() {
    let (index, store) = open_index().await;
    let pk = index
        .save_sorter(Sorter::named("vowels").similar("aeiou"))
        .await
        .unwrap();
    assert_eq!(pk, 1);

    let again = index
        .save_sorter(Sorter::named(" vowels ").similar("aeiou").prefix(1))
        .await
        .unwrap();
    assert_eq!(again, 1);
    let sorters = index.sorters().await;
    assert_eq!(sorters.len(), 2);
    assert_eq!(sorters[1].prefix, 1);
    assert_eq!(store.peek("sorters").unwrap()[1]["name"], json!("vowels"));

    assert!(index.remove_sorter("vowels").await.unwrap());
    assert!(!index.remove_sorter("vowels").await.unwrap());
    assert!(matches!(index.remove_sorter("").await, Err(IndexError::DefaultSorter)));
    assert!(matches!(
        index.save_sorter(Sorter::named("").prefix(2)).await,
        Err(IndexError::DefaultSorter)
    ));
}

#[tokio::test]
async fn similar_phrases_rank_by_distance() {
    let (index, _store) = open_index().await;
    for phrase in ["dog", "cut", "cat", "cart"] {
        index.add(phrase, default_realm()).await.unwrap();
    }

    let ranked = index
        .find_similar("Cat", RealmPk::DEFAULT, "", 3)
        .await
        .unwrap();
    let phrases: Vec<(&str, f64)> = ranked
        .iter()
        .map(|m| (m.phrase.as_str(), m.distance))
        .collect();
    assert_eq!(phrases, vec![("cat", 0.0), ("cart", 1.0), ("cut", 1.0)]);
    assert_eq!(ranked[0].key, key(0, 2));
}

#[tokio::test]
async fn sorter_weights_change_the_ranking() {
    let (index, _store) = open_index().await;
    index
        .save_sorter(Sorter::named("vowels").similar("aeiou"))
        .await
        .unwrap();
    for phrase in ["cut", "cab"] {
        index.add(phrase, default_realm()).await.unwrap();
    }

    let plain = index.find_similar("cat", RealmPk::DEFAULT, "", 2).await.unwrap();
    assert_eq!(plain[0].phrase, "cab");

    let weighted = index
        .find_similar("cat", RealmPk::DEFAULT, "vowels", 2)
        .await
        .unwrap();
    assert_eq!(weighted[0].phrase, "cut");
    assert_eq!(weighted[0].distance, 0.5);
}

#[tokio::test]
async fn matcher_covers_every_phrase_of_a_realm() {
    let (index, _store) = open_index().await;
    with_language_realms(&index).await;
    index.add("hot dog", NoteData::new("en")).await.unwrap();
    index.add("cat", NoteData::new("en")).await.unwrap();
    index.add("chat", NoteData::new("fr")).await.unwrap();

    let trie = index.matcher("en", TrieOptions::default()).await.unwrap();
    let text = "A cat ate a hot  dog; the chat did not.";
    let found: Vec<&str> = trie.find_iter(text).into_iter().map(|r| &text[r]).collect();
    assert_eq!(found, vec!["cat", "hot  dog"]);

    let empty = index.matcher(RealmPk::DEFAULT, TrieOptions::default()).await.unwrap();
    assert!(empty.is_empty());
}

// --- clear_all ---

#[tokio::test]
async fn clear_all_starts_over() {
    let (index, store) = open_index().await;
    with_language_realms(&index).await;
    index.add("cat", NoteData::new("en").tag("pets")).await.unwrap();
    index.add("dog", default_realm()).await.unwrap();
    index.save_sorter(Sorter::named("loose")).await.unwrap();

    index.clear_all().await.unwrap();

    assert_eq!(store.keys(), vec!["realms".to_string(), "sorters".to_string()]);
    assert!(index.tags().await.is_empty());
    assert_eq!(index.realms().await.len(), 1);
    assert_eq!(index.sorters().await.len(), 1);
    assert!(index.find("dog", None).await.unwrap().is_not_found());
    assert_eq!(index.add("cat", default_realm()).await.unwrap(), key(0, 0));
}

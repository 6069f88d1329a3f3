pub mod config;
pub mod distance;
pub mod error;
pub mod index;
pub mod models;
pub mod normalizer;
pub mod store;
pub mod trie;
pub mod utils;

pub use config::IndexConfig;
pub use error::IndexError;
pub use index::{Lookup, PhraseIndex, RealmSummary, SimilarMatch};
pub use models::{
    Citation, KeyPair, NoteData, NoteRecord, PhrasePk, Realm, RealmDraft, RealmInfo, RealmPk,
    RealmRef, Relations, SEE_ALSO, Sorter,
};
pub use normalizer::{Normalizer, NormalizerRegistry};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError, WriteBatch};
pub use trie::{CompiledTrie, TrieOptions};

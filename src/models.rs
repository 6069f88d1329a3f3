mod ids;
mod note;
mod realm;
mod relations;
mod sorter;

pub use ids::{KeyPair, ParseKeyPairError, PhrasePk, RealmPk};
pub use note::{Citation, NoteData, NoteRecord};
pub use realm::{Realm, RealmDraft, RealmInfo, RealmRef, SEE_ALSO, default_relations};
pub use relations::Relations;
pub use sorter::Sorter;

//! The two collaborator seams of the mirror: an anonymous identity
//! provider and a remote document store.
//!
//! Remote layout, relative to `rooms/{sync key}`:
//!
//! | path | contents |
//! |---|---|
//! | `polishes/{id}` | one [`Polish`](lacquer_shared::Polish) + `updatedAt` |
//! | `tools/{id}` | one [`Tool`](lacquer_shared::Tool) + `updatedAt` |
//! | `manis/{id}` | one [`Manicure`](lacquer_shared::Manicure) + `updatedAt` |
//! | `meta/settings` | settings without the sync key + `updatedAt` |

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use lacquer_shared::constants::{REMOTE_META, REMOTE_SETTINGS_DOC};
use lacquer_shared::{Collection, Record};

use crate::error::SyncError;

/// A remote document: a flat JSON object.
pub type Document = Map<String, Value>;

/// The full contents of one feed at a point in time, ordered by id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub documents: Vec<(String, Document)>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, doc)| doc)
    }

    /// Decode every document as `T`. Documents that do not decode are
    /// skipped; a missing `id` field is filled in from the document key.
    pub fn decode<T: Record>(&self) -> Vec<T> {
        self.documents
            .iter()
            .filter_map(|(id, doc)| {
                let mut doc = doc.clone();
                doc.entry("id").or_insert_with(|| Value::String(id.clone()));
                match serde_json::from_value::<T>(Value::Object(doc)) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(collection = %T::COLLECTION, id = %id, error = %e, "Skipping undecodable remote document");
                        None
                    }
                }
            })
            .collect()
    }
}

/// One subscribable feed inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedTarget {
    Collection(Collection),
    Settings,
}

impl FeedTarget {
    pub const ALL: [FeedTarget; 4] = [
        Self::Collection(Collection::Polishes),
        Self::Collection(Collection::Tools),
        Self::Collection(Collection::Manicures),
        Self::Settings,
    ];

    /// Remote sub-collection backing this feed.
    pub fn remote_collection(self) -> &'static str {
        match self {
            Self::Collection(collection) => collection.remote_name(),
            Self::Settings => REMOTE_META,
        }
    }

    /// Whether a document in `collection` with `id` belongs to this feed.
    pub fn contains(self, collection: &str, id: &str) -> bool {
        match self {
            Self::Collection(_) => collection == self.remote_collection(),
            Self::Settings => collection == REMOTE_META && id == REMOTE_SETTINGS_DOC,
        }
    }
}

impl std::fmt::Display for FeedTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collection(collection) => write!(f, "{collection}"),
            Self::Settings => write!(f, "{REMOTE_META}/{REMOTE_SETTINGS_DOC}"),
        }
    }
}

/// Location of one document inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn record(collection: Collection, id: &str) -> Self {
        Self {
            collection: collection.remote_name().to_string(),
            id: id.to_string(),
        }
    }

    pub fn settings() -> Self {
        Self {
            collection: REMOTE_META.to_string(),
            id: REMOTE_SETTINGS_DOC.to_string(),
        }
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// An anonymous identity confirmed by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Obtains an anonymous identity.
///
/// Implementations must be idempotent: calling repeatedly returns the same
/// identity once one exists.
pub trait IdentityProvider: Send + Sync {
    fn ensure_identity(&self) -> BoxFuture<'_, Result<Identity, SyncError>>;
}

/// A shared document store with merge-upserts and live snapshot feeds.
pub trait RemoteStore: Send + Sync {
    /// Create or merge `doc` into the document at `path`. Fields absent
    /// from `doc` keep their remote value; the store stamps `updatedAt`.
    fn upsert<'a>(
        &'a self,
        room: &'a str,
        path: &'a DocPath,
        doc: Document,
    ) -> BoxFuture<'a, Result<(), SyncError>>;

    /// Open a feed. The stream yields the current snapshot right away and
    /// again after every change; dropping it releases the subscription.
    fn subscribe<'a>(
        &'a self,
        room: &'a str,
        target: FeedTarget,
    ) -> BoxFuture<'a, Result<BoxStream<'static, Snapshot>, SyncError>>;
}

/// Serialize a record into a remote document. Cleared optional fields are
/// written as `null` so the merge on the remote side drops the old value.
pub fn record_to_document<T: Record>(record: &T) -> Result<Document, SyncError> {
    match serde_json::to_value(record)? {
        Value::Object(mut doc) => {
            for field in T::CLEARABLE {
                doc.entry(*field).or_insert(Value::Null);
            }
            Ok(doc)
        }
        other => Err(SyncError::Remote(format!(
            "record {} did not serialize to an object: {other}",
            record.id()
        ))),
    }
}

// Best-effort mirroring of the local state tree to a shared remote
// document store, scoped by a household sync key.

pub mod error;
pub mod http;
pub mod memory;
pub mod mirror;
pub mod reconcile;
pub mod remote;

pub use error::SyncError;
pub use http::HttpRemote;
pub use memory::MemoryRemote;
pub use lacquer_shared::MergePolicy;
pub use mirror::{spawn_mirror, ActionSink, MirrorConfig, MirrorHandle};
pub use reconcile::Baseline;
pub use remote::{DocPath, Document, FeedTarget, Identity, IdentityProvider, RemoteStore, Snapshot};

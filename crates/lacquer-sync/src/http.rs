//! HTTP adapter for a hosted document service.
//!
//! Endpoints, relative to the base URL:
//!
//! - `POST  v1/identity/anonymous` → `{"uid": ..., "token": ...}`
//! - `PATCH v1/rooms/{room}/{collection}/{id}` with the document as body
//!   (merge semantics; the service stamps `updatedAt`)
//! - `GET   v1/rooms/{room}/{collection}` → `{"documents": {id: doc}}`
//!
//! The service has no push channel, so feeds poll the collection and only
//! yield when the snapshot actually changed.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::remote::{DocPath, Document, FeedTarget, Identity, IdentityProvider, RemoteStore, Snapshot};

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    documents: BTreeMap<String, Document>,
}

/// Decode a collection listing into a snapshot of `target`.
fn parse_listing(body: &str, target: FeedTarget) -> Result<Snapshot, SyncError> {
    let listing: Listing = serde_json::from_str(body)?;
    let collection = target.remote_collection();
    Ok(Snapshot {
        documents: listing
            .documents
            .into_iter()
            .filter(|(id, _)| target.contains(collection, id))
            .collect(),
    })
}

pub struct HttpRemote {
    client: Client,
    base: Url,
    poll_interval: Duration,
    identity: Mutex<Option<Identity>>,
}

impl HttpRemote {
    pub fn new(base_url: &str, poll_interval: Duration) -> Result<Self, SyncError> {
        let base = Url::parse(base_url).map_err(|e| SyncError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base,
            poll_interval,
            identity: Mutex::new(None),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    async fn bearer(&self) -> Option<String> {
        self.identity
            .lock()
            .await
            .as_ref()
            .and_then(|id| id.token.clone())
    }

    async fn fetch_identity(&self) -> Result<Identity, SyncError> {
        let url = self.url(&["identity", "anonymous"])?;
        let identity: Identity = self
            .client
            .post(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(identity)
    }
}

async fn fetch_snapshot(
    client: &Client,
    url: Url,
    token: Option<&str>,
    target: FeedTarget,
) -> Result<Snapshot, SyncError> {
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let body = request.send().await?.error_for_status()?.text().await?;
    parse_listing(&body, target)
}

impl IdentityProvider for HttpRemote {
    fn ensure_identity(&self) -> BoxFuture<'_, Result<Identity, SyncError>> {
        async move {
            let mut cached = self.identity.lock().await;
            if let Some(identity) = cached.as_ref() {
                return Ok(identity.clone());
            }
            let identity = self.fetch_identity().await?;
            info!(uid = %identity.uid, "Obtained anonymous identity");
            *cached = Some(identity.clone());
            Ok(identity)
        }
        .boxed()
    }
}

impl RemoteStore for HttpRemote {
    fn upsert<'a>(
        &'a self,
        room: &'a str,
        path: &'a DocPath,
        doc: Document,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        async move {
            let url = self.url(&["rooms", room, path.collection.as_str(), path.id.as_str()])?;
            let mut request = self.client.patch(url).json(&doc);
            if let Some(token) = self.bearer().await {
                request = request.bearer_auth(token);
            }
            request.send().await?.error_for_status()?;
            debug!(room, path = %path, "Upserted document");
            Ok(())
        }
        .boxed()
    }

    fn subscribe<'a>(
        &'a self,
        room: &'a str,
        target: FeedTarget,
    ) -> BoxFuture<'a, Result<BoxStream<'static, Snapshot>, SyncError>> {
        async move {
            let url = self.url(&["rooms", room, target.remote_collection()])?;
            let client = self.client.clone();
            let token = self.bearer().await;
            let interval = self.poll_interval;

            let feed = futures::stream::unfold(
                (None::<Snapshot>, true),
                move |(mut last, mut first)| {
                    let client = client.clone();
                    let url = url.clone();
                    let token = token.clone();
                    async move {
                        loop {
                            if !first {
                                tokio::time::sleep(interval).await;
                            }
                            first = false;
                            match fetch_snapshot(&client, url.clone(), token.as_deref(), target).await {
                                Ok(snapshot) if last.as_ref() != Some(&snapshot) => {
                                    last = Some(snapshot.clone());
                                    return Some((snapshot, (last, false)));
                                }
                                Ok(_) => {}
                                Err(e) => warn!(feed = %target, error = %e, "Snapshot poll failed"),
                            }
                        }
                    }
                },
            );
            Ok(feed.boxed())
        }
        .boxed()
    }
}

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use lacquer_sync::{spawn_mirror, HttpRemote, IdentityProvider, MirrorConfig, MirrorHandle, RemoteStore};
use tracing::info;

use super::settings::{update_settings, SettingsChange};
use crate::config::ClientConfig;
use crate::runtime::RuntimeHandle;

/// Attach a mirror to the runtime's state feed and action queue.
pub fn start_mirror<R>(runtime: &RuntimeHandle, remote: Arc<R>, config: MirrorConfig) -> MirrorHandle
where
    R: RemoteStore + IdentityProvider + 'static,
{
    spawn_mirror(remote.clone(), remote, config, runtime.subscribe(), runtime.sender())
}

/// Mirror against the configured HTTP remote until Ctrl+C.
pub async fn run_sync(runtime: &RuntimeHandle, config: &ClientConfig, key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        update_settings(
            runtime,
            SettingsChange {
                sync_key: Some(key),
                ..SettingsChange::default()
            },
        )
        .await?;
    }

    let state = runtime.state();
    let Some(room) = state.settings.active_sync_key() else {
        bail!("no sync key set; pass --key or run `lacquer settings set --sync-key <KEY>`");
    };

    let url = config
        .remote_url
        .as_deref()
        .context("LACQUER_REMOTE_URL is not set")?;
    let remote = Arc::new(HttpRemote::new(url, config.poll_interval)?);

    let mirror = start_mirror(runtime, remote, config.mirror_config());
    info!(room, remote = %url, policy = ?config.merge_policy, "Mirroring, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;

    mirror.shutdown().await;
    info!("Mirror stopped");
    Ok(())
}

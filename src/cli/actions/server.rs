use crate::cli::actions::Action;
use crate::keys::ServerKeys;
use crate::nectar::{self, ServerOptions};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Handle the server action
///
/// # Errors
///
/// Returns an error when a startup precondition fails: unreadable keys, an
/// unusable FTS directory, or the server itself failing to come up. All of
/// these abort the process.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        dsn,
        private_key,
        public_key,
        fts_dir,
        send_system_data,
    } = action;

    let keys = ServerKeys::load(&private_key, &public_key)
        .context("Failed to load the server ES384 key pair")?;

    let fts_root = prepare_fts_root(&fts_dir)?;

    info!("FTS root: {}", fts_root.display());

    nectar::new(
        port,
        dsn,
        ServerOptions {
            keys,
            fts_root,
            send_system_data,
        },
    )
    .await
}

/// Ensure the FTS root and its public subtree exist before serving.
fn prepare_fts_root(fts_dir: &Path) -> Result<PathBuf> {
    let public = fts_dir.join("public");
    std::fs::create_dir_all(&public)
        .with_context(|| format!("Failed to create FTS directory {}", public.display()))?;
    Ok(fts_dir.to_path_buf())
}

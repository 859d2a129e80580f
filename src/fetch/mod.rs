//! Dataset retrieval: fetch a CSV over HTTP (or read it from disk), keep an
//! unmodified local copy, and parse it into a [`RawTable`].

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::output::print_table_summary;
use crate::table::RawTable;

/// GETs `url` and returns the body. Non-success statuses are errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// True for `http://` and `https://` sources; anything else is a local path.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Path of the local copy of dataset `name`.
pub fn local_copy_path(out_dir: &Path, name: &str) -> PathBuf {
    out_dir.join(format!("{name}.csv"))
}

/// Retrieves `source` (an `http(s)` URL or a local path), writes the bytes
/// unmodified to `<out_dir>/<name>.csv`, and parses them.
#[tracing::instrument(skip(client, source, out_dir), fields(source = %source))]
pub async fn fetch_dataset<C: HttpClient>(
    client: &C,
    source: &str,
    name: &str,
    out_dir: &Path,
) -> Result<RawTable> {
    let fetch_start = std::time::Instant::now();

    let bytes = if is_remote(source) {
        fetch_bytes(client, source)
            .await
            .with_context(|| format!("fetching {name} from {source}"))?
    } else {
        tokio::fs::read(source)
            .await
            .with_context(|| format!("reading {name} from {source}"))?
    };

    debug!(
        bytes = bytes.len(),
        elapsed_ms = fetch_start.elapsed().as_millis() as u64,
        "Dataset bytes received"
    );

    store_dataset(&bytes, name, out_dir).await
}

/// Writes the local copy and parses the table.
pub async fn store_dataset(bytes: &[u8], name: &str, out_dir: &Path) -> Result<RawTable> {
    let path = local_copy_path(out_dir, name);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("writing local copy {}", path.display()))?;
    info!(path = %path.display(), "Saved local copy");

    let table = RawTable::from_csv_bytes(name, bytes)
        .with_context(|| format!("parsing {name} as CSV"))?;
    print_table_summary(&table);

    Ok(table)
}

use anyhow::Context;
use tracing::instrument;

use crate::endpoint::Endpoint;

#[derive(Copy, Clone, Debug, Default)]
pub struct Summary {
    pub entries: usize,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entries listed: {}", self.entries)
    }
}

/// Lists a directory one level deep, sorted by name, with directories suffixed by `/`.
/// A file lists as itself.
#[instrument]
pub async fn ls(endpoint: &Endpoint) -> anyhow::Result<Vec<String>> {
    let path = endpoint.local_path("ls")?;
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &path))?;
    if !metadata.is_dir() {
        return Ok(vec![path.display().to_string()]);
    }
    let mut entries = tokio::fs::read_dir(path)
        .await
        .with_context(|| format!("cannot open directory {:?} for reading", path))?;
    let mut names = vec![];
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {:?}", &path))?
    {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    tracing::debug!("listed {} entries in {:?}", names.len(), path);
    Ok(names)
}

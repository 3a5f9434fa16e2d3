use anyhow::{anyhow, Context, Result};
use async_recursion::async_recursion;
use tracing::instrument;

use crate::endpoint::Endpoint;

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub recursive: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub files_removed: usize,
    pub directories_removed: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files_removed: self.files_removed + other.files_removed,
            directories_removed: self.directories_removed + other.directories_removed,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "files removed: {}\n\
            directories removed: {}",
            self.files_removed, self.directories_removed
        )
    }
}

/// Removes the file behind `endpoint`. Directories are removed only with `recursive` set.
#[instrument]
pub async fn rm(endpoint: &Endpoint, settings: &Settings) -> Result<Summary> {
    let path = endpoint.local_path("rm")?;
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &path))?;
    if metadata.is_dir() && !settings.recursive {
        return Err(anyhow!(
            "{:?} is a directory, did you intend to specify --recursive?",
            path
        ));
    }
    rm_path(path).await
}

#[async_recursion]
async fn rm_path(path: &std::path::Path) -> Result<Summary> {
    tracing::debug!("remove: {:?}", path);
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &path))?;
    if !metadata.is_dir() {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("failed removing {:?}", &path))?;
        return Ok(Summary {
            files_removed: 1,
            ..Default::default()
        });
    }
    let mut entries = tokio::fs::read_dir(path)
        .await
        .with_context(|| format!("cannot open directory {:?} for reading", path))?;
    let mut join_set = tokio::task::JoinSet::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {:?}", &path))?
    {
        let entry_path = entry.path();
        let do_rm = || async move { rm_path(&entry_path).await };
        join_set.spawn(do_rm());
    }
    let mut summary = Summary::default();
    let mut errors = vec![];
    while let Some(res) = join_set.join_next().await {
        match res? {
            Ok(entry_summary) => summary = summary + entry_summary,
            Err(error) => errors.push(error),
        }
    }
    if !errors.is_empty() {
        tracing::debug!("remove: {:?} failed with: {:?}", path, &errors);
        return Err(anyhow!("{:?}", &errors));
    }
    tokio::fs::remove_dir(path)
        .await
        .with_context(|| format!("failed removing directory {:?}", &path))?;
    summary.directories_removed += 1;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils;

    #[tokio::test]
    async fn removes_single_file() -> Result<()> {
        let tmp_dir = testutils::setup_test_dir().await?;
        let file = tmp_dir.path().join("foo").join("0.txt");
        let summary = rm(
            &Endpoint::File(file.clone()),
            &Settings { recursive: false },
        )
        .await?;
        assert_eq!(summary.files_removed, 1);
        assert!(!file.exists());
        Ok(())
    }

    #[tokio::test]
    async fn directory_requires_recursive() -> Result<()> {
        let tmp_dir = testutils::setup_test_dir().await?;
        let foo = tmp_dir.path().join("foo");
        let err = rm(&Endpoint::File(foo.clone()), &Settings { recursive: false })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--recursive"));
        assert!(foo.exists());
        Ok(())
    }

    #[tokio::test]
    async fn removes_tree_recursively() -> Result<()> {
        let tmp_dir = testutils::setup_test_dir().await?;
        let foo = tmp_dir.path().join("foo");
        let summary = rm(&Endpoint::File(foo.clone()), &Settings { recursive: true }).await?;
        assert_eq!(
            summary,
            Summary {
                files_removed: 4,
                directories_removed: 3,
            }
        );
        assert!(!foo.exists());
        Ok(())
    }

    #[tokio::test]
    async fn object_endpoint_is_unsupported() -> Result<()> {
        let endpoint = crate::parse_uri("b2://bucket/key")?;
        let err = rm(&endpoint, &Settings { recursive: true })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not available"));
        Ok(())
    }
}

use anyhow::Context;
use tracing::instrument;

use crate::endpoint::Endpoint;

/// Attributes of a single file, printed as right-aligned `key: value` lines.
#[derive(Debug, Clone, Default)]
pub struct Info {
    fields: Vec<(&'static str, String)>,
}

impl Info {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
    }
}

impl std::fmt::Display for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.fields.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in &self.fields {
            writeln!(f, "{key:>width$}: {value}")?;
        }
        Ok(())
    }
}

fn file_type(metadata: &std::fs::Metadata) -> &'static str {
    let file_type = metadata.file_type();
    if file_type.is_dir() {
        "directory"
    } else if file_type.is_symlink() {
        "symlink"
    } else if file_type.is_file() {
        "file"
    } else {
        "other"
    }
}

#[instrument]
pub async fn stat(endpoint: &Endpoint) -> anyhow::Result<Info> {
    let path = endpoint.local_path("stat")?;
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &path))?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
    let mut fields = vec![
        ("Name", name),
        ("Size", bytesize::ByteSize(metadata.len()).to_string()),
        ("Type", file_type(&metadata).to_string()),
    ];
    if let Ok(modified) = metadata.modified() {
        fields.push((
            "Modified",
            humantime::format_rfc3339_seconds(modified).to_string(),
        ));
    }
    Ok(Info { fields })
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};

pub type Reader = Box<dyn AsyncRead + Unpin + Send>;
pub type Writer = Box<dyn AsyncWrite + Unpin + Send>;

/// Object-storage services reachable through `scheme://bucket/object` URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gcs,
    B2,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Gcs => write!(f, "gcs"),
            Backend::B2 => write!(f, "b2"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}: unknown scheme")]
    UnknownScheme(String),
    #[error("{0}: missing bucket name")]
    MissingBucket(String),
    #[error("empty path")]
    EmptyPath,
    #[error("{0} backend is not available in this build")]
    UnsupportedBackend(Backend),
    #[error("{0} is not supported on standard input/output")]
    StandardStream(&'static str),
}

/// Where bytes come from or go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `-`: stdin when reading, stdout when writing
    Std,
    File(PathBuf),
    Object {
        backend: Backend,
        bucket: String,
        object: String,
    },
}

static SCHEME_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*)://(?P<rest>.*)$").unwrap()
});

/// Resolves a command-line URI to an endpoint.
///
/// Accepts `-`, `file://<path>`, `gcs://<bucket>/<object>`, `b2://<bucket>/<object>` and bare
/// paths. Anything with another `scheme://` prefix is rejected.
pub fn parse_uri(uri: &str) -> Result<Endpoint, Error> {
    if uri == "-" {
        return Ok(Endpoint::Std);
    }
    let Some(captures) = SCHEME_RE.captures(uri) else {
        if uri.is_empty() {
            return Err(Error::EmptyPath);
        }
        return Ok(Endpoint::File(PathBuf::from(uri)));
    };
    let scheme = captures["scheme"].to_ascii_lowercase();
    let rest = &captures["rest"];
    let backend = match scheme.as_str() {
        "file" => {
            if rest.is_empty() {
                return Err(Error::EmptyPath);
            }
            return Ok(Endpoint::File(PathBuf::from(rest)));
        }
        "gcs" => Backend::Gcs,
        "b2" => Backend::B2,
        _ => return Err(Error::UnknownScheme(scheme)),
    };
    let (bucket, object) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(Error::MissingBucket(uri.to_string()));
    }
    Ok(Endpoint::Object {
        backend,
        bucket: bucket.to_string(),
        object: object.to_string(),
    })
}

/// Parses comma-separated `key=value` pairs. Entries without `=` are skipped; keys and values
/// are trimmed.
pub fn parse_labels(labels: &str) -> BTreeMap<String, String> {
    labels
        .split(',')
        .filter_map(|label| label.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

impl Endpoint {
    pub fn is_local(&self) -> bool {
        !matches!(self, Endpoint::Object { .. })
    }

    pub async fn reader(&self) -> anyhow::Result<Reader> {
        match self {
            Endpoint::Std => Ok(Box::new(tokio::io::stdin())),
            Endpoint::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("cannot open {:?} for reading", path))?;
                Ok(Box::new(file))
            }
            Endpoint::Object { backend, .. } => Err(Error::UnsupportedBackend(*backend).into()),
        }
    }

    pub async fn writer(&self) -> anyhow::Result<Writer> {
        match self {
            Endpoint::Std => Ok(Box::new(tokio::io::stdout())),
            Endpoint::File(path) => {
                let file = tokio::fs::File::create(path)
                    .await
                    .with_context(|| format!("cannot open {:?} for writing", path))?;
                Ok(Box::new(file))
            }
            Endpoint::Object { backend, .. } => Err(Error::UnsupportedBackend(*backend).into()),
        }
    }

    /// The local path behind this endpoint, for operations that only make sense on files.
    pub fn local_path(&self, operation: &'static str) -> Result<&Path, Error> {
        match self {
            Endpoint::Std => Err(Error::StandardStream(operation)),
            Endpoint::File(path) => Ok(path),
            Endpoint::Object { backend, .. } => Err(Error::UnsupportedBackend(*backend)),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Std => write!(f, "-"),
            Endpoint::File(path) => write!(f, "{}", path.display()),
            Endpoint::Object {
                backend,
                bucket,
                object,
            } => write!(f, "{backend}://{bucket}/{object}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn dash_is_standard_stream() -> Result<()> {
        assert_eq!(parse_uri("-")?, Endpoint::Std);
        Ok(())
    }

    #[test]
    fn bare_and_file_paths() -> Result<()> {
        assert_eq!(
            parse_uri("/tmp/data.bin")?,
            Endpoint::File(PathBuf::from("/tmp/data.bin"))
        );
        assert_eq!(
            parse_uri("relative/data.bin")?,
            Endpoint::File(PathBuf::from("relative/data.bin"))
        );
        assert_eq!(
            parse_uri("file:///tmp/data.bin")?,
            Endpoint::File(PathBuf::from("/tmp/data.bin"))
        );
        assert_eq!(
            parse_uri("FILE:///tmp/x")?,
            Endpoint::File(PathBuf::from("/tmp/x"))
        );
        Ok(())
    }

    #[test]
    fn object_uris() -> Result<()> {
        assert_eq!(
            parse_uri("gcs://bucket/dir/object.tar")?,
            Endpoint::Object {
                backend: Backend::Gcs,
                bucket: "bucket".to_string(),
                object: "dir/object.tar".to_string(),
            }
        );
        assert_eq!(
            parse_uri("b2://bucket")?,
            Endpoint::Object {
                backend: Backend::B2,
                bucket: "bucket".to_string(),
                object: String::new(),
            }
        );
        Ok(())
    }

    #[test]
    fn rejects_bad_uris() {
        assert!(matches!(
            parse_uri("s3://bucket/key"),
            Err(Error::UnknownScheme(scheme)) if scheme == "s3"
        ));
        assert!(matches!(parse_uri("gcs:///object"), Err(Error::MissingBucket(_))));
        assert!(matches!(parse_uri(""), Err(Error::EmptyPath)));
        assert!(matches!(parse_uri("file://"), Err(Error::EmptyPath)));
    }

    #[test]
    fn labels_skip_malformed_entries() {
        let labels = parse_labels(" owner = ops ,broken, tier=cold,empty=");
        assert_eq!(labels.len(), 3);
        assert_eq!(labels["owner"], "ops");
        assert_eq!(labels["tier"], "cold");
        assert_eq!(labels["empty"], "");
        assert!(parse_labels("").is_empty());
    }

    #[test]
    fn display_round_trips_object_uri() -> Result<()> {
        let endpoint = parse_uri("b2://media/2024/clip.mov")?;
        assert_eq!(endpoint.to_string(), "b2://media/2024/clip.mov");
        assert!(!endpoint.is_local());
        Ok(())
    }

    #[test]
    fn local_path_only_for_files() -> Result<()> {
        assert_eq!(
            parse_uri("/var/tmp")?.local_path("stat")?,
            Path::new("/var/tmp")
        );
        assert!(matches!(
            Endpoint::Std.local_path("stat"),
            Err(Error::StandardStream("stat"))
        ));
        assert!(matches!(
            parse_uri("gcs://b/o")?.local_path("rm"),
            Err(Error::UnsupportedBackend(Backend::Gcs))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn object_backends_cannot_be_opened() -> Result<()> {
        let endpoint = parse_uri("gcs://bucket/object")?;
        let err = endpoint.reader().await.err().unwrap();
        assert!(err.to_string().contains("gcs backend is not available"));
        assert!(endpoint.writer().await.is_err());
        Ok(())
    }
}

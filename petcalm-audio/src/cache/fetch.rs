//! Network access for the offline cache
//!
//! The cache only needs "give me the bytes for this path". `HttpNetwork`
//! answers over HTTP GET; `BundleDirectory` answers from a local directory
//! of bundled assets.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("petcalm-audio/", env!("CARGO_PKG_VERSION"));

/// Response body plus its content type, if known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch `path`; any failure is `Error::ResourceUnavailable`
    async fn fetch(&self, path: &str) -> Result<FetchedAsset>;
}

/// HTTP GET against a base URL (absolute URLs are fetched as-is)
pub struct HttpNetwork {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpNetwork {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.map(|b| b.trim_end_matches('/').to_string()),
        })
    }

    fn resolve(&self, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        match &self.base_url {
            Some(base) if path.starts_with('/') => Ok(format!("{}{}", base, path)),
            Some(base) => Ok(format!("{}/{}", base, path)),
            None => Err(Error::ResourceUnavailable {
                url: path.to_string(),
                reason: "no base URL configured".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, path: &str) -> Result<FetchedAsset> {
        let url = self.resolve(path)?;
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::ResourceUnavailable {
                url,
                reason: format!("HTTP {}", status),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        Ok(FetchedAsset {
            bytes,
            content_type,
        })
    }
}

/// Serves request paths from a directory of bundled assets
pub struct BundleDirectory {
    root: PathBuf,
}

impl BundleDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a request path onto a file under the root; `/` is the index page
    fn locate(&self, path: &str) -> Result<PathBuf> {
        let path = strip_query(path).trim_start_matches('/');
        let relative = if path.is_empty() { "index.html" } else { path };

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::ResourceUnavailable {
                url: relative.display().to_string(),
                reason: "path escapes bundle directory".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Network for BundleDirectory {
    async fn fetch(&self, path: &str) -> Result<FetchedAsset> {
        let file = self.locate(path)?;
        let bytes = tokio::fs::read(&file)
            .await
            .map_err(|e| Error::ResourceUnavailable {
                url: path.to_string(),
                reason: format!("{}: {}", file.display(), e),
            })?;

        Ok(FetchedAsset {
            content_type: guess_content_type(&file).map(str::to_string),
            bytes,
        })
    }
}

/// Path without `?query` or `#fragment`
pub fn strip_query(path: &str) -> &str {
    path.split(|c| c == '?' || c == '#').next().unwrap_or(path)
}

fn guess_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "html" => "text/html",
        "js" => "application/javascript",
        "css" => "text/css",
        "json" => "application/json",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_bundle_directory_serves_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sounds")).unwrap();
        std::fs::write(dir.path().join("sounds/rain.mp3"), b"mp3").unwrap();
        std::fs::write(dir.path().join("index.html"), b"<html>").unwrap();

        let bundle = BundleDirectory::new(dir.path());
        let asset = bundle.fetch("/sounds/rain.mp3?v=2").await.unwrap();
        assert_eq!(asset.bytes, b"mp3");
        assert_eq!(asset.content_type.as_deref(), Some("audio/mpeg"));

        let index = bundle.fetch("/").await.unwrap();
        assert_eq!(index.bytes, b"<html>");
    }

    #[tokio::test]
    async fn test_bundle_directory_errors() {
        let dir = TempDir::new().unwrap();
        let bundle = BundleDirectory::new(dir.path());

        let missing = bundle.fetch("/sounds/none.mp3").await.unwrap_err();
        assert!(matches!(missing, Error::ResourceUnavailable { .. }));

        let escape = bundle.fetch("/../secret").await.unwrap_err();
        assert!(matches!(escape, Error::ResourceUnavailable { .. }));
    }

    #[test]
    fn test_http_resolve() {
        let network = HttpNetwork::new(Some("https://cdn.example.com/".to_string())).unwrap();
        assert_eq!(
            network.resolve("/sounds/a.mp3").unwrap(),
            "https://cdn.example.com/sounds/a.mp3"
        );
        assert_eq!(
            network.resolve("https://pixabay.com/x.mp3").unwrap(),
            "https://pixabay.com/x.mp3"
        );

        let unbased = HttpNetwork::new(None).unwrap();
        assert!(unbased.resolve("/index.html").is_err());
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("/a.mp3?x=1#t"), "/a.mp3");
        assert_eq!(strip_query("/a.mp3"), "/a.mp3");
    }
}

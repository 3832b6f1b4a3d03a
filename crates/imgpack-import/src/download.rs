use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CACHE_DIR: &str = ".imgpack_cache";

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("empty locator")]
    EmptyLocator,
    #[error("unsupported scheme in {0:?} (expected http, https, file or a local path)")]
    UnsupportedScheme(String),
    #[error("http error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("cache io error at {path}: {source}")]
    Cache {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maps an input locator to a local file.
pub trait Fetch {
    fn fetch(&mut self, locator: &str) -> Result<PathBuf, DownloadError>;
}

/// Local paths pass through; http(s) URLs are downloaded once into `cache_dir`.
#[derive(Debug)]
pub struct CachedDownloader {
    cache_dir: PathBuf,
    client: Option<reqwest::blocking::Client>,
}

impl CachedDownloader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            client: None,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where `url` lives (or will live) in the cache.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        let ext = url_ext(url).map(|e| format!(".{e}")).unwrap_or_default();
        self.cache_dir
            .join(format!("{:016x}{ext}", fnv1a64(url.as_bytes())))
    }

    fn client(&mut self, url: &str) -> Result<reqwest::blocking::Client, DownloadError> {
        if let Some(c) = &self.client {
            return Ok(c.clone());
        }
        let c = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| DownloadError::Http {
                url: url.to_string(),
                source,
            })?;
        self.client = Some(c.clone());
        Ok(c)
    }

    fn download(&mut self, url: &str) -> Result<PathBuf, DownloadError> {
        let path = self.cache_path(url);
        if path.is_file() {
            debug!(
                target: "imgpack",
                event = "cache_hit",
                url,
                path = %path.display(),
                "cache hit"
            );
            return Ok(path);
        }

        let http_err = |source| DownloadError::Http {
            url: url.to_string(),
            source,
        };
        let client = self.client(url)?;
        let resp = client.get(url).send().map_err(http_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().map_err(http_err)?;

        write_atomic(&path, &bytes).map_err(|source| DownloadError::Cache {
            path: path.display().to_string(),
            source,
        })?;
        debug!(
            target: "imgpack",
            event = "downloaded",
            url,
            path = %path.display(),
            bytes = bytes.len() as u64,
            "downloaded"
        );
        Ok(path)
    }
}

impl Fetch for CachedDownloader {
    fn fetch(&mut self, locator: &str) -> Result<PathBuf, DownloadError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(DownloadError::EmptyLocator);
        }
        if let Some(rest) = locator.strip_prefix("file://") {
            return Ok(PathBuf::from(rest));
        }
        match locator.split_once("://") {
            None => Ok(PathBuf::from(locator)),
            Some((scheme, _)) => match scheme.to_ascii_lowercase().as_str() {
                "http" | "https" => self.download(locator),
                _ => Err(DownloadError::UnsupportedScheme(locator.to_string())),
            },
        }
    }
}

/// Short alphanumeric extension of the URL's last path segment, if any.
fn url_ext(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    let (_host, path) = path.split_once('/')?;
    let name = path.rsplit('/').next()?;
    let (_stem, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 8 || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path must have parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad filename"))?;
    let tmp = path.with_file_name(format!("{file_name}.tmp.{}", std::process::id()));

    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(tmp, path)?;
    Ok(())
}

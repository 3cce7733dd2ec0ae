//! Byte-range access to remote and local rasters.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use qlrgen_core::error::{QlrError, Result};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Positioned reads against a raster source.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read up to `len` bytes starting at `offset`.
    ///
    /// A shorter result means the source ended; an empty result means
    /// `offset` is at or past the end.
    async fn read_range(&self, offset: u64, len: usize) -> Result<Bytes>;

    /// URL or path used in errors and logs
    fn location(&self) -> &str;
}

/// Range reads over HTTP(S) with `Range: bytes=a-b`
pub struct HttpRangeReader {
    client: reqwest::Client,
    url: String,
}

impl HttpRangeReader {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> QlrError {
        if error.is_timeout() {
            QlrError::timed_out(&self.url, error.to_string())
        } else {
            QlrError::unreachable(&self.url, error.to_string())
        }
    }
}

#[async_trait]
impl RangeReader for HttpRangeReader {
    async fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        let last = offset.saturating_add(len as u64 - 1);

        let mut response = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={}-{}", offset, last))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let header = response.headers().get(CONTENT_RANGE).and_then(|v| v.to_str().ok());
                match header.and_then(content_range_start) {
                    Some(start) if start == offset => {}
                    Some(start) => {
                        return Err(QlrError::unreachable(
                            &self.url,
                            format!("asked for bytes from {} but got bytes from {}", offset, start),
                        ))
                    }
                    None => {
                        return Err(QlrError::unreachable(
                            &self.url,
                            format!("partial response has no usable Content-Range: {:?}", header),
                        ))
                    }
                }
                let mut body = response.bytes().await.map_err(|e| self.transport_error(e))?;
                body.truncate(len);
                Ok(body)
            }
            StatusCode::OK => {
                // Range ignored: stream the body until the wanted slice is in hand.
                tracing::debug!(url = %self.url, offset, len, "Server ignored Range header");
                let wanted = (offset as usize).saturating_add(len);
                let mut body = BytesMut::new();
                while body.len() < wanted {
                    match response.chunk().await.map_err(|e| self.transport_error(e))? {
                        Some(chunk) => body.extend_from_slice(&chunk),
                        None => break,
                    }
                }
                let body = body.freeze();
                let start = (offset as usize).min(body.len());
                let end = wanted.min(body.len());
                Ok(body.slice(start..end))
            }
            StatusCode::RANGE_NOT_SATISFIABLE => Ok(Bytes::new()),
            status => Err(QlrError::unreachable(&self.url, format!("HTTP {}", status))),
        }
    }

    fn location(&self) -> &str {
        &self.url
    }
}

/// First byte position of a `Content-Range: bytes a-b/total` value
fn content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (first, _) = range.split_once('-')?;
    first.trim().parse().ok()
}

/// Positioned reads from a local file
pub struct LocalRangeReader {
    path: PathBuf,
    location: String,
}

impl LocalRangeReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.display().to_string();
        Self { path, location }
    }

    fn io_error(&self, error: std::io::Error) -> QlrError {
        QlrError::unreachable(&self.location, error.to_string())
    }
}

#[async_trait]
impl RangeReader for LocalRangeReader {
    async fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
        let mut file = tokio::fs::File::open(&self.path).await.map_err(|e| self.io_error(e))?;
        file.seek(SeekFrom::Start(offset)).await.map_err(|e| self.io_error(e))?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = file.read(&mut buf[filled..]).await.map_err(|e| self.io_error(e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }

    fn location(&self) -> &str {
        &self.location
    }
}

/// In-memory source, mostly useful in tests
pub struct MemoryRangeReader {
    bytes: Bytes,
    location: String,
}

impl MemoryRangeReader {
    pub fn new(location: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            location: location.into(),
        }
    }
}

#[async_trait]
impl RangeReader for MemoryRangeReader {
    async fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
        let size = self.bytes.len() as u64;
        let start = offset.min(size) as usize;
        let end = offset.saturating_add(len as u64).min(size) as usize;
        Ok(self.bytes.slice(start..end))
    }

    fn location(&self) -> &str {
        &self.location
    }
}

/// Pick a reader for `url`.
///
/// `http://` and `https://` go over the network. `file://` URLs and bare
/// paths are read locally when `allow_local_paths` is set and rejected
/// otherwise, as is any other scheme.
pub fn open_source(
    url: &str,
    client: &reqwest::Client,
    allow_local_paths: bool,
) -> Result<Box<dyn RangeReader>> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(invalid_url(url, "URL is empty"));
    }

    let scheme = trimmed.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());
    match scheme.as_deref() {
        Some("http") | Some("https") => {
            let parsed = reqwest::Url::parse(trimmed).map_err(|e| invalid_url(url, e.to_string()))?;
            if parsed.host_str().is_none() {
                return Err(invalid_url(url, "URL has no host"));
            }
            Ok(Box::new(HttpRangeReader::new(client.clone(), parsed.as_str())))
        }
        Some("file") if !allow_local_paths => Err(invalid_url(url, "local files are not served")),
        Some("file") => {
            let path = &trimmed["file://".len()..];
            if path.is_empty() {
                return Err(invalid_url(url, "file URL has no path"));
            }
            Ok(Box::new(LocalRangeReader::new(path)))
        }
        Some(other) => Err(invalid_url(url, format!("unsupported scheme '{}'", other))),
        None if !allow_local_paths => Err(invalid_url(url, "URL must start with http:// or https://")),
        None => Ok(Box::new(LocalRangeReader::new(trimmed))),
    }
}

fn invalid_url(url: &str, reason: impl Into<String>) -> QlrError {
    QlrError::InvalidUrl {
        url: url.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_reader_clamps() {
        let reader = MemoryRangeReader::new("mem", vec![1u8, 2, 3, 4]);
        assert_eq!(reader.read_range(1, 2).await.unwrap().as_ref(), &[2, 3]);
        assert_eq!(reader.read_range(2, 10).await.unwrap().as_ref(), &[3, 4]);
        assert!(reader.read_range(9, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        std::fs::write(&path, b"abcdef").unwrap();

        let reader = LocalRangeReader::new(&path);
        assert_eq!(reader.read_range(2, 3).await.unwrap().as_ref(), b"cde");
        assert_eq!(reader.read_range(4, 100).await.unwrap().as_ref(), b"ef");
    }

    #[tokio::test]
    async fn test_local_reader_missing_file() {
        let reader = LocalRangeReader::new("/nonexistent/qlrgen/scene.tif");
        let err = reader.read_range(0, 8).await.unwrap_err();
        assert!(matches!(err, QlrError::UnreachableSource { timed_out: false, .. }));
    }

    #[test]
    fn test_open_source_schemes() {
        let client = reqwest::Client::new();

        let http = open_source("https://example.com/a.tif", &client, true).unwrap();
        assert_eq!(http.location(), "https://example.com/a.tif");

        let file = open_source("file:///data/a.tif", &client, true).unwrap();
        assert_eq!(file.location(), "/data/a.tif");

        let bare = open_source("data/a.tif", &client, true).unwrap();
        assert_eq!(bare.location(), "data/a.tif");

        for bad in ["", "   ", "s3://bucket/a.tif", "ftp://h/a.tif", "http://", "file://"] {
            assert!(
                matches!(open_source(bad, &client, true), Err(QlrError::InvalidUrl { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_open_source_remote_only() {
        let client = reqwest::Client::new();

        assert!(open_source("https://example.com/a.tif", &client, false).is_ok());
        for local in ["file:///etc/hosts", "/etc/hosts", "example.com/a.tif", "data/a.tif"] {
            assert!(
                matches!(open_source(local, &client, false), Err(QlrError::InvalidUrl { .. })),
                "{local:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_content_range_start() {
        assert_eq!(content_range_start("bytes 0-99/1000"), Some(0));
        assert_eq!(content_range_start("bytes 512-1023/*"), Some(512));
        assert_eq!(content_range_start("bytes */1000"), None);
        assert_eq!(content_range_start("items 0-9/10"), None);
    }
}

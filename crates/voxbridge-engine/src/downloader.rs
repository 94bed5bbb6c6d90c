use crate::engine_trait::AssetDownloader;
use async_trait::async_trait;
use std::path::PathBuf;
use voxbridge_core::DownloadError;

/// Maps a `file://` URL or an absolute path onto the local filesystem.
fn local_path(url: &str) -> Result<PathBuf, DownloadError> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if url.starts_with('/') {
        return Ok(PathBuf::from(url));
    }
    let scheme = url.split_once("://").map(|(s, _)| s).unwrap_or(url);
    Err(DownloadError::UnsupportedScheme(scheme.to_string()))
}

/// Resolves assets that already live on disk.
pub struct FileDownloader;

impl FileDownloader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetDownloader for FileDownloader {
    async fn download(&self, url: &str) -> Result<PathBuf, DownloadError> {
        let path = local_path(url)?;
        if path.as_os_str().is_empty() {
            return Err(DownloadError::NoLocation(url.to_string()));
        }
        tokio::fs::metadata(&path)
            .await
            .map_err(|e| DownloadError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(url = %url, path = ?path, "resolved local asset");
        Ok(path)
    }
}

/// Fetches `http(s)` assets into a cache directory. Files already present
/// in the cache are returned without a request.
#[cfg(feature = "http")]
pub struct HttpDownloader {
    cache_dir: PathBuf,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpDownloader {
    pub fn new(cache_dir: PathBuf) -> Result<Self, DownloadError> {
        std::fs::create_dir_all(&cache_dir)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .map_err(|e| DownloadError::Unavailable(e.to_string()))?;
        Ok(Self { cache_dir, client })
    }

    /// Cache file for `url`, keyed on everything after the scheme so assets
    /// that share a file name stay apart.
    fn cache_path(&self, url: &str) -> Result<PathBuf, DownloadError> {
        let location = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
        if location.is_empty() || location.ends_with('/') {
            return Err(DownloadError::NoLocation(url.to_string()));
        }
        Ok(self.cache_dir.join(escape_file_name(location)))
    }
}

/// Reversible mapping of a URL onto a single file name: alphanumerics,
/// `.` and `-` pass through, `_` doubles, every other byte becomes `_xx`.
#[cfg(feature = "http")]
fn escape_file_name(location: &str) -> String {
    let mut name = String::with_capacity(location.len());
    for byte in location.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' => name.push(byte as char),
            b'_' => name.push_str("__"),
            other => name.push_str(&format!("_{other:02x}")),
        }
    }
    name
}

#[cfg(feature = "http")]
fn partial_path(dest: &std::path::Path) -> PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}-{n}.part", std::process::id()));
    dest.with_file_name(name)
}

#[cfg(feature = "http")]
#[async_trait]
impl AssetDownloader for HttpDownloader {
    async fn download(&self, url: &str) -> Result<PathBuf, DownloadError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return FileDownloader::new().download(url).await;
        }

        let dest = self.cache_path(url)?;
        if tokio::fs::metadata(&dest).await.is_ok() {
            tracing::debug!(url = %url, path = ?dest, "asset cache hit");
            return Ok(dest);
        }

        let failed = |reason: String| DownloadError::RequestFailed {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

        // only complete files ever appear under the cache name
        let partial = partial_path(&dest);
        if let Err(e) = tokio::fs::write(&partial, &bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        tokio::fs::rename(&partial, &dest).await?;

        tracing::debug!(url = %url, bytes = bytes.len(), path = ?dest, "downloaded asset");
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_strips_file_scheme() {
        assert_eq!(
            local_path("file:///models/detect.tflite").unwrap(),
            PathBuf::from("/models/detect.tflite")
        );
        assert_eq!(local_path("/abs/x").unwrap(), PathBuf::from("/abs/x"));
    }

    #[test]
    fn test_local_path_rejects_remote_scheme() {
        match local_path("https://cdn.example.com/detect.tflite") {
            Err(DownloadError::UnsupportedScheme(scheme)) => assert_eq!(scheme, "https"),
            _ => panic!("expected UnsupportedScheme"),
        }
    }

    #[tokio::test]
    async fn test_file_downloader_resolves_existing_file() {
        let dir = std::env::temp_dir().join("voxbridge_file_downloader");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("encode.tflite");
        std::fs::write(&path, b"model").unwrap();

        let url = format!("file://{}", path.to_string_lossy());
        let resolved = FileDownloader::new().download(&url).await.unwrap();
        assert_eq!(resolved, path);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_file_downloader_missing_file_fails() {
        let result = FileDownloader::new()
            .download("file:///nonexistent/voxbridge/model.tflite")
            .await;
        match result {
            Err(DownloadError::RequestFailed { url, .. }) => assert!(url.contains("model.tflite")),
            _ => panic!("expected RequestFailed"),
        }
    }

    #[tokio::test]
    async fn test_file_downloader_empty_location_fails() {
        let result = FileDownloader::new().download("file://").await;
        assert!(matches!(result, Err(DownloadError::NoLocation(_))));
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_cache_path_distinguishes_shared_file_names() {
        let dir = std::env::temp_dir().join("voxbridge_cache_names");
        let downloader = HttpDownloader::new(dir.clone()).unwrap();

        let wakeword = downloader
            .cache_path("https://cdn.example.com/wakeword/detect.tflite")
            .unwrap();
        let keyword = downloader
            .cache_path("https://cdn.example.com/keyword/detect.tflite")
            .unwrap();
        assert_ne!(wakeword, keyword);
        assert_eq!(wakeword.parent(), Some(dir.as_path()));

        // escaping keeps underscores and separators apart
        assert_ne!(
            downloader.cache_path("https://h/a_2fb").unwrap(),
            downloader.cache_path("https://h/a/b").unwrap()
        );
        assert!(matches!(
            downloader.cache_path("https://cdn.example.com/models/"),
            Err(DownloadError::NoLocation(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn test_http_downloader_cache_hit_is_per_url() {
        let dir = std::env::temp_dir().join("voxbridge_cache_hits");
        let downloader = HttpDownloader::new(dir.clone()).unwrap();
        let wakeword_url = "https://cdn.invalid/wakeword/detect.tflite";
        let keyword_url = "https://cdn.invalid/keyword/detect.tflite";

        let seeded = downloader.cache_path(wakeword_url).unwrap();
        std::fs::write(&seeded, b"wakeword model").unwrap();

        assert_eq!(downloader.download(wakeword_url).await.unwrap(), seeded);
        // not cached, and the host does not resolve
        assert!(downloader.download(keyword_url).await.is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

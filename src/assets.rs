//! Image inlining for export.
//!
//! Every `image("…")` reference on a surface is swapped for a
//! `data:<mime>;base64,…` URI so the print step never touches the network.
//! Failures are per image: the reference stays as it was.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rayon::prelude::*;
use regex::{Captures, Regex};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::error::{AssetError, ExportError};
use crate::render::{typst_string, unescape_typst, Surface};

/// HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Matches `image("<escaped src>"` and captures the escaped src.
pub static IMAGE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"image\("((?:[^"\\]|\\.)*)""#).expect("image reference pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl FetchedImage {
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Splits a data URI into its mime type and payload. Base64 payloads are
/// decoded as such, anything else is percent-decoded.
pub fn parse_data_uri(uri: &str) -> Result<FetchedImage, ExportError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ExportError::DataUri("missing data: prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ExportError::DataUri("missing payload".to_string()))?;
    let (media, bytes) = match header.strip_suffix(";base64") {
        Some(media) => {
            let bytes = STANDARD
                .decode(payload)
                .map_err(|e| ExportError::DataUri(e.to_string()))?;
            (media, bytes)
        }
        None => (header, urlencoding::decode_binary(payload.as_bytes()).into_owned()),
    };
    // drop parameters such as `;charset=utf8`
    let mime = media.split(';').next().unwrap_or_default().trim();
    if mime.is_empty() {
        return Err(ExportError::DataUri("missing mime type".to_string()));
    }
    Ok(FetchedImage { bytes, mime: mime.to_string() })
}

pub fn mime_for_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// File extension Typst needs to recognise an unpacked image.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        _ => "bin",
    }
}

// ==========================================
// Cache
// ==========================================

/// Source URL -> data URI. One per session, shared by every export, and
/// append-only: entries are never replaced or evicted.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: RwLock<HashMap<String, String>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, src: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(src).cloned()
    }

    pub fn insert(&self, src: &str, data_uri: String) {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.entry(src.to_string()).or_insert(data_uri);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

// ==========================================
// Fetching
// ==========================================

pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, src: &str) -> Result<FetchedImage, AssetError>;
}

/// Fetches absolute URLs over HTTP. Relative references are looked up in
/// the asset directory first, then joined onto the base URL.
pub struct HttpFetcher {
    client: Client,
    asset_dir: Option<PathBuf>,
    base_url: Option<Url>,
}

impl HttpFetcher {
    pub fn new(asset_dir: Option<PathBuf>, base_url: Option<Url>) -> Result<Self, AssetError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("gst-invoice/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AssetError::Network { url: String::new(), message: e.to_string() })?;
        Ok(Self { client, asset_dir, base_url })
    }

    fn get(&self, url: &str) -> Result<FetchedImage, AssetError> {
        debug!("fetching image {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| AssetError::Network { url: url.to_string(), message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(AssetError::Status { url: url.to_string(), status: response.status().as_u16() });
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|m| m.starts_with("image/"))
            .unwrap_or_else(|| mime_for_path(url).to_string());

        let bytes = response
            .bytes()
            .map_err(|e| AssetError::Network { url: url.to_string(), message: e.to_string() })?;
        Ok(FetchedImage { bytes: bytes.to_vec(), mime })
    }

    fn read_local(&self, path: &Path) -> Result<FetchedImage, AssetError> {
        let bytes = fs::read(path).map_err(|source| AssetError::Io { path: path.display().to_string(), source })?;
        Ok(FetchedImage { bytes, mime: mime_for_path(&path.to_string_lossy()).to_string() })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, src: &str) -> Result<FetchedImage, AssetError> {
        if src.starts_with("http://") || src.starts_with("https://") {
            return self.get(src);
        }

        if let Some(dir) = &self.asset_dir {
            let path = dir.join(src.trim_start_matches('/'));
            if path.is_file() {
                return self.read_local(&path);
            }
        }

        match &self.base_url {
            Some(base) => {
                let url = base
                    .join(src)
                    .map_err(|e| AssetError::Network { url: src.to_string(), message: e.to_string() })?;
                self.get(url.as_str())
            }
            None => Err(AssetError::Unresolvable(src.to_string())),
        }
    }
}

// ==========================================
// Inlining
// ==========================================

#[derive(Debug)]
pub struct InlineOutcome {
    pub surface: Surface,
    pub inlined: usize,
    /// Sources left as they were.
    pub failed: Vec<String>,
}

/// Returns the cached data URI for `src`, fetching it on a miss.
pub fn inline_image(src: &str, fetcher: &dyn ImageFetcher, cache: &ImageCache) -> Result<String, AssetError> {
    if src.starts_with("data:") {
        return Ok(src.to_string());
    }
    if let Some(hit) = cache.get(src) {
        debug!("image cache hit for {src}");
        return Ok(hit);
    }
    let data_uri = fetcher.fetch(src)?.to_data_uri();
    cache.insert(src, data_uri.clone());
    Ok(data_uri)
}

/// Inlines every image on a copy of `surface`. All fetches run in parallel
/// and all of them settle before this returns.
pub fn inline_images(surface: &Surface, fetcher: &dyn ImageFetcher, cache: &ImageCache) -> InlineOutcome {
    let mut sources: Vec<String> = IMAGE_REF
        .captures_iter(&surface.markup)
        .map(|caps| unescape_typst(&caps[1]))
        .filter(|src| !src.starts_with("data:"))
        .collect();
    sources.sort();
    sources.dedup();

    let results: HashMap<String, Result<String, AssetError>> = sources
        .par_iter()
        .map(|src| (src.clone(), inline_image(src, fetcher, cache)))
        .collect();

    let mut failed = Vec::new();
    let mut inlined = 0;
    for (src, result) in &results {
        match result {
            Ok(_) => inlined += 1,
            Err(e) => {
                warn!("Failed to inline image {src}: {e}");
                failed.push(src.clone());
            }
        }
    }
    failed.sort();

    let markup = IMAGE_REF
        .replace_all(&surface.markup, |caps: &Captures| {
            let src = unescape_typst(&caps[1]);
            match results.get(&src) {
                Some(Ok(data_uri)) => format!("image({}", typst_string(data_uri)),
                _ => caps[0].to_string(),
            }
        })
        .into_owned();

    InlineOutcome { surface: Surface { markup }, inlined, failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    impl ImageFetcher for CountingFetcher {
        fn fetch(&self, src: &str) -> Result<FetchedImage, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if src.contains("missing") {
                return Err(AssetError::Status { url: src.to_string(), status: 404 });
            }
            Ok(FetchedImage { bytes: src.as_bytes().to_vec(), mime: "image/png".to_string() })
        }
    }

    fn surface(srcs: &[&str]) -> Surface {
        let markup = srcs
            .iter()
            .map(|s| format!("#image({}, height: 20mm)\n", typst_string(s)))
            .collect();
        Surface { markup }
    }

    #[test]
    fn data_uri_round_trip() {
        let image = FetchedImage { bytes: vec![0x89, b'P', b'N', b'G'], mime: "image/png".to_string() };
        let uri = image.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(parse_data_uri(&uri).expect("valid"), image);
        assert!(parse_data_uri("data:image/png,plain").is_err());
        assert!(parse_data_uri("https://example.com/a.png").is_err());
    }

    #[test]
    fn cache_is_reused_across_calls() {
        let fetcher = CountingFetcher { calls: AtomicUsize::new(0) };
        let cache = ImageCache::new();
        let page = surface(&["/creo-logo.png", "/creo-logo.png"]);

        let first = inline_images(&page, &fetcher, &cache);
        let second = inline_images(&page, &fetcher, &cache);

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.surface, second.surface);
        assert_eq!(cache.len(), 1);
        assert!(!first.surface.markup.contains("/creo-logo.png"));
    }

    #[test]
    fn failures_keep_the_original_reference() {
        let fetcher = CountingFetcher { calls: AtomicUsize::new(0) };
        let cache = ImageCache::new();
        let outcome = inline_images(&surface(&["/a.png", "/missing.png"]), &fetcher, &cache);

        assert_eq!(outcome.inlined, 1);
        assert_eq!(outcome.failed, vec!["/missing.png".to_string()]);
        assert!(outcome.surface.markup.contains("image(\"/missing.png\""));
        assert!(!outcome.surface.markup.contains("image(\"/a.png\""));
        // failures are not cached
        assert!(cache.get("/missing.png").is_none());
    }

    #[test]
    fn data_uris_are_left_alone() {
        let fetcher = CountingFetcher { calls: AtomicUsize::new(0) };
        let page = surface(&["data:image/png;base64,AAAA"]);
        let outcome = inline_images(&page, &fetcher, &ImageCache::new());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.surface, page);
    }

    #[test]
    fn relative_assets_come_from_the_asset_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("creo-logo.png"), b"png-bytes").expect("write");
        let fetcher = HttpFetcher::new(Some(dir.path().to_path_buf()), None).expect("client");

        let image = fetcher.fetch("/creo-logo.png").expect("local asset");
        assert_eq!(image.bytes, b"png-bytes");
        assert_eq!(image.mime, "image/png");

        assert!(matches!(fetcher.fetch("/storeeva.jpg"), Err(AssetError::Unresolvable(_))));
    }

    #[test]
    fn mime_guess_by_extension() {
        assert_eq!(mime_for_path("/Little Things Cute.PNG"), "image/png");
        assert_eq!(mime_for_path("/storeeva.jpg"), "image/jpeg");
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
    }
}

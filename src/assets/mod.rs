//! # Resource Loading
//!
//! Fetches the two kinds of external resources a render needs: template
//! schemas and images. [`ResourceLoader`] is the seam; [`HttpLoader`] is the
//! production implementation.
//!
//! | Reference | Handled by |
//! |-----------|------------|
//! | `http://...`, `https://...` | shared `reqwest::Client` |
//! | `file:///...`, bare paths | `tokio::fs` |
//! | `data:image/png;base64,...` | inline base64 decode |
//!
//! Decoded images are cached by reference so a template that repeats a logo
//! (or a batch rendering many templates) downloads it once.

use async_trait::async_trait;
use base64::Engine as _;
use image::RgbaImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::RendererConfig;
use crate::error::ThumbnailError;
use crate::template::TemplateSchema;

/// Source of schemas and images for the rasterizer.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Fetch and parse the schema document at `url`.
    async fn load_schema(&self, url: &str) -> Result<TemplateSchema, ThumbnailError>;

    /// Fetch and decode the image at `url`.
    async fn load_image(&self, url: &str) -> Result<Arc<RgbaImage>, ThumbnailError>;
}

/// Where a resource reference points.
#[derive(Debug, PartialEq)]
enum Source<'a> {
    Http(&'a str),
    Data(&'a str),
    File(PathBuf),
}

fn classify(reference: &str) -> Result<Source<'_>, String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err("empty reference".into());
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(Source::Http(trimmed))
    } else if lower.starts_with("data:") {
        Ok(Source::Data(&trimmed[5..]))
    } else if lower.starts_with("file://") {
        Ok(Source::File(PathBuf::from(&trimmed[7..])))
    } else if let Some((scheme, _)) = trimmed.split_once("://") {
        Err(format!("unsupported scheme '{}'", scheme))
    } else {
        Ok(Source::File(PathBuf::from(trimmed)))
    }
}

/// Decode the part of a data URL after `data:`.
///
/// Base64 payloads are decoded; anything else is taken as percent-encoded
/// text.
fn decode_data_url(rest: &str) -> Result<Vec<u8>, String> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "malformed data URL: missing ','".to_string())?;
    if meta.to_ascii_lowercase().ends_with(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| format!("invalid base64 in data URL: {}", e))
    } else {
        Ok(percent_decode(payload))
    }
}

fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(v) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// A decoded image kept in the loader cache.
struct CachedImage {
    image: Arc<RgbaImage>,
    last_accessed: Instant,
}

impl CachedImage {
    fn new(image: Arc<RgbaImage>) -> Self {
        Self {
            image,
            last_accessed: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// Loader for web, file and data URL resources.
#[derive(Clone)]
pub struct HttpLoader {
    http_client: reqwest::Client,
    image_cache: Arc<RwLock<HashMap<String, CachedImage>>>,
    cache_capacity: usize,
}

impl HttpLoader {
    /// Build a loader from the renderer configuration (user agent, request
    /// timeout, cache size).
    pub fn new(config: &RendererConfig) -> Result<Self, ThumbnailError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| ThumbnailError::Config(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            http_client,
            image_cache: Arc::new(RwLock::new(HashMap::new())),
            cache_capacity: config.image_cache_capacity,
        })
    }

    /// Number of decoded images currently cached.
    pub async fn cached_images(&self) -> usize {
        self.image_cache.read().await.len()
    }

    /// Raw bytes behind a reference.
    async fn fetch_bytes(&self, reference: &str) -> Result<Vec<u8>, String> {
        match classify(reference)? {
            Source::Http(url) => {
                let response = self
                    .http_client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| format!("Failed to download {}: {}", url, e))?;
                if !response.status().is_success() {
                    return Err(format!(
                        "Failed to download {}: HTTP {}",
                        url,
                        response.status()
                    ));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read {}: {}", url, e))?;
                Ok(bytes.to_vec())
            }
            Source::Data(rest) => decode_data_url(rest),
            Source::File(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e)),
        }
    }

    async fn cache_get(&self, reference: &str) -> Option<Arc<RgbaImage>> {
        let mut cache = self.image_cache.write().await;
        cache.get_mut(reference).map(|entry| {
            entry.touch();
            entry.image.clone()
        })
    }

    async fn cache_put(&self, reference: &str, image: Arc<RgbaImage>) {
        if self.cache_capacity == 0 {
            return;
        }
        let mut cache = self.image_cache.write().await;
        while cache.len() >= self.cache_capacity {
            let oldest = cache
                .iter()
                .min_by_key(|(_, v)| v.last_accessed)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    cache.remove(&key);
                }
                None => break,
            }
        }
        cache.insert(reference.to_string(), CachedImage::new(image));
    }
}

#[async_trait]
impl ResourceLoader for HttpLoader {
    async fn load_schema(&self, url: &str) -> Result<TemplateSchema, ThumbnailError> {
        let bytes = self
            .fetch_bytes(url)
            .await
            .map_err(ThumbnailError::SchemaUnavailable)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ThumbnailError::SchemaUnavailable(format!("Invalid schema JSON: {}", e)))
    }

    async fn load_image(&self, url: &str) -> Result<Arc<RgbaImage>, ThumbnailError> {
        if let Some(image) = self.cache_get(url).await {
            tracing::trace!(url, "image cache hit");
            return Ok(image);
        }

        let bytes = self
            .fetch_bytes(url)
            .await
            .map_err(ThumbnailError::AssetUnavailable)?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| ThumbnailError::AssetUnavailable(format!("Failed to decode image: {}", e)))?;
        let image = Arc::new(image.to_rgba8());

        self.cache_put(url, image.clone()).await;
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_data_url(w: u32, h: u32) -> String {
        let img = RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    fn loader(capacity: usize) -> HttpLoader {
        HttpLoader::new(&RendererConfig {
            image_cache_capacity: capacity,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_classify_references() {
        assert_eq!(
            classify("https://cdn.example.com/a.png").unwrap(),
            Source::Http("https://cdn.example.com/a.png")
        );
        assert_eq!(
            classify("file:///tmp/a.json").unwrap(),
            Source::File(PathBuf::from("/tmp/a.json"))
        );
        assert_eq!(
            classify("templates/a.json").unwrap(),
            Source::File(PathBuf::from("templates/a.json"))
        );
        assert_eq!(classify("data:,hi").unwrap(), Source::Data(",hi"));
        assert!(classify("ftp://example.com/a.png").is_err());
        assert!(classify("   ").is_err());
    }

    #[test]
    fn test_decode_plain_data_url() {
        assert_eq!(decode_data_url("text/plain,a%20b").unwrap(), b"a b".to_vec());
        assert_eq!(decode_data_url(",100%").unwrap(), b"100%".to_vec());
        assert!(decode_data_url("no-comma").is_err());
    }

    #[tokio::test]
    async fn test_load_image_from_data_url() {
        let loader = loader(8);
        let image = loader.load_image(&png_data_url(3, 2)).await.unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(0, 0)[0], 255);
    }

    #[tokio::test]
    async fn test_undecodable_image_is_asset_error() {
        let loader = loader(8);
        let err = loader
            .load_image("data:image/png;base64,AAAA")
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::AssetUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_asset_error() {
        let loader = loader(8);
        let err = loader
            .load_image("/nonexistent/logo.png")
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::AssetUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cache_evicts_least_recently_used() {
        let loader = loader(2);
        let a = png_data_url(1, 1);
        let b = png_data_url(2, 2);
        let c = png_data_url(3, 3);
        loader.load_image(&a).await.unwrap();
        loader.load_image(&b).await.unwrap();
        // Touch `a` so `b` is the oldest
        loader.load_image(&a).await.unwrap();
        loader.load_image(&c).await.unwrap();

        assert_eq!(loader.cached_images().await, 2);
        let cache = loader.image_cache.read().await;
        assert!(cache.contains_key(&a));
        assert!(!cache.contains_key(&b));
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_cache() {
        let loader = loader(0);
        loader.load_image(&png_data_url(1, 1)).await.unwrap();
        assert_eq!(loader.cached_images().await, 0);
    }

    #[tokio::test]
    async fn test_load_schema_from_file() {
        let path = std::env::temp_dir().join(format!("docthumb-schema-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"{"page_size": "A5", "elements": []}"#)
            .await
            .unwrap();
        let loader = loader(8);
        let schema = loader
            .load_schema(&format!("file://{}", path.display()))
            .await
            .unwrap();
        assert_eq!(schema.page_size, crate::template::PageSize::A5);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_invalid_schema_json_is_schema_error() {
        let loader = loader(8);
        let err = loader.load_schema("data:,not json").await.unwrap_err();
        assert!(matches!(err, ThumbnailError::SchemaUnavailable(_)));
    }
}

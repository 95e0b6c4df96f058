//! Best-effort cover-image lookup by ISBN.
//!
//! Lookups never fail the surrounding operation: timeouts, transport errors,
//! missing covers and non-image responses all come back as `None`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bookshelf_kernel::settings::CoverSettings;
use reqwest::header::CONTENT_TYPE;

#[async_trait]
pub trait CoverImageProvider: Send + Sync {
    async fn fetch_cover_url(&self, isbn: &str) -> Option<String>;
}

/// Provider used when enrichment is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCovers;

#[async_trait]
impl CoverImageProvider for NoCovers {
    async fn fetch_cover_url(&self, _isbn: &str) -> Option<String> {
        None
    }
}

/// Open Library covers API: `{base}/b/isbn/{isbn}-L.jpg?default=false`
/// answers 404 when no cover exists.
#[derive(Debug, Clone)]
pub struct OpenLibraryCovers {
    client: reqwest::Client,
    base_url: String,
}

impl OpenLibraryCovers {
    pub fn new(settings: &CoverSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn cover_url(&self, isbn: &str) -> String {
        let digits: String = isbn.chars().filter(|c| *c != '-').collect();
        format!("{}/b/isbn/{}-L.jpg?default=false", self.base_url, digits)
    }
}

#[async_trait]
impl CoverImageProvider for OpenLibraryCovers {
    async fn fetch_cover_url(&self, isbn: &str) -> Option<String> {
        let isbn = isbn.trim();
        if isbn.is_empty() {
            return None;
        }

        let url = self.cover_url(isbn);
        let response = match self.client.head(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%isbn, error = %err, "cover lookup failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(%isbn, status = %response.status(), "no cover available");
            return None;
        }

        let is_image = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| {
                content_type
                    .trim_start()
                    .to_ascii_lowercase()
                    .starts_with("image/")
            });

        if !is_image {
            tracing::debug!(%isbn, "cover response is not an image");
            return None;
        }

        Some(url)
    }
}

/// Provider selected by configuration.
pub fn from_settings(settings: &CoverSettings) -> anyhow::Result<Arc<dyn CoverImageProvider>> {
    if !settings.enabled {
        tracing::info!("cover enrichment disabled");
        return Ok(Arc::new(NoCovers));
    }

    let provider = OpenLibraryCovers::new(settings)?;
    tracing::info!(base_url = %provider.base_url, "cover enrichment enabled");
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Router};

    async fn cover(Path(file): Path<String>) -> axum::response::Response {
        match file.as_str() {
            "9780000000001-L.jpg" => ([(CONTENT_TYPE, "image/jpeg")], "").into_response(),
            "9780000000002-L.jpg" => ([(CONTENT_TYPE, "text/html")], "<html/>").into_response(),
            "9780000000003-L.jpg" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                ([(CONTENT_TYPE, "image/jpeg")], "").into_response()
            }
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    /// Local stand-in for the covers API.
    async fn covers_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new().route("/b/isbn/{file}", get(cover));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}")
    }

    async fn provider() -> OpenLibraryCovers {
        OpenLibraryCovers::new(&CoverSettings {
            enabled: true,
            base_url: format!("{}/", covers_server().await),
            timeout_ms: 300,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn image_response_yields_url() {
        let provider = provider().await;
        let url = provider.fetch_cover_url("978-0-00-000000-1").await.unwrap();

        assert!(url.ends_with("/b/isbn/9780000000001-L.jpg?default=false"));
        assert!(!url.contains("//b/"));
    }

    #[tokio::test]
    async fn non_image_response_yields_nothing() {
        let provider = provider().await;
        assert_eq!(provider.fetch_cover_url("9780000000002").await, None);
    }

    #[tokio::test]
    async fn missing_cover_yields_nothing() {
        let provider = provider().await;
        assert_eq!(provider.fetch_cover_url("9789999999999").await, None);
    }

    #[tokio::test]
    async fn timeout_yields_nothing() {
        let provider = provider().await;
        assert_eq!(provider.fetch_cover_url("9780000000003").await, None);
    }

    #[tokio::test]
    async fn blank_isbn_skips_the_lookup() {
        let provider = provider().await;
        assert_eq!(provider.fetch_cover_url("   ").await, None);
    }

    #[tokio::test]
    async fn unreachable_service_yields_nothing() {
        let provider = OpenLibraryCovers::new(&CoverSettings {
            enabled: true,
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_ms: 300,
        })
        .unwrap();
        assert_eq!(provider.fetch_cover_url("9780000000001").await, None);
    }

    #[tokio::test]
    async fn disabled_settings_select_no_covers() {
        let provider = from_settings(&CoverSettings {
            enabled: false,
            ..CoverSettings::default()
        })
        .unwrap();
        assert_eq!(provider.fetch_cover_url("9780000000001").await, None);
    }
}

use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

use crate::model::CandidateItem;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; TheSignal/1.0)";
const CONCURRENT_FETCHES: usize = 8;

/// Looks up `og:image` / `twitter:image` for items that arrived without a thumbnail.
pub struct PreviewImageFetcher {
    client: Client,
}

impl PreviewImageFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Preview image of the page at `url`. Every failure is "no image".
    pub async fn fetch_preview_image(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url, error = %e, "preview fetch failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(url, status = %response.status(), "preview fetch returned non-success");
            return None;
        }

        let html = response.text().await.ok()?;
        extract_preview_image(&html)
    }

    /// Attach preview images where missing. Order is preserved.
    pub async fn enrich(&self, items: Vec<CandidateItem>) -> Vec<CandidateItem> {
        let enriched: Vec<CandidateItem> = stream::iter(items)
            .map(|item| async move {
                if item.image_url.is_some() {
                    return item;
                }
                match self.fetch_preview_image(&item.url).await {
                    Some(image) => item.with_image_url(image),
                    None => item,
                }
            })
            .buffered(CONCURRENT_FETCHES)
            .collect()
            .await;

        let with_images = enriched.iter().filter(|i| i.image_url.is_some()).count();
        info!(items = enriched.len(), with_images, "preview images resolved");
        enriched
    }
}

/// `og:image` first, then `twitter:image`; attribute order inside the tag does not matter.
pub fn extract_preview_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    ["meta[property=\"og:image\"]", "meta[name=\"twitter:image\"]"]
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .map(str::trim)
                .find(|c| !c.is_empty())
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn og_image_with_property_first() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://example.com/image.jpg" />
        </head></html>"#;
        assert_eq!(extract_preview_image(html).as_deref(), Some("https://example.com/image.jpg"));
    }

    #[test]
    fn og_image_with_content_first() {
        let html = r#"<html><head>
            <meta content="https://example.com/image2.jpg" property="og:image" />
        </head></html>"#;
        assert_eq!(extract_preview_image(html).as_deref(), Some("https://example.com/image2.jpg"));
    }

    #[test]
    fn falls_back_to_twitter_image() {
        let html = r#"<html><head>
            <meta name="twitter:image" content="https://example.com/twitter.jpg" />
        </head></html>"#;
        assert_eq!(extract_preview_image(html).as_deref(), Some("https://example.com/twitter.jpg"));
    }

    #[test]
    fn og_image_wins_over_twitter_image() {
        let html = r#"<head>
            <meta name="twitter:image" content="https://example.com/t.jpg" />
            <meta property="og:image" content="https://example.com/og.jpg" />
        </head>"#;
        assert_eq!(extract_preview_image(html).as_deref(), Some("https://example.com/og.jpg"));
    }

    #[test]
    fn none_without_image_tags() {
        assert!(extract_preview_image("<html><head><title>No images</title></head></html>").is_none());
    }
}

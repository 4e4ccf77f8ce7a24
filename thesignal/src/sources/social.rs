use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::TimelineSource;
use crate::error::UpstreamError;
use crate::model::CandidateItem;
use crate::normalize::{domain_of, normalize, truncate_chars, RawCandidate};

pub const DEFAULT_SOCIAL_API_URL: &str = "https://api.socialdata.tools";
const TITLE_CHARS: usize = 100;
const SELF_HOSTS: [&str; 2] = ["x.com", "twitter.com"];

/// Timeline source backed by the SocialData Twitter/X search API.
pub struct SocialDataClient {
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
    client: Client,
}

impl SocialDataClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("TheSignal/1.0")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            api_key_env: String::from("SOCIALDATA_API_KEY"),
            client,
        }
    }

    /// Read the bearer token from `api_key_env`; absence is reported per call.
    pub fn from_env(base_url: impl Into<String>, api_key_env: &str, timeout_secs: u64) -> Self {
        let api_key = std::env::var(api_key_env).ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(env = api_key_env, "social credential not set; account fetches will fail");
        }
        Self {
            api_key_env: api_key_env.to_string(),
            ..Self::new(base_url, api_key, timeout_secs)
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tweets: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
pub struct Tweet {
    pub id_str: String,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub tweet_created_at: Option<String>,
    pub user: TweetUser,
    #[serde(default)]
    pub entities: Option<Entities>,
    #[serde(default)]
    pub extended_entities: Option<ExtendedEntities>,
}

#[derive(Debug, Deserialize)]
pub struct TweetUser {
    pub screen_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
}

#[derive(Debug, Deserialize)]
pub struct UrlEntity {
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtendedEntities {
    #[serde(default)]
    pub media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
pub struct Media {
    pub media_url_https: String,
    #[serde(rename = "type")]
    pub kind: String,
}

fn is_self_referential(url: &str) -> bool {
    match domain_of(url) {
        Some(host) => SELF_HOSTS
            .iter()
            .any(|s| host == *s || host.ends_with(&format!(".{}", s))),
        None => false,
    }
}

/// Map one tweet to a candidate item.
///
/// URL: first outbound link that does not point back at x.com/twitter.com,
/// else the tweet's own status URL. Thumbnail: the first photo, video or GIF
/// (`media_url_https` is the preview image for all three).
pub fn candidate_from_tweet(tweet: Tweet) -> Option<CandidateItem> {
    let external = tweet
        .entities
        .as_ref()
        .map(|e| e.urls.as_slice())
        .unwrap_or_default()
        .iter()
        .find(|u| {
            u.expanded_url
                .as_deref()
                .map(|href| !href.trim().is_empty() && !is_self_referential(href))
                .unwrap_or(false)
        });

    let (url, source_domain) = match external {
        Some(link) => {
            let href = link.expanded_url.clone().unwrap_or_default();
            let domain = domain_of(&href)
                .or_else(|| {
                    link.display_url
                        .as_deref()
                        .and_then(|d| d.split('/').next())
                        .filter(|d| !d.is_empty())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "unknown".to_string());
            (href, domain)
        }
        None => (
            format!("https://x.com/{}/status/{}", tweet.user.screen_name, tweet.id_str),
            "x.com".to_string(),
        ),
    };

    let image_url = tweet
        .extended_entities
        .as_ref()
        .and_then(|e| {
            e.media
                .iter()
                .find(|m| matches!(m.kind.as_str(), "photo" | "video" | "animated_gif"))
        })
        .map(|m| m.media_url_https.clone());

    normalize(RawCandidate {
        title: truncate_chars(&tweet.full_text, TITLE_CHARS),
        url,
        source_domain: Some(source_domain),
        raw_content: tweet.full_text,
        published_at: tweet.tweet_created_at,
        author_handle: Some(tweet.user.screen_name),
        image_url,
    })
}

#[async_trait::async_trait]
impl TimelineSource for SocialDataClient {
    async fn fetch_account(&self, handle: &str) -> Result<Vec<CandidateItem>, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::missing_credential(&self.api_key_env))?;

        let query = format!("from:{} -filter:replies", handle);
        let response = self
            .client
            .get(format!("{}/twitter/search", self.base_url))
            .query(&[("query", query.as_str()), ("type", "Latest")])
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(UpstreamError::status(status.as_u16(), &body));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)?;
        debug!(handle, tweets = parsed.tweets.len(), "timeline fetched");

        Ok(parsed
            .tweets
            .into_iter()
            .filter_map(candidate_from_tweet)
            .collect())
    }
}

use mockito::Matcher;
use thesignal::error::UpstreamError;
use thesignal::sources::social::SocialDataClient;
use thesignal::sources::TimelineSource;

fn timeline_query(handle: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("query".into(), format!("from:{} -filter:replies", handle)),
        Matcher::UrlEncoded("type".into(), "Latest".into()),
    ])
}

fn client(url: String) -> SocialDataClient {
    SocialDataClient::new(url, Some("sd-test".to_string()), 5)
}

const KARPATHY_TWEETS: &str = r#"{"tweets":[
    {"id_str":"111","full_text":"Fascinating new paper on attention mechanisms.","tweet_created_at":"2026-02-27T10:00:00.000Z",
     "user":{"screen_name":"karpathy"},"entities":{"urls":[]}},
    {"id_str":"112","full_text":"Read this: https://t.co/abc","tweet_created_at":"2026-02-27T11:00:00.000Z",
     "user":{"screen_name":"karpathy"},
     "entities":{"urls":[{"expanded_url":"https://www.arxiv.org/abs/2502.12345","display_url":"arxiv.org/abs/2502.12345"}]},
     "extended_entities":{"media":[{"media_url_https":"https://pbs.twimg.com/media/abc.jpg","type":"photo"}]}}
]}"#;

#[tokio::test]
async fn fetch_account_maps_tweets() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/twitter/search")
        .match_query(timeline_query("karpathy"))
        .match_header("authorization", "Bearer sd-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(KARPATHY_TWEETS)
        .create_async()
        .await;

    let items = client(server.url()).fetch_account("karpathy").await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].url, "https://x.com/karpathy/status/111");
    assert_eq!(items[0].source_domain, "x.com");
    assert_eq!(items[1].url, "https://www.arxiv.org/abs/2502.12345");
    assert_eq!(items[1].source_domain, "arxiv.org");
    assert_eq!(items[1].image_url.as_deref(), Some("https://pbs.twimg.com/media/abc.jpg"));
    assert_eq!(items[1].author_handle.as_deref(), Some("karpathy"));

    mock.assert_async().await;
}

#[tokio::test]
async fn unauthorized_account_does_not_abort_the_others() {
    let mut server = mockito::Server::new_async().await;

    let _ok = server
        .mock("GET", "/twitter/search")
        .match_query(timeline_query("karpathy"))
        .with_status(200)
        .with_body(KARPATHY_TWEETS)
        .create_async()
        .await;
    let _denied = server
        .mock("GET", "/twitter/search")
        .match_query(timeline_query("private_account"))
        .with_status(401)
        .with_body(r#"{"status":"error","message":"Unauthorized"}"#)
        .create_async()
        .await;
    let _levie = server
        .mock("GET", "/twitter/search")
        .match_query(timeline_query("levie"))
        .with_status(200)
        .with_body(r#"{"tweets":[{"id_str":"7","full_text":"AI is eating software","user":{"screen_name":"levie"}}]}"#)
        .create_async()
        .await;

    let handles = vec![
        "karpathy".to_string(),
        "private_account".to_string(),
        "levie".to_string(),
    ];
    let batch = client(server.url()).fetch_accounts(&handles).await.unwrap();

    assert_eq!(batch.items.len(), 3);
    assert!(batch.items.iter().any(|i| i.url == "https://x.com/levie/status/7"));
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].handle, "private_account");
    assert!(matches!(
        batch.failures[0].error,
        UpstreamError::Status { status: 401, .. }
    ));
}

#[tokio::test]
async fn missing_token_fails_each_account() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = SocialDataClient::new(server.url(), None, 5);
    let batch = client
        .fetch_accounts(&["karpathy".to_string(), "levie".to_string()])
        .await
        .unwrap();

    assert!(batch.items.is_empty());
    assert_eq!(batch.failures.len(), 2);
    assert!(batch
        .failures
        .iter()
        .all(|f| matches!(f.error, UpstreamError::ConfigurationMissing(_))));

    mock.assert_async().await;
}

#[tokio::test]
async fn empty_timeline_is_not_an_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/twitter/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"tweets":[]}"#)
        .create_async()
        .await;

    let items = client(server.url()).fetch_account("quiet").await.unwrap();
    assert!(items.is_empty());
}

mod common;

use newsdesk_core::config::PreferenceLimits;
use newsdesk_core::{
    AddFeedRequest, ArticleQuery, DataApi, FeedSource, PreferenceStore, PreferencesUpdate, ServiceError,
    UserPreferences,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{config, rss, temp_dir};

#[tokio::test]
async fn preferences_survive_a_restart() {
    let dir = temp_dir("prefs");
    {
        let api = DataApi::load_from_dir(config(Vec::new()), &dir).await.unwrap();
        api.mark_read("article-1", &["Volcanoes".to_string()]).await.unwrap();
        api.mark_not_interested("article-2", &["football".to_string()]).await.unwrap();
        api.update_preferences(PreferencesUpdate {
            text_size: Some(1.5),
            reality_mode: Some(true),
            ..PreferencesUpdate::default()
        })
        .await;
    }

    let api = DataApi::load_from_dir(config(Vec::new()), &dir).await.unwrap();
    let prefs = api.preferences().await;
    assert_eq!(prefs.read_articles, vec!["article-1", "article-2"]);
    assert_eq!(prefs.interested_topics, vec!["volcanoes"]);
    assert_eq!(prefs.not_interested_topics, vec!["football"]);
    assert_eq!(prefs.text_size, 1.5);
    assert!(prefs.reality_mode);

    let stats = api.preference_stats().await;
    assert_eq!(stats.read_count, 2);
    assert_eq!(stats.top_interested[0].topic, "volcanoes");

    let cleared = api.clear_preferences().await;
    assert_eq!(cleared, UserPreferences::default());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn corrupted_file_falls_back_to_tmp_copy() {
    let dir = temp_dir("prefs_corrupt");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let main = dir.join("preferences.json");
    tokio::fs::write(&main, b"{ this is not json ").await.unwrap();

    let saved = UserPreferences {
        read_articles: vec!["from-tmp".into()],
        hide_read_mode: true,
        ..UserPreferences::default()
    };
    tokio::fs::write(dir.join("preferences.json.tmp"), serde_json::to_vec(&saved).unwrap())
        .await
        .unwrap();

    let store = PreferenceStore::load_from(&main, PreferenceLimits::default()).await;
    assert_eq!(store.get().await, saved);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn numeric_text_size_file_keeps_history() {
    let dir = temp_dir("prefs_numeric_size");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let main = dir.join("preferences.json");
    tokio::fs::write(
        &main,
        br#"{"readArticles":["a","b"],"notInterestedTopics":[],"interestedTopics":[],"customFeeds":[],"textSize":1.2,"realityMode":true,"hideReadMode":true}"#,
    )
    .await
    .unwrap();

    let prefs = PreferenceStore::load_from(&main, PreferenceLimits::default()).await.get().await;
    assert_eq!(prefs.read_articles, vec!["a", "b"]);
    assert_eq!(prefs.text_size, 1.2);
    assert!(prefs.reality_mode);
    assert!(prefs.hide_read_mode);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn unreadable_file_means_defaults() {
    let dir = temp_dir("prefs_garbage");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let main = dir.join("preferences.json");
    tokio::fs::write(&main, b"[1, 2").await.unwrap();

    let store = PreferenceStore::load_from(&main, PreferenceLimits::default()).await;
    assert_eq!(store.get().await, UserPreferences::default());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn read_history_is_bounded() {
    let api = DataApi::new(config(Vec::new()), PreferenceStore::in_memory(PreferenceLimits::default()))
        .await
        .unwrap();
    for i in 0..501 {
        api.mark_read(&format!("id-{i}"), &[]).await.unwrap();
    }
    let prefs = api.preferences().await;
    assert_eq!(prefs.read_articles.len(), 500);
    assert!(!prefs.read_articles.contains(&"id-0".to_string()));
    assert_eq!(prefs.read_articles.last().map(String::as_str), Some("id-500"));

    assert!(matches!(api.mark_read("  ", &[]).await, Err(ServiceError::InvalidInput(_))));
}

#[tokio::test]
async fn hide_read_mode_prunes_the_default_view() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[
            ("Stadium football final", "http://f.example/1", "Mon, 21 Oct 2024 07:00:00 GMT"),
            ("Glacier retreat measured", "http://f.example/2", "Mon, 21 Oct 2024 08:00:00 GMT"),
            ("Parliament budget debate", "http://f.example/3", "Mon, 21 Oct 2024 09:00:00 GMT"),
        ])))
        .mount(&server)
        .await;
    let source = FeedSource::new("f", &format!("{}/feed", server.uri()), "F", "world", "🌍");
    let api = DataApi::new(config(vec![source]), PreferenceStore::in_memory(PreferenceLimits::default()))
        .await
        .unwrap();

    let all = api.list_articles(&ArticleQuery::default()).await;
    assert_eq!(all.total, 3);
    let budget_id = all.articles[0].id.clone();

    api.mark_not_interested(&budget_id, &["football".to_string()]).await.unwrap();
    assert_eq!(api.list_articles(&ArticleQuery::default()).await.total, 3);

    api.update_preferences(PreferencesUpdate {
        hide_read_mode: Some(true),
        reality_mode: Some(true),
        ..PreferencesUpdate::default()
    })
    .await;
    let pruned = api.list_articles(&ArticleQuery::default()).await;
    let titles: Vec<_> = pruned.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Glacier retreat measured"]);

    let by_category = ArticleQuery {
        category: Some("world".into()),
        ..ArticleQuery::default()
    };
    assert_eq!(api.list_articles(&by_category).await.total, 3);
}

#[tokio::test]
async fn custom_feeds_are_validated_persisted_and_removable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[(
            "Local council news",
            "http://local.example/1",
            "Mon, 21 Oct 2024 07:00:00 GMT",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>just a page</html>"))
        .mount(&server)
        .await;

    let dir = temp_dir("custom_feeds");
    let builtin = FeedSource::new("wire", &format!("{}/good", server.uri()), "Wire", "world", "🌍");
    let api = DataApi::load_from_dir(config(Vec::new()), &dir).await.unwrap();

    let rejected = api
        .add_feed(AddFeedRequest {
            url: format!("{}/bad", server.uri()),
            ..AddFeedRequest::default()
        })
        .await;
    assert!(matches!(rejected, Err(ServiceError::FeedRejected { .. })));

    let invalid = api.add_feed(AddFeedRequest::default()).await;
    assert!(matches!(invalid, Err(ServiceError::InvalidInput(_))));

    let added = api
        .add_feed(AddFeedRequest {
            url: format!("{}/good", server.uri()),
            category: Some("local".into()),
            ..AddFeedRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(added.key, "custom-mock-feed");
    assert_eq!(added.name, "Mock Feed");
    assert_eq!(added.category, "local");

    let duplicate = api
        .add_feed(AddFeedRequest {
            url: format!("{}/good/", server.uri()),
            ..AddFeedRequest::default()
        })
        .await;
    assert!(matches!(duplicate, Err(ServiceError::DuplicateFeed(_))));

    let local = ArticleQuery {
        category: Some("local".into()),
        ..ArticleQuery::default()
    };
    assert_eq!(api.list_articles(&local).await.total, 1);

    // A fresh instance picks the custom feed up from the preference file.
    let reopened = DataApi::load_from_dir(config(Vec::new()), &dir).await.unwrap();
    assert!(reopened.list_feeds().await.iter().any(|f| f.key == added.key));

    assert!(matches!(
        reopened.remove_feed("wire").await,
        Err(ServiceError::UnknownFeed(_))
    ));
    let removed = reopened.remove_feed(&added.key).await.unwrap();
    assert_eq!(removed.url, added.url);
    assert!(reopened.list_feeds().await.is_empty());
    assert!(reopened.preferences().await.custom_feeds.is_empty());

    let with_builtin = DataApi::load_from_dir(config(vec![builtin]), &dir).await.unwrap();
    assert!(matches!(
        with_builtin.remove_feed("wire").await,
        Err(ServiceError::UnknownFeed(_))
    ));

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

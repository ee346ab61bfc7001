//! Full cycle against a mock catalog server, delivered to a file outbox

use crate::common::{test_config, tiers};
use catalog_herald::config::ChannelConfig;
use catalog_herald::crawler::{Coordinator, CycleOutcome, HtmlCatalog};
use catalog_herald::delivery::{build_channel, PostedRecord, Verifier, VerifierSettings};
use catalog_herald::storage::{SqliteStorage, Storage};
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn detail_page(title: &str, genres: &str) -> String {
    format!(
        r#"<html><head><title>{} - Catalog</title></head><body>
        <table><tr><td class="borderClass"><img data-src="https://cdn.example/{}.jpg"></td></tr></table>
        <p itemprop="description">A story about {}.</p>
        <div><span class="dark_text">Status:</span> Not yet aired</div>
        <div><span class="dark_text">Aired:</span> Not available</div>
        <div><span class="dark_text">Genres:</span> {}</div>
        </body></html>"#,
        title, title, title, genres
    )
}

async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/anime.php"))
        .and(query_param("show", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table>
               <tr><td><a href="/anime/303/Third">Third</a></td></tr>
               <tr><td><a href="/anime/302/Second">Second</a></td></tr>
               <tr><td><a href="/anime/301/First">First</a></td></tr>
               </table>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/anime.php"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/anime/301"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("First", "Action")))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/anime/302"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/anime/303"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("Third", "Hentai")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_cycle_over_http_delivers_to_outbox() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let outbox = dir.path().join("outbox");
    let mut config = test_config(&dir.path().join("herald.db"), tiers(&[(2, 0)]));
    config.catalog.listing_url = format!("{}/anime.php?show={{offset}}", server.uri());
    config.catalog.detail_url = format!("{}/anime/{{id}}", server.uri());
    config.channel = ChannelConfig::File {
        directory: outbox.display().to_string(),
        search_window: 100,
    };

    let storage = SqliteStorage::new(Path::new(&config.storage.database_path)).unwrap();
    let source = HtmlCatalog::from_config(&config).unwrap();
    let mut coordinator = Coordinator::new(config.clone(), "http".to_string(), storage, source);

    let report = coordinator.run_cycle().await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Published);
    assert_eq!(report.new_ids, vec!["301", "302", "303"]);
    assert_eq!(report.enqueued, 2);
    assert_eq!(report.skipped_entries, vec!["302"]);

    let mut announcer_storage =
        SqliteStorage::new(Path::new(&config.storage.database_path)).unwrap();
    let channel = build_channel(&config.channel, &config.user_agent).unwrap();
    let verifier = Verifier::new(channel, VerifierSettings::from(&config.delivery));
    let delivery = verifier
        .deliver_pending(&mut announcer_storage)
        .await
        .unwrap();
    assert_eq!(delivery.committed(), 2);

    let main_feed = std::fs::read_to_string(outbox.join("main.jsonl")).unwrap();
    let records: Vec<PostedRecord> = main_feed
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entry_id, "301");
    assert_eq!(records[0].title, "First");

    let entry = records[0].entry.as_ref().unwrap();
    assert_eq!(entry.air_date, None);
    assert_eq!(entry.synopsis.as_deref(), Some("A story about First."));
    assert_eq!(
        entry.image_url.as_deref(),
        Some("https://cdn.example/First.jpg")
    );

    let restricted_feed = std::fs::read_to_string(outbox.join("restricted.jsonl")).unwrap();
    assert!(restricted_feed.contains("\"303\""));

    assert_eq!(announcer_storage.sorted_seen().unwrap(), vec!["301", "303"]);
    assert!(!announcer_storage.is_seen("302").unwrap());
}

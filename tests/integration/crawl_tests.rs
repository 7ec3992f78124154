//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the registry and run the whole
//! widget protocol end-to-end: start page, report frame, column toggle,
//! pagination and exhibit lookups.

use fara_principals::config::{
    Config, CrawlerConfig, OutputConfig, OutputFormat, SiteConfig, UserAgentConfig,
};
use fara_principals::crawler::{crawl, Coordinator, Fetcher, PendingRequest};
use fara_principals::output::open_feed;
use fara_principals::state::CrawlState;
use fara_principals::FaraError;
use serde_json::Value;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPORT_FRAME: &str = "171:1:0";
const LISTING: &str = "171:130:0::NO:RP,130:P130_DATERANGE:N";

/// Creates a test configuration pointed at the mock registry
fn create_test_config(base_url: &str, items_path: &str, format: OutputFormat) -> Config {
    Config {
        site: SiteConfig {
            start_url: format!("{}/quick-search.html", base_url),
            postback_url: format!("{}/pls/apex/wwv_flow.show", base_url),
        },
        crawler: CrawlerConfig {
            download_delay: 0,
            max_concurrent_exhibits: 2,
            max_retries: 0,
            retry_delay: 0,
            request_timeout: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            items_path: items_path.to_string(),
            format,
        },
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn hidden_fields(report_id: &str) -> String {
    format!(
        r#"<input type="hidden" name="p_instance" value="355896116786" id="pInstance" />
        <input type="hidden" id="apexir_WORKSHEET_ID" value="ws-1" />
        <input type="hidden" id="apexir_REPORT_ID" value="{}" />"#,
        report_id
    )
}

fn row(reg_num: &str, country: &str, date: &str) -> String {
    format!(
        r#"<tr class="odd">
        <td headers="LINK"><a href="f?p=171:200:{reg}">View</a></td>
        <td headers="COUNTRY_NAME">{country}</td>
        <td headers="FP_NAME">Principal {reg}</td>
        <td headers="FP_REG_DATE">{date}</td>
        <td headers="ADDRESS_1">1 Main Street</td>
        <td headers="STATE">&nbsp;</td>
        <td headers="REGISTRANT_NAME">Registrant {reg}</td>
        <td headers="REG_NUMBER">{reg}   </td>
        </tr>"#,
        reg = reg_num,
        country = country,
        date = date
    )
}

fn listing_page(report_id: &str, rows: &[String], label: &str, with_next: bool) -> String {
    let next = if with_next {
        r#"<a href="javascript:void(0)"><img src="/i/jtfunext.gif" title="Next" alt="Next"></a>"#
    } else {
        ""
    };
    format!(
        r#"<html><body>{}<table class="apexir_WORKSHEET_DATA"><tr><th id="LINK"></th></tr>{}</table>
        <table><tr><td class="pagination"><span class="fielddata">{}</span>{}</td></tr></table>
        </body></html>"#,
        hidden_fields(report_id),
        rows.concat(),
        label,
        next
    )
}

fn exhibit_page(links: &[&str], with_next: bool) -> String {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<tr><td><a href="{}">Exhibit AB</a></td></tr>"#, link))
        .collect();
    let next = if with_next {
        r#"<table><tr><td class="pagination"><img src="/i/jtfunext.gif" title="Next" alt="Next"></td></tr></table>"#
    } else {
        ""
    };
    format!(
        r#"<html><body><div id="apexir_DATA_PANEL"><table>{}</table></div>{}</body></html>"#,
        anchors, next
    )
}

/// Mounts the start page, report frame, listing and both listing postbacks
async fn mount_registry(server: &MockServer, last_page_rows: Vec<String>) {
    let last_page = listing_page("rep-3", &last_page_rows, "16 - 17 of 17", false);
    mount_registry_with_last_page(server, last_page).await;
}

async fn mount_registry_with_last_page(server: &MockServer, last_page: String) {
    let base_url = server.uri();

    Mock::given(method("GET"))
        .and(path("/quick-search.html"))
        .respond_with(html(format!(
            r#"<html><body><iframe src="/pls/apex/f?p={}"></iframe></body></html>"#,
            REPORT_FRAME
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pls/apex/f"))
        .and(query_param("p", REPORT_FRAME))
        .respond_with(html(format!(
            r#"<table><tr><td><a href="f?p={}"><img src="/i/p.gif"></a>
            <span><font>Active Foreign Principals</font></span></td></tr></table>"#,
            LISTING
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pls/apex/f"))
        .and(query_param("p", LISTING))
        .respond_with(html(format!(
            "<html><body>{}</body></html>",
            hidden_fields("rep-1")
        )))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/pls/apex/wwv_flow.show"))
        .and(body_string_contains("p_widget_action=BREAK_TOGGLE"))
        .and(body_string_contains("x02=rep-1"))
        .respond_with(html(listing_page(
            "rep-2",
            &[row("5712", "GERMANY", "12/10/1997"), row("6001", "JAPAN", "03/15/2011")],
            "1 - 15 of 17",
            true,
        )))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/pls/apex/wwv_flow.show"))
        .and(body_string_contains("p_widget_action=PAGE"))
        .and(body_string_contains("pgR_min_row%3D16"))
        .and(body_string_contains("x02=rep-2"))
        .and(header(
            "Referer",
            format!("{}/pls/apex/f?p={}", base_url, LISTING).as_str(),
        ))
        .respond_with(html(last_page))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_exhibits(server: &MockServer, reg_num: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/pls/apex/f"))
        .and(query_param("p", format!("171:200:{}", reg_num).as_str()))
        .respond_with(html(body))
        .mount(server)
        .await;
}

fn records_by_reg_num(items: &Value) -> std::collections::BTreeMap<String, Value> {
    items
        .as_array()
        .expect("items should be a JSON array")
        .iter()
        .map(|item| (item["reg_num"].as_str().unwrap().to_string(), item.clone()))
        .collect()
}

#[tokio::test]
async fn test_full_crawl_writes_every_record() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_registry(&mock_server, vec![row("6320", "MEXICO", "02/28/2016")]).await;
    mount_exhibits(
        &mock_server,
        "5712",
        exhibit_page(&["/docs/5712-1.pdf", "/docs/5712-2.pdf"], false),
    )
    .await;
    mount_exhibits(&mock_server, "6001", exhibit_page(&[], false)).await;
    mount_exhibits(&mock_server, "6320", exhibit_page(&["/docs/6320-1.pdf"], false)).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let items_path = temp_dir.path().join("items.json");
    let config = create_test_config(&base_url, items_path.to_str().unwrap(), OutputFormat::Json);

    let stats = crawl(config).await.expect("Crawl should succeed");
    assert_eq!(stats.listing_pages, 2);
    assert_eq!(stats.reported_pages, Some(1));
    assert_eq!(stats.rows, 3);
    assert_eq!(stats.row_failures, 0);
    assert_eq!(stats.records, 3);
    assert_eq!(stats.exhibit_urls, 3);
    assert_eq!(stats.exhibit_failures, 0);

    let content = std::fs::read_to_string(&items_path).unwrap();
    let items: Value = serde_json::from_str(&content).expect("Feed should be valid JSON");
    let records = records_by_reg_num(&items);
    assert_eq!(records.len(), 3);

    let germany = &records["5712"];
    assert_eq!(germany["country"], "GERMANY");
    assert_eq!(germany["state"], Value::Null);
    assert_eq!(germany["date"], "1997-12-10 00:00:00");
    assert_eq!(germany["url"], format!("{}/pls/apex/f?p=171:200:5712", base_url));
    assert_eq!(
        germany["exhibit_urls"],
        serde_json::json!([
            format!("{}/docs/5712-1.pdf", base_url),
            format!("{}/docs/5712-2.pdf", base_url),
        ])
    );

    assert_eq!(records["6001"]["exhibit_urls"], serde_json::json!([]));
    assert_eq!(records["6320"]["country"], "MEXICO");
    assert_eq!(records["6320"]["exhibit_urls"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_rows_and_exhibits_do_not_stop_the_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_registry(
        &mock_server,
        vec![row("6320", "MEXICO", "2016-02-28"), row("6321", "PERU", "04/01/2016")],
    )
    .await;
    mount_exhibits(&mock_server, "5712", exhibit_page(&["/docs/5712-1.pdf"], false)).await;
    mount_exhibits(&mock_server, "6321", exhibit_page(&[], false)).await;
    // 6001 has no mock, so its detail page is a 404

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let items_path = temp_dir.path().join("items.jsonl");
    let config = create_test_config(&base_url, items_path.to_str().unwrap(), OutputFormat::Jsonl);

    let stats = crawl(config).await.expect("Crawl should succeed");
    assert_eq!(stats.rows, 4);
    assert_eq!(stats.row_failures, 1);
    assert_eq!(stats.records, 3);
    assert_eq!(stats.exhibit_failures, 1);

    let content = std::fs::read_to_string(&items_path).unwrap();
    let lines: Vec<Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("Each line should be a JSON object"))
        .collect();
    assert_eq!(lines.len(), 3);

    let japan = lines
        .iter()
        .find(|item| item["reg_num"] == "6001")
        .expect("Record with failed exhibit lookup should still be written");
    assert_eq!(japan["exhibit_urls"], serde_json::json!([]));
    assert!(lines.iter().all(|item| item["reg_num"] != "6320"));
}

#[tokio::test]
async fn test_multi_page_exhibits_abort_the_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_registry(&mock_server, vec![row("6320", "MEXICO", "02/28/2016")]).await;
    mount_exhibits(&mock_server, "5712", exhibit_page(&["/docs/5712-1.pdf"], false)).await;
    mount_exhibits(&mock_server, "6001", exhibit_page(&[], false)).await;
    mount_exhibits(&mock_server, "6320", exhibit_page(&["/docs/6320-1.pdf"], true)).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let items_path = temp_dir.path().join("items.json");
    let config = create_test_config(&base_url, items_path.to_str().unwrap(), OutputFormat::Json);

    let sink = open_feed(&config.output).unwrap();
    let mut coordinator = Coordinator::new(config, sink).unwrap();
    let result = coordinator.run().await;

    assert!(matches!(
        result,
        Err(FaraError::UnsupportedMultiPageExhibits { .. })
    ));
    assert_eq!(coordinator.state(), CrawlState::Aborted);

    // The multi-page record is written with its first page of links, and the
    // feed stays well-formed
    let content = std::fs::read_to_string(&items_path).unwrap();
    let items: Value = serde_json::from_str(&content).expect("Partial feed should be valid JSON");
    let records = records_by_reg_num(&items);
    assert_eq!(
        records["6320"]["exhibit_urls"],
        serde_json::json!([format!("{}/docs/6320-1.pdf", base_url)])
    );
}

#[tokio::test]
async fn test_listing_drift_keeps_parsed_records() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_registry_with_last_page(
        &mock_server,
        "<html><body><p>Session expired</p></body></html>".to_string(),
    )
    .await;

    // Slow detail pages keep both lookups in flight when page 2 fails
    for reg_num in ["5712", "6001"] {
        Mock::given(method("GET"))
            .and(path("/pls/apex/f"))
            .and(query_param("p", format!("171:200:{}", reg_num).as_str()))
            .respond_with(
                html(exhibit_page(&["/docs/exhibit.pdf"], false))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&mock_server)
            .await;
    }

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let items_path = temp_dir.path().join("items.json");
    let config = create_test_config(&base_url, items_path.to_str().unwrap(), OutputFormat::Json);

    let sink = open_feed(&config.output).unwrap();
    let mut coordinator = Coordinator::new(config, sink).unwrap();
    let result = coordinator.run().await;

    match result {
        Err(FaraError::ProtocolDrift { expectation, .. }) => {
            assert_eq!(expectation, "listing table")
        }
        other => panic!("expected protocol drift, got {:?}", other),
    }
    assert_eq!(coordinator.state(), CrawlState::Aborted);

    let content = std::fs::read_to_string(&items_path).unwrap();
    let items: Value = serde_json::from_str(&content).expect("Partial feed should be valid JSON");
    let records = records_by_reg_num(&items);
    assert_eq!(records.len(), 2);
    assert_eq!(records["5712"]["exhibit_urls"].as_array().unwrap().len(), 1);
    assert_eq!(records["6001"]["country"], "JAPAN");
}

#[tokio::test]
async fn test_setup_failure_leaves_empty_feed() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let items_path = temp_dir.path().join("items.json");
    let mut config = create_test_config(
        "http://127.0.0.1:9",
        items_path.to_str().unwrap(),
        OutputFormat::Json,
    );
    config.site.postback_url = "not a url".to_string();

    let result = crawl(config).await;
    assert!(matches!(result, Err(FaraError::UrlParse(_))));

    let content = std::fs::read_to_string(&items_path).unwrap();
    let items: Value = serde_json::from_str(&content).expect("Feed should be valid JSON");
    assert_eq!(items, serde_json::json!([]));
}

#[tokio::test]
async fn test_missing_iframe_is_protocol_drift() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/quick-search.html"))
        .respond_with(html("<html><body>Down for maintenance</body></html>".to_string()))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let items_path = temp_dir.path().join("items.json");
    let config = create_test_config(&base_url, items_path.to_str().unwrap(), OutputFormat::Json);

    let sink = open_feed(&config.output).unwrap();
    let mut coordinator = Coordinator::new(config, sink).unwrap();
    let result = coordinator.run().await;

    match result {
        Err(FaraError::ProtocolDrift { expectation, .. }) => {
            assert_eq!(expectation, "report iframe")
        }
        other => panic!("expected protocol drift, got {:?}", other),
    }
    assert_eq!(coordinator.state(), CrawlState::Aborted);

    let content = std::fs::read_to_string(&items_path).unwrap();
    let items: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(items, serde_json::json!([]));
}

#[tokio::test]
async fn test_fetcher_retries_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html("<html>ok</html>".to_string()))
        .mount(&mock_server)
        .await;

    let crawler = CrawlerConfig {
        download_delay: 0,
        max_retries: 1,
        retry_delay: 0,
        ..Default::default()
    };
    let fetcher = Fetcher::new(&UserAgentConfig::default(), &crawler).unwrap();
    let url = Url::parse(&format!("{}/flaky", mock_server.uri())).unwrap();

    let page = fetcher.fetch(&PendingRequest::get(url)).await.unwrap();
    assert_eq!(page.status, 200);
    assert_eq!(page.body, "<html>ok</html>");
}

#[tokio::test]
async fn test_fetcher_does_not_retry_client_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let crawler = CrawlerConfig {
        download_delay: 0,
        max_retries: 3,
        retry_delay: 0,
        ..Default::default()
    };
    let fetcher = Fetcher::new(&UserAgentConfig::default(), &crawler).unwrap();
    let url = Url::parse(&format!("{}/missing", mock_server.uri())).unwrap();

    let result = fetcher.fetch(&PendingRequest::get(url)).await;
    assert!(matches!(result, Err(FaraError::HttpStatus { status: 404, .. })));
}

#[tokio::test]
async fn test_fetcher_keeps_download_delay() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html("<html></html>".to_string()))
        .mount(&mock_server)
        .await;

    let crawler = CrawlerConfig {
        download_delay: 150,
        max_retries: 0,
        ..Default::default()
    };
    let fetcher = Fetcher::new(&UserAgentConfig::default(), &crawler).unwrap();
    let url = Url::parse(&format!("{}/page", mock_server.uri())).unwrap();

    let start = Instant::now();
    for _ in 0..3 {
        fetcher.fetch(&PendingRequest::get(url.clone())).await.unwrap();
    }
    assert!(start.elapsed() >= Duration::from_millis(300));
}

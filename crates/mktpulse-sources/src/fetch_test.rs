use std::path::PathBuf;

use chrono::NaiveDate;
use mktpulse_core::{parse_pipeline_config, AppConfig, PeriodWindows, UnavailableReason};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const PIPELINE: &str = r#"
brand: dtcpay
analytics:
  property_id: "p1"
  intent_event: sign_up_intent
  app_click_event: app_download_click
spreadsheet:
  spreadsheet_id: sheet-1
  sheet_name: "2026"
social:
  - platform: X
    column: H
    source:
      kind: scrape
      url: "<b>2,310</b> Followers"
      label: Followers
  - platform: YouTube
    column: P
    source:
      kind: channel
      channel_id: UC123
recorder:
  users_column: B
channel_labels:
  t.co: X
"#;

const RUN_REPORT: &str = "/v1beta/properties/p1:runReport";
const KEY_COLUMN: &str = "/v4/spreadsheets/sheet-1/values/%272026%27%21A%3AA";

fn app_config(browser_bin: &str) -> AppConfig {
    AppConfig {
        gcp_client_id: "client".to_string(),
        gcp_client_secret: "secret".to_string(),
        gcp_refresh_token: "refresh".to_string(),
        gcp_token_uri: String::new(),
        gemini_api_key: None,
        gemini_model: "gemini-2.5-flash".to_string(),
        generation_temperature: 0.4,
        lark_webhook_url: None,
        pipeline_path: PathBuf::from("config/pipeline.yaml"),
        log_level: "info".to_string(),
        source_timeout_secs: 1,
        http_timeout_secs: 30,
        user_agent: "pulse-test".to_string(),
        browser_bin: browser_bin.to_string(),
        browser_render_budget_ms: 10,
    }
}

fn fetcher_for(server: &MockServer, browser_bin: &str) -> SourceFetcher {
    let uri = server.uri();
    let endpoints = Endpoints {
        token_uri: format!("{uri}/token"),
        analytics: uri.clone(),
        sheets: uri.clone(),
        channels: uri,
    };
    let pipeline = parse_pipeline_config(PIPELINE).unwrap();
    SourceFetcher::with_endpoints(&app_config(browser_bin), &pipeline, &endpoints).unwrap()
}

fn windows() -> PeriodWindows {
    PeriodWindows::weekly(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
}

fn report_json(value: u64) -> serde_json::Value {
    serde_json::json!({ "rows": [{ "metricValues": [{ "value": value.to_string() }] }] })
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok", "expires_in": 3599
        })))
        .mount(server)
        .await;
}

async fn mount_scalar(server: &MockServer, body: serde_json::Value, value: u64) {
    Mock::given(method("POST"))
        .and(path(RUN_REPORT))
        .and(body_partial_json(body))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_json(value)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn one_failing_source_does_not_affect_the_others() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_scalar(
        &server,
        serde_json::json!({
            "dateRanges": [{ "startDate": "2025-12-29", "endDate": "2026-01-04" }],
            "metrics": [{ "name": "activeUsers" }]
        }),
        1520,
    )
    .await;
    mount_scalar(
        &server,
        serde_json::json!({
            "dateRanges": [{ "startDate": "2025-12-22", "endDate": "2025-12-28" }],
            "metrics": [{ "name": "activeUsers" }]
        }),
        1200,
    )
    .await;
    mount_scalar(
        &server,
        serde_json::json!({
            "dimensionFilter": { "filter": { "stringFilter": { "value": "sign_up_intent" } } }
        }),
        64,
    )
    .await;
    mount_scalar(
        &server,
        serde_json::json!({
            "dimensionFilter": { "filter": { "stringFilter": { "value": "app_download_click" } } }
        }),
        9,
    )
    .await;
    Mock::given(method("POST"))
        .and(path(RUN_REPORT))
        .and(body_partial_json(serde_json::json!({ "dimensions": [{ "name": "country" }] })))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(RUN_REPORT))
        .and(body_partial_json(
            serde_json::json!({ "dimensions": [{ "name": "sessionSourceMedium" }] }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "rows": [
                { "dimensionValues": [{ "value": "t.co / referral" }], "metricValues": [{ "value": "30" }] },
                { "dimensionValues": [{ "value": "google / organic" }], "metricValues": [{ "value": "20" }] }
            ]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(KEY_COLUMN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "values": [["Date"], ["22/12/2025"], ["29/12/2025"]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/%272026%27%213%3A3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "values": [["29/12/2025", "1520", "", "", "", "", "", "1.2K"]]
        })))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, "echo");
    let credential = fetcher.authorize().await;
    let samples = fetcher.fetch_report_samples(&windows(), &credential).await;

    assert_eq!(samples.users_current.value(), Some(&1520));
    assert_eq!(samples.users_comparison.value(), Some(&1200));
    assert_eq!(samples.intent_total.value(), Some(&64));
    assert_eq!(samples.app_clicks.value(), Some(&9));
    assert_eq!(
        samples.intent_by_country.unavailable_reason(),
        Some(UnavailableReason::TransportError)
    );
    assert_eq!(
        samples.channels.value().unwrap(),
        &vec![
            RankedEntry::new("X", 30),
            RankedEntry::new("google / organic", 20)
        ]
    );

    assert_eq!(samples.social.len(), 2);
    assert_eq!(samples.social[0].platform, "X");
    assert_eq!(samples.social[0].count, Ok(1_200));
    assert_eq!(
        samples.social[1].count.as_ref().unwrap_err().reason,
        UnavailableReason::NotFound
    );

    let unavailable = samples.unavailable();
    assert!(unavailable.contains(&(
        "analytics.intent_by_country".to_string(),
        UnavailableReason::TransportError
    )));
    assert!(unavailable.contains(&("sheet.youtube".to_string(), UnavailableReason::NotFound)));
    assert_eq!(unavailable.len(), 2);
}

#[tokio::test]
async fn rejected_refresh_degrades_google_sources_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(RUN_REPORT))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_json(1)))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, "echo");
    let credential = fetcher.authorize().await;
    assert!(credential.is_err());

    let samples = fetcher.fetch_report_samples(&windows(), &credential).await;
    assert_eq!(
        samples.users_current.unavailable_reason(),
        Some(UnavailableReason::AuthError)
    );
    assert_eq!(
        samples.channels.unavailable_reason(),
        Some(UnavailableReason::AuthError)
    );
    assert!(samples
        .social
        .iter()
        .all(|s| s.count.as_ref().unwrap_err().reason == UnavailableReason::AuthError));

    // Scrapers do not depend on the token.
    let metrics = fetcher
        .fetch_recorder_metrics(&windows().report, &credential)
        .await;
    assert_eq!(metrics.social[0].sample.value(), Some(&2_310));
    assert_eq!(
        metrics.social[1].sample.unavailable_reason(),
        Some(UnavailableReason::AuthError)
    );
}

#[tokio::test]
async fn missing_sheet_key_is_not_found_for_every_platform() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(RUN_REPORT))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_json(5)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(KEY_COLUMN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "values": [["Date"], ["22/12/2025"]]
        })))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, "echo");
    let credential = fetcher.authorize().await;
    let samples = fetcher.fetch_report_samples(&windows(), &credential).await;

    assert_eq!(samples.users_current.value(), Some(&5));
    assert!(samples
        .social
        .iter()
        .all(|s| s.count.as_ref().unwrap_err().reason == UnavailableReason::NotFound));
}

#[tokio::test]
async fn slow_source_times_out_as_transport_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "items": [{ "statistics": { "subscriberCount": "842" } }]
                }))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(RUN_REPORT))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_json(1520)))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, "echo");
    let credential = fetcher.authorize().await;
    let metrics = fetcher
        .fetch_recorder_metrics(&windows().report, &credential)
        .await;

    assert_eq!(metrics.users.value(), Some(&1520));
    let youtube = &metrics.social[1];
    assert_eq!(youtube.column, "P");
    assert_eq!(
        youtube.sample.unavailable_reason(),
        Some(UnavailableReason::TransportError)
    );
}

#[tokio::test]
async fn recorder_collects_scraped_and_channel_counts() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "statistics": { "subscriberCount": "842" } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(RUN_REPORT))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_json(1520)))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, "echo");
    let credential = fetcher.authorize().await;
    let metrics = fetcher
        .fetch_recorder_metrics(&windows().report, &credential)
        .await;

    assert_eq!(metrics.window, windows().report);
    assert_eq!(metrics.social[0].column, "H");
    assert_eq!(metrics.social[0].sample.value(), Some(&2_310));
    assert_eq!(metrics.social[1].sample.value(), Some(&842));
}

#[tokio::test]
async fn missing_browser_only_fails_the_scraped_platform() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(RUN_REPORT))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_json(1520)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "statistics": { "subscriberCount": "842" } }]
        })))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, "/nonexistent/mktpulse-browser");
    let credential = fetcher.authorize().await;
    let metrics = fetcher
        .fetch_recorder_metrics(&windows().report, &credential)
        .await;

    assert_eq!(metrics.users.value(), Some(&1520));
    assert_eq!(
        metrics.social[0].sample.unavailable_reason(),
        Some(UnavailableReason::TransportError)
    );
    assert_eq!(metrics.social[1].sample.value(), Some(&842));
}

#[tokio::test]
async fn monthly_social_reads_latest_row_recorded_in_the_month() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(RUN_REPORT))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_json(1)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(KEY_COLUMN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "values": [["Date"], ["5/1/2026"], ["12/1/2026"], ["26/1/2026"], ["2/2/2026"]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/%272026%27%214%3A4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "values": [["26/1/2026", "1490", "", "", "", "", "", "3,100"]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, "echo");
    let credential = fetcher.authorize().await;
    let january = PeriodWindows::monthly(NaiveDate::from_ymd_opt(2026, 2, 3).unwrap());
    let samples = fetcher.fetch_report_samples(&january, &credential).await;

    assert_eq!(samples.social[0].platform, "X");
    assert_eq!(samples.social[0].count, Ok(3_100));
    assert_eq!(
        samples.social[1].count.as_ref().unwrap_err().reason,
        UnavailableReason::NotFound
    );
}

use std::path::Path;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use covid_sentiment_dashboard::api::{self, AppState};
use covid_sentiment_dashboard::{DashboardConfig, Dataset};
use serde_json::Value;
use tower::ServiceExt;

fn fixture_app() -> Router {
    let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/data");
    let dataset = Dataset::load(DashboardConfig::new(data_dir)).unwrap();
    api::app(AppState::new(dataset))
}

fn empty_app() -> Router {
    api::app(AppState::new(Dataset::empty(DashboardConfig::new("unused"))))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = get(empty_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn dates_list_the_configured_window() {
    let (status, body) = get(empty_app(), "/api/dates").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start_date"], "2020-03-20");
    assert_eq!(body["end_date"], "2021-03-25");
    assert_eq!(body["dates"].as_array().unwrap().len(), 371);
}

#[tokio::test]
async fn bad_date_is_a_client_error() {
    let (status, body) = get(empty_app(), "/api/r_numbers?date=21/03/2020").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_DATE");
}

async fn assert_invalid_query(uri: &str) {
    let response = empty_app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json",
        "{uri}"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "INVALID_QUERY", "{uri}");
    assert!(body["error"]["message"].as_str().unwrap().starts_with("Invalid query"));
}

#[tokio::test]
async fn unknown_topic_is_a_json_error() {
    assert_invalid_query("/api/notable_days?topic=flu").await;
}

#[tokio::test]
async fn unknown_technique_is_a_json_error() {
    assert_invalid_query("/api/corr_mat?sentiment_type=bert").await;
}

#[tokio::test]
async fn missing_date_is_a_json_error() {
    assert_invalid_query("/api/r_numbers").await;
}

#[tokio::test]
async fn topic_and_its_alias_together_are_a_json_error() {
    assert_invalid_query("/api/hashtag_table?date=2020-03-21&topic=covid&source=lockdown").await;
}

#[tokio::test]
async fn missing_geojson_is_not_found() {
    let (status, body) = get(empty_app(), "/api/geojson").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn covid_stats_sum_cumulative_counts() {
    let (status, body) = get(fixture_app(), "/api/covid_stats?date=2020-03-21").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_cases"], 4670);
    assert_eq!(body["total_deaths"], 202);
}

#[tokio::test]
async fn r_number_uses_the_covering_week() {
    let (_, body) = get(fixture_app(), "/api/r_numbers?date=2020-03-21").await;
    assert_eq!(body["r_number"], "~2.25");

    let (_, body) = get(empty_app(), "/api/r_numbers?date=2020-03-21").await;
    assert_eq!(body["r_number"], "N/A");
}

#[tokio::test]
async fn county_sentiment_defaults_to_nn_scores() {
    let (status, body) = get(fixture_app(), "/api/county_sentiment?date=2020-03-20").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["county"], "Somerset");
    assert_eq!(rows[0]["score"], 0.2);
}

#[tokio::test]
async fn sentiment_bar_chart_accepts_legacy_parameter_names() {
    let (status, body) = get(
        fixture_app(),
        "/api/sentiment_bar_chart?date=2020-03-20&source=covid&sentiment_type=vader",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 12);
    let total: u64 = rows.iter().map(|row| row["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn daily_news_lists_headlines_for_the_day() {
    let (_, body) = get(fixture_app(), "/api/daily_news?date=2020-03-21").await;
    assert_eq!(body["headlines"].as_array().unwrap().len(), 2);
    assert_eq!(body["headlines"][1]["url"], "https://example.org/shops");
}

#[tokio::test]
async fn notable_days_return_six_entries() {
    let (status, body) = get(fixture_app(), "/api/notable_days?topic=covid&nlp_type=vader").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0]["kind"], "highest_tweet_volume_day");
    assert_eq!(rows[0]["period"], "2020-03-20");
}

#[tokio::test]
async fn dropdown_switches_between_views() {
    let (_, body) = get(fixture_app(), "/api/dropdown_figure").await;
    assert!(body["comparison"].is_array());

    let (_, body) = get(
        fixture_app(),
        "/api/dropdown_figure?chart_value=show_sentiment_vs_time",
    )
    .await;
    assert_eq!(body["sentiment"].as_array().unwrap().len(), 4);
    assert_eq!(body["volume"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn correlation_matrix_is_square() {
    let (status, body) = get(fixture_app(), "/api/corr_mat?nlp_type=nn").await;
    assert_eq!(status, StatusCode::OK);
    let labels = body["matrix"]["labels"].as_array().unwrap().len();
    let values = body["matrix"]["values"].as_array().unwrap();
    assert_eq!(values.len(), labels);
    assert!(values.iter().all(|row| row.as_array().unwrap().len() == labels));
}

//! JSON endpoints consumed by the dashboard front end.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Query, State},
    http::request::Parts,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::dataset::Dataset;
use crate::dates::parse_day;
use crate::error::{DashboardError, DashboardResult};
use crate::indicators::{covid_totals, emojis_for_week, hashtags_for, news_for, r_number_label};
use crate::models::{LabelCount, NotableRecord, RankedItem, Technique, Topic};
use crate::views::{self, CorrelationView, CountyScore, DatesView, StatsGraph};

#[derive(Clone)]
pub struct AppState {
    pub dataset: Arc<Dataset>,
}

impl AppState {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
        }
    }
}

/// Query string extractor whose rejections use the JSON error body.
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = DashboardError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| DashboardError::InvalidQuery(rejection.body_text()))
    }
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    date: String,
}

impl DateQuery {
    fn day(&self) -> DashboardResult<NaiveDate> {
        parse_day(&self.date)
    }
}

#[derive(Debug, Deserialize)]
pub struct TopicDateQuery {
    date: String,
    #[serde(alias = "source")]
    topic: Option<Topic>,
    #[serde(alias = "sentiment_type")]
    nlp_type: Option<Technique>,
}

impl TopicDateQuery {
    fn day(&self) -> DashboardResult<NaiveDate> {
        parse_day(&self.date)
    }

    fn topic(&self) -> Topic {
        self.topic.unwrap_or(Topic::Covid)
    }

    fn technique_or(&self, default: Technique) -> Technique {
        self.nlp_type.unwrap_or(default)
    }
}

#[derive(Debug, Deserialize)]
pub struct TopicQuery {
    topic: Option<Topic>,
    #[serde(alias = "sentiment_type")]
    nlp_type: Option<Technique>,
    chart_value: Option<ChartValue>,
}

impl TopicQuery {
    fn topic(&self) -> Topic {
        self.topic.unwrap_or(Topic::Covid)
    }

    fn technique(&self) -> Technique {
        self.nlp_type.unwrap_or(Technique::Vader)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartValue {
    ShowSentimentVsTime,
    #[default]
    ShowSentimentComparison,
}

#[derive(Debug, Serialize)]
pub struct CovidStatsResponse {
    date: NaiveDate,
    total_deaths: i64,
    total_cases: i64,
}

#[derive(Debug, Serialize)]
pub struct RNumberResponse {
    date: NaiveDate,
    r_number: String,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    date: NaiveDate,
    headlines: Vec<Headline>,
}

#[derive(Debug, Serialize)]
pub struct Headline {
    headline: String,
    url: String,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn dates(State(state): State<AppState>) -> Json<DatesView> {
    Json(views::dates(&state.dataset))
}

async fn covid_stats(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> DashboardResult<Json<CovidStatsResponse>> {
    let date = query.day()?;
    let totals = covid_totals(&state.dataset.covid_stats, date);
    Ok(Json(CovidStatsResponse {
        date,
        total_deaths: totals.total_deaths as i64,
        total_cases: totals.total_cases as i64,
    }))
}

async fn r_numbers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> DashboardResult<Json<RNumberResponse>> {
    let date = query.day()?;
    Ok(Json(RNumberResponse {
        date,
        r_number: r_number_label(&state.dataset.r_numbers, date),
    }))
}

async fn county_sentiment(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopicDateQuery>,
) -> DashboardResult<Json<Vec<CountyScore>>> {
    let date = query.day()?;
    Ok(Json(views::county_sentiment(
        &state.dataset,
        query.topic(),
        query.technique_or(Technique::Nn),
        date,
    )))
}

async fn geojson(State(state): State<AppState>) -> DashboardResult<Json<Value>> {
    state
        .dataset
        .geojson
        .clone()
        .map(Json)
        .ok_or_else(|| DashboardError::NotFound("county boundaries".to_string()))
}

async fn sentiment_bar_chart(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopicDateQuery>,
) -> DashboardResult<Json<Vec<LabelCount>>> {
    let date = query.day()?;
    Ok(Json(views::label_counts(
        &state.dataset,
        query.topic(),
        query.technique_or(Technique::Vader),
        date,
    )))
}

async fn emoji_bar_chart(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopicDateQuery>,
) -> DashboardResult<Json<Vec<RankedItem>>> {
    let date = query.day()?;
    let dataset = &state.dataset;
    Ok(Json(emojis_for_week(
        &dataset.topic(query.topic()).emojis,
        dataset.config.start,
        date,
    )?))
}

async fn hashtag_table(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopicDateQuery>,
) -> DashboardResult<Json<Vec<RankedItem>>> {
    let date = query.day()?;
    Ok(Json(hashtags_for(
        &state.dataset.topic(query.topic()).hashtags,
        date,
    )?))
}

async fn daily_news(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> DashboardResult<Json<NewsResponse>> {
    let date = query.day()?;
    let headlines = news_for(&state.dataset.news, date)
        .into_iter()
        .map(|row| Headline {
            headline: row.headline.clone(),
            url: row.url.clone(),
        })
        .collect();
    Ok(Json(NewsResponse { date, headlines }))
}

async fn stats_graph(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> DashboardResult<Json<StatsGraph>> {
    let date = query.day()?;
    Ok(Json(views::stats_graph(&state.dataset, date)))
}

async fn ma_sent_graph(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopicDateQuery>,
) -> DashboardResult<Json<Value>> {
    let date = query.day()?;
    let series = views::sentiment_graph(
        &state.dataset,
        query.topic(),
        query.technique_or(Technique::Vader),
        date,
    );
    Ok(Json(json!({ "series": series })))
}

async fn notable_days(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopicQuery>,
) -> DashboardResult<Json<Vec<NotableRecord>>> {
    Ok(Json(views::notable_days(
        &state.dataset,
        query.topic(),
        query.technique(),
    )?))
}

async fn dropdown_figure(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopicQuery>,
) -> DashboardResult<Json<Value>> {
    let dataset = &state.dataset;
    let end = dataset.config.end;
    let body = match query.chart_value.unwrap_or_default() {
        ChartValue::ShowSentimentVsTime => serde_json::to_value(views::sentiment_vs_volume(
            dataset,
            query.topic(),
            query.technique(),
            end,
        )?)?,
        ChartValue::ShowSentimentComparison => json!({
            "comparison": views::technique_comparison(dataset, query.topic(), end)?
        }),
    };
    Ok(Json(body))
}

async fn corr_mat(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopicQuery>,
) -> DashboardResult<Json<CorrelationView>> {
    Ok(Json(views::correlation(
        &state.dataset,
        query.topic(),
        query.technique(),
    )?))
}

/// API routes without middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dates", get(dates))
        .route("/covid_stats", get(covid_stats))
        .route("/r_numbers", get(r_numbers))
        .route("/county_sentiment", get(county_sentiment))
        .route("/geojson", get(geojson))
        .route("/sentiment_bar_chart", get(sentiment_bar_chart))
        .route("/emoji_bar_chart", get(emoji_bar_chart))
        .route("/hashtag_table", get(hashtag_table))
        .route("/daily_news", get(daily_news))
        .route("/stats_graph", get(stats_graph))
        .route("/ma_sent_graph", get(ma_sent_graph))
        .route("/notable_days", get(notable_days))
        .route("/dropdown_figure", get(dropdown_figure))
        .route("/corr_mat", get(corr_mat))
}

/// Full application: `/health`, `/api/*`, CORS and request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

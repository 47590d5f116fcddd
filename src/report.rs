use std::fmt::Write;

use crate::dataset::Dataset;
use crate::error::DashboardResult;
use crate::models::{NotableRecord, SmoothedSeries, Technique, Topic};
use crate::views;

fn latest(series: &SmoothedSeries) -> Option<f64> {
    series.points.last().map(|point| point.value)
}

pub fn format_notable(record: &NotableRecord) -> String {
    match &record.period {
        Some(period) => format!("{}: {} ({:.3})", record.kind.title(), period, record.rate),
        None => format!("{}: none", record.kind.title()),
    }
}

pub fn build_report(dataset: &Dataset, topic: Topic, technique: Technique) -> DashboardResult<String> {
    let config = &dataset.config;
    let notable = views::notable_days(dataset, topic, technique)?;
    let stats = views::stats_graph(dataset, config.end);
    let sentiment = views::sentiment_graph(dataset, topic, technique, config.end);

    let mut output = String::new();

    let _ = writeln!(output, "# COVID-19 Tweet Sentiment Report");
    let _ = writeln!(
        output,
        "Generated for {} tweets scored by {} ({} to {})",
        topic, technique, config.start, config.end
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Notable Days");

    for record in &notable {
        let _ = writeln!(output, "- {}", format_notable(record));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Latest {}-Day Averages", config.window);

    if stats.series.iter().all(|series| series.cases.is_empty()) {
        let _ = writeln!(output, "No case data recorded for this window.");
    } else {
        for series in &stats.series {
            let cases = series.cases.last().map_or(0.0, |point| point.value);
            let deaths = series.deaths.last().map_or(0.0, |point| point.value);
            let _ = writeln!(
                output,
                "- {}: {:.1} cases, {:.1} deaths per day",
                series.region, cases, deaths
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Latest Sentiment");

    let scored = dataset
        .topic(topic)
        .county_sentiment
        .iter()
        .any(|record| (config.start..=config.end).contains(&record.date));
    let mut ranked: Vec<(&str, f64)> = if scored {
        sentiment
            .iter()
            .filter_map(|series| Some((series.region.as_str(), latest(series)?)))
            .collect()
    } else {
        Vec::new()
    };
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    if ranked.is_empty() {
        let _ = writeln!(output, "No sentiment recorded for this window.");
    } else {
        for (region, score) in ranked {
            let _ = writeln!(output, "- {}: {:+.3}", region, score);
        }
    }

    Ok(output)
}

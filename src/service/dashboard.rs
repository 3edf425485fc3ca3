//! Dashboard aggregation: stat cards and grouped charts from dashboard.yml.

use crate::config::{Aggregate, DashboardConfig, EntityCatalog};
use crate::service::crud::CrudRepository;
use crate::sql;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatView {
    pub label: String,
    pub value: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    /// Entity the card links to.
    pub entity: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub title: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub color_bg: Option<String>,
    pub color_border: Option<String>,
    pub colors: Option<Vec<String>>,
}

#[derive(Debug, Default, Serialize)]
pub struct DashboardView {
    pub stats: Vec<StatView>,
    pub charts: Vec<ChartView>,
}

/// Two decimals with comma thousands separators, e.g. `12,345.60`.
pub fn format_decimal(n: f64) -> String {
    let fixed = format!("{:.2}", n.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if n < 0.0 && !fixed.trim_matches(|c| c == '0' || c == '.').is_empty() { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac)
}

fn value_as_f64(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

fn format_stat(raw: &Value, aggregate: Aggregate) -> String {
    match aggregate {
        Aggregate::Sum | Aggregate::Avg => format_decimal(value_as_f64(raw)),
        Aggregate::Count => match raw {
            Value::Null => "0".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

fn label_text(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Build every stat and chart. Entries with unknown entities or failing queries are skipped.
pub async fn build_dashboard(
    repo: &CrudRepository,
    catalog: &EntityCatalog,
    config: &DashboardConfig,
    locale: &str,
) -> DashboardView {
    let mut view = DashboardView::default();

    for stat in &config.stats {
        let Some(entity) = catalog.get(&stat.entity) else { continue };
        let Some(aggregate) = Aggregate::parse(&stat.aggregate) else { continue };
        let Some(q) = sql::stat_query(entity, stat, repo.dialect()) else { continue };
        match repo.fetch_scalar(&q).await {
            Ok(raw) => view.stats.push(StatView {
                label: stat.label(locale),
                value: format_stat(&raw, aggregate),
                icon: stat.icon.clone(),
                color: stat.color.clone(),
                entity: entity.name().to_string(),
            }),
            Err(e) => tracing::warn!(entity = %stat.entity, error = %e, sql = %q.sql(), "dashboard stat query failed; skipped"),
        }
    }

    for chart in &config.charts {
        let Some(entity) = catalog.get(&chart.entity) else { continue };
        let label_entity = chart.label_join_entity.as_deref().and_then(|name| catalog.get(name));
        let q = sql::chart_query(entity, chart, label_entity, repo.dialect());
        match repo.fetch_rows(&q).await {
            Ok(rows) => {
                let labels = rows.iter().map(|r| label_text(r.get("label"))).collect();
                let values = rows.iter().map(|r| r.get("value").map(value_as_f64).unwrap_or(0.0)).collect();
                view.charts.push(ChartView {
                    title: chart.title(locale),
                    type_: chart.type_.clone(),
                    labels,
                    values,
                    color_bg: chart.color_bg.clone(),
                    color_border: chart.color_border.clone(),
                    colors: chart.colors.clone(),
                });
            }
            Err(e) => tracing::warn!(entity = %chart.entity, error = %e, sql = %q.sql(), "dashboard chart query failed; skipped"),
        }
    }

    view
}

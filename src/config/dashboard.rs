//! Dashboard config (config/dashboard.yml): stat cards and grouped charts.

use crate::config::types::resolve_label;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default)]
    pub stats: Vec<DashboardStatDefinition>,
    #[serde(default)]
    pub charts: Vec<DashboardChartDefinition>,
}

/// Aggregate function for a stat or chart value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
}

impl Aggregate {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "count" => Some(Aggregate::Count),
            "sum" => Some(Aggregate::Sum),
            "avg" => Some(Aggregate::Avg),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatDefinition {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub label_i18n: HashMap<String, String>,
    /// Entity key from the entity YAML.
    #[serde(default)]
    pub entity: String,
    #[serde(default = "default_aggregate")]
    pub aggregate: String,
    /// Column summed or averaged.
    #[serde(default)]
    pub column: Option<String>,
    /// Optional WHERE condition, e.g. `IsDeleted = 0`.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

fn default_aggregate() -> String {
    "count".into()
}

impl DashboardStatDefinition {
    pub fn label(&self, locale: &str) -> String {
        resolve_label(Some(&self.label_i18n), &self.label, locale)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardChartDefinition {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_i18n: HashMap<String, String>,
    #[serde(rename = "type", default = "default_chart_type")]
    pub type_: String,
    #[serde(default)]
    pub entity: String,
    #[serde(default = "default_aggregate")]
    pub value_aggregate: String,
    #[serde(default)]
    pub value_column: Option<String>,
    /// Column or expression grouped on when no label join is set.
    #[serde(default)]
    pub group_expression: Option<String>,
    #[serde(default)]
    pub label_join_entity: Option<String>,
    /// Our column joined to the label entity's key.
    #[serde(default)]
    pub label_join_key: Option<String>,
    #[serde(default)]
    pub label_join_display: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order_dir: Option<String>,
    #[serde(default = "default_chart_limit")]
    pub limit: u32,
    #[serde(default)]
    pub color_bg: Option<String>,
    #[serde(default)]
    pub color_border: Option<String>,
    /// Per-slice colors for doughnut / pie charts.
    #[serde(default)]
    pub colors: Option<Vec<String>>,
}

fn default_chart_type() -> String {
    "bar".into()
}

fn default_chart_limit() -> u32 {
    10
}

impl DashboardChartDefinition {
    pub fn title(&self, locale: &str) -> String {
        resolve_label(Some(&self.title_i18n), &self.title, locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_defaults() {
        let yaml = r#"
charts:
  - title: Invoices by country
    entity: invoice
    groupExpression: BillingCountry
"#;
        let cfg: DashboardConfig = serde_yaml::from_str(yaml).unwrap();
        let chart = &cfg.charts[0];
        assert_eq!(chart.type_, "bar");
        assert_eq!(chart.value_aggregate, "count");
        assert_eq!(chart.limit, 10);
        assert!(cfg.stats.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let yaml = "stats:\n  - label: Customers\n    entity: customer\n    widget: big\n";
        let cfg: DashboardConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.stats[0].aggregate, "count");
    }

    #[test]
    fn aggregate_parse() {
        assert_eq!(Aggregate::parse("SUM"), Some(Aggregate::Sum));
        assert_eq!(Aggregate::parse("median"), None);
    }
}

//! List paging helpers: count toggle, extra-row trimming, filter extraction.

use crate::config::{FilterKind, ResolvedEntity};
use serde_json::Value;
use std::collections::HashMap;

/// Explicit `count` query value wins; blank falls back to `paging.enableCount`.
pub fn resolve_count_enabled(entity: &ResolvedEntity, raw: Option<&str>) -> bool {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => entity.def().paging.enable_count,
        Some(v) => !(v.eq_ignore_ascii_case("false") || v == "0"),
    }
}

#[derive(Debug, Default)]
pub struct PagedItems {
    pub items: Vec<Value>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Trim the look-ahead row and derive the next keyset cursor from the last kept row.
pub fn build_paged_items(entity: &ResolvedEntity, mut rows: Vec<Value>, page_size: u32, expect_extra: bool) -> PagedItems {
    let page_size = page_size as usize;
    let has_more = expect_extra && rows.len() > page_size;
    if has_more {
        rows.truncate(page_size);
    }
    let next_cursor = if has_more {
        rows.last().and_then(|row| row.get(entity.key())).and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    } else {
        None
    };
    PagedItems {
        items: rows,
        has_more,
        next_cursor,
    }
}

/// Pick filter values out of raw query pairs, keyed the way the WHERE builder expects.
pub fn collect_filters(entity: &ResolvedEntity, query: &[(String, String)]) -> HashMap<String, String> {
    let first = |name: &str| query.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());
    let mut out = HashMap::new();
    for (key, filter) in &entity.def().filters {
        match filter.kind() {
            FilterKind::Range | FilterKind::DateRange => {
                let (lo, hi) = if filter.kind() == FilterKind::Range {
                    ("_min", "_max")
                } else {
                    ("_from", "_to")
                };
                for suffix in [lo, hi] {
                    let name = format!("{}{}", key, suffix);
                    if let Some(v) = first(&name) {
                        out.insert(name, v);
                    }
                }
            }
            FilterKind::Multi => {
                let mut values: Vec<&str> = Vec::new();
                for (_, v) in query.iter().filter(|(k, _)| k == key) {
                    if !v.trim().is_empty() && !values.contains(&v.as_str()) {
                        values.push(v);
                    }
                }
                if !values.is_empty() {
                    out.insert(key.clone(), values.join(","));
                }
            }
            FilterKind::Exact => {
                if let Some(v) = first(key) {
                    out.insert(key.clone(), v);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, EntityCatalog, EntityConfigRoot};
    use serde_json::json;

    fn catalog(enable_count: bool) -> EntityCatalog {
        let yaml = format!(
            r#"
entities:
  invoice:
    table: Invoice
    key: InvoiceId
    paging: {{ enableCount: {} }}
    filters:
      Total: {{ type: range }}
      InvoiceDate: {{ type: date-range }}
      BillingCountry: {{ type: checkbox }}
      CustomerId: {{ type: dropdown }}
"#,
            enable_count
        );
        let root: EntityConfigRoot = serde_yaml::from_str(&yaml).unwrap();
        resolve(root.entities).unwrap()
    }

    #[test]
    fn count_flag() {
        let cat = catalog(true);
        let invoice = cat.get("invoice").unwrap();
        assert!(resolve_count_enabled(invoice, None));
        assert!(resolve_count_enabled(invoice, Some(" ")));
        assert!(!resolve_count_enabled(invoice, Some("FALSE")));
        assert!(!resolve_count_enabled(invoice, Some("0")));
        assert!(resolve_count_enabled(invoice, Some("no")));

        let cat = catalog(false);
        assert!(!resolve_count_enabled(cat.get("invoice").unwrap(), None));
    }

    #[test]
    fn extra_row_sets_cursor() {
        let cat = catalog(true);
        let invoice = cat.get("invoice").unwrap();
        let rows = vec![json!({"InvoiceId": 1}), json!({"InvoiceId": 2}), json!({"InvoiceId": 3})];
        let paged = build_paged_items(invoice, rows.clone(), 2, true);
        assert!(paged.has_more);
        assert_eq!(paged.items.len(), 2);
        assert_eq!(paged.next_cursor.as_deref(), Some("2"));

        let paged = build_paged_items(invoice, rows.clone(), 3, true);
        assert!(!paged.has_more);
        assert_eq!(paged.next_cursor, None);

        let paged = build_paged_items(invoice, rows, 2, false);
        assert!(!paged.has_more);
        assert_eq!(paged.items.len(), 3);
    }

    #[test]
    fn filters_from_query_pairs() {
        let cat = catalog(true);
        let invoice = cat.get("invoice").unwrap();
        let pairs: Vec<(String, String)> = [
            ("Total_min", "5"),
            ("Total_min", "9"),
            ("InvoiceDate_to", "2024-01-31"),
            ("BillingCountry", "USA"),
            ("BillingCountry", ""),
            ("BillingCountry", "Canada"),
            ("BillingCountry", "USA"),
            ("CustomerId", "7"),
            ("Unrelated", "x"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let filters = collect_filters(invoice, &pairs);
        assert_eq!(filters.get("Total_min").map(String::as_str), Some("5"));
        assert_eq!(filters.get("InvoiceDate_to").map(String::as_str), Some("2024-01-31"));
        assert_eq!(filters.get("BillingCountry").map(String::as_str), Some("USA,Canada"));
        assert_eq!(filters.get("CustomerId").map(String::as_str), Some("7"));
        assert!(!filters.contains_key("Unrelated"));
        assert_eq!(filters.len(), 4);
    }
}

//! Sample hooks. Reference them from entity YAML, e.g. `hooks: { beforeCreate: customer_email_domain }`.

use super::{EntityHook, HookContext, HookResult};
use crate::error::AppError;
use crate::sql::SqlValue;
use async_trait::async_trait;
use sqlx::AnyConnection;

const BLOCKED_DOMAINS: &[&str] = &["blocked.example.com", "spam.test"];

/// Rejects customers whose email uses a blocked domain.
pub struct CustomerEmailDomainHook;

#[async_trait]
impl EntityHook for CustomerEmailDomainHook {
    fn name(&self) -> &str {
        "customer_email_domain"
    }

    async fn before(&self, ctx: &mut HookContext, _conn: &mut AnyConnection) -> Result<HookResult, AppError> {
        let Some(SqlValue::Text(email)) = ctx.values.get("Email") else {
            return Ok(HookResult::Continue);
        };
        let Some(at) = email.rfind('@') else {
            return Ok(HookResult::Abort("Email address format is invalid.".into()));
        };
        let domain = &email[at + 1..];
        if BLOCKED_DOMAINS.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
            tracing::warn!(domain = %domain, user = ?ctx.user, "blocked email domain");
            return Ok(HookResult::Abort(format!("Email domain '{}' is not allowed.", domain)));
        }
        Ok(HookResult::Continue)
    }

    async fn after(&self, _ctx: &HookContext, _conn: &mut AnyConnection) -> Result<(), AppError> {
        Ok(())
    }
}

const MINIMUM_TOTAL: f64 = 0.01;

/// Invoice totals must be at least 0.01. Values that are not numeric are left to the column converter.
pub struct InvoiceMinimumTotalHook;

#[async_trait]
impl EntityHook for InvoiceMinimumTotalHook {
    fn name(&self) -> &str {
        "invoice_minimum_total"
    }

    async fn before(&self, ctx: &mut HookContext, _conn: &mut AnyConnection) -> Result<HookResult, AppError> {
        let Some(amount) = ctx.values.get("Total").and_then(SqlValue::as_f64) else {
            return Ok(HookResult::Continue);
        };
        if amount < MINIMUM_TOTAL {
            return Ok(HookResult::Abort(format!(
                "Invoice total must be at least ${:.2} (entered: ${:.2}).",
                MINIMUM_TOTAL, amount
            )));
        }
        Ok(HookResult::Continue)
    }

    async fn after(&self, _ctx: &HookContext, _conn: &mut AnyConnection) -> Result<(), AppError> {
        Ok(())
    }
}

/// Logs completed writes for any entity.
pub struct ConsoleLogAfterHook;

#[async_trait]
impl EntityHook for ConsoleLogAfterHook {
    fn name(&self) -> &str {
        "console_log_after"
    }

    async fn before(&self, _ctx: &mut HookContext, _conn: &mut AnyConnection) -> Result<HookResult, AppError> {
        Ok(HookResult::Continue)
    }

    async fn after(&self, ctx: &HookContext, _conn: &mut AnyConnection) -> Result<(), AppError> {
        let mut fields: Vec<&str> = ctx.values.keys().map(String::as_str).collect();
        fields.sort_unstable();
        tracing::info!(
            operation = %ctx.operation,
            entity = %ctx.entity,
            id = %ctx.id.as_ref().map(ToString::to_string).unwrap_or_else(|| "(new)".into()),
            user = ctx.user.as_deref().unwrap_or("unknown"),
            fields = %fields.join(", "),
            "write completed"
        );
        Ok(())
    }
}

/// Upper-cases the first letter of FirstName / LastName.
pub struct CustomerNameNormalizeHook;

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl EntityHook for CustomerNameNormalizeHook {
    fn name(&self) -> &str {
        "customer_name_normalize"
    }

    async fn before(&self, ctx: &mut HookContext, _conn: &mut AnyConnection) -> Result<HookResult, AppError> {
        for field in ["FirstName", "LastName"] {
            if let Some(SqlValue::Text(s)) = ctx.values.get_mut(field) {
                *s = capitalize(s);
            }
        }
        Ok(HookResult::Continue)
    }

    async fn after(&self, _ctx: &HookContext, _conn: &mut AnyConnection) -> Result<(), AppError> {
        Ok(())
    }
}

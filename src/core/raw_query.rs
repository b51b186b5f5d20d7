use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::infra::catalog::ReadOnlyRunner;
use crate::models::chart::RawQueryResponse;

fn dangerous_statement() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(insert|update|delete|drop|alter|truncate|replace|grant|revoke)\s|\bcreate\s+table\b",
        )
        .expect("static regex")
    })
}

/// 校验原始 SQL：仅允许单条 SELECT，拒绝写操作关键字。返回去掉结尾分号后的语句。
pub fn validate(sql: &str) -> AnalyticsResult<String> {
    let trimmed = sql.trim();
    let statement = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

    if statement.is_empty() {
        return Err(AnalyticsError::RawQueryRejected("Empty query".to_string()));
    }
    if !statement.to_lowercase().starts_with("select") {
        return Err(AnalyticsError::RawQueryRejected(
            "Only SELECT queries are allowed".to_string(),
        ));
    }
    if statement.contains(';') {
        return Err(AnalyticsError::RawQueryRejected(
            "Multiple statements are not allowed".to_string(),
        ));
    }
    if let Some(m) = dangerous_statement().find(statement) {
        return Err(AnalyticsError::RawQueryRejected(format!(
            "Dangerous SQL detected: {}",
            m.as_str().trim()
        )));
    }

    Ok(statement.to_string())
}

/// 校验后在只读事务中执行
pub async fn execute(runner: &dyn ReadOnlyRunner, sql: &str) -> AnalyticsResult<RawQueryResponse> {
    let statement = validate(sql).inspect_err(|e| warn!("拒绝原始查询: {}", e))?;
    info!("执行原始只读查询");

    let mut results = runner
        .fetch_read_only(std::slice::from_ref(&statement))
        .await
        .map_err(|e| AnalyticsError::QueryExecution(e.to_string()))?;
    let data = results.pop().unwrap_or_default();
    let columns = match data.first() {
        Some(row) => row.keys().cloned().collect(),
        None => runner
            .column_names(&statement)
            .await
            .map_err(|e| AnalyticsError::QueryExecution(e.to_string()))?,
    };

    Ok(RawQueryResponse {
        row_count: data.len(),
        columns,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_select() {
        assert_eq!(
            validate("  select name, salary from employees;  ").unwrap(),
            "select name, salary from employees"
        );
        assert!(validate(
            "SELECT d.name, COUNT(*) FROM employees e JOIN departments d ON e.department_id = d.id GROUP BY d.name"
        )
        .is_ok());
    }

    #[test]
    fn test_rejects_non_select() {
        for sql in ["DELETE FROM employees", "with x as (select 1) select * from x", ""] {
            assert!(
                matches!(validate(sql), Err(AnalyticsError::RawQueryRejected(_))),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_rejects_stacked_statements() {
        let err = validate("SELECT 1; DROP TABLE employees").unwrap_err();
        assert!(err.to_string().contains("Multiple statements"));
    }

    #[test]
    fn test_rejects_dangerous_keywords() {
        for sql in [
            "SELECT * FROM employees WHERE id IN (DELETE FROM leaves RETURNING id)",
            "select 1 from x where exists (update y set a = 1)",
            "SELECT * INTO t FROM employees CREATE TABLE z",
        ] {
            assert!(
                matches!(validate(sql), Err(AnalyticsError::RawQueryRejected(_))),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_keyword_inside_identifier_is_allowed() {
        assert!(validate("SELECT updated_at, deleted_flag FROM employees").is_ok());
        assert!(validate("SELECT REPLACE(name, 'a', 'b') FROM employees").is_ok());
    }
}

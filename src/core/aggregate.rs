use serde_json::Value;
use tracing::debug;

use crate::core::join_chain::JoinChain;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::infra::catalog::{Dialect, ReadOnlyRunner};
use crate::models::chart::JsonRow;
use crate::models::schema::ColumnRef;

const AGGREGATE_ALIASES: [&str; 4] = ["sum_value", "avg_value", "min_value", "max_value"];

/// 一次分组聚合请求：取值列、分组列，以及从取值表到分组表的连接链
#[derive(Debug, Clone)]
pub struct AggregateQuery {
    pub value: ColumnRef,
    pub group: ColumnRef,
    pub joins: JoinChain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub grouped: Vec<JsonRow>,
    pub summary: JsonRow,
}

impl AggregateQuery {
    fn aggregate_select(&self, dialect: Dialect) -> String {
        let value = dialect.qualified(&self.value.table, &self.value.column);
        format!(
            "SUM({v}) AS sum_value, AVG({v}) AS avg_value, MIN({v}) AS min_value, MAX({v}) AS max_value",
            v = value
        )
    }

    fn from_clause(&self, dialect: Dialect) -> String {
        let mut from = format!("FROM {}", dialect.quote_ident(&self.value.table));
        if !self.joins.is_empty() {
            from.push(' ');
            from.push_str(&self.joins.to_sql(dialect));
        }
        from
    }

    pub fn grouped_sql(&self, dialect: Dialect) -> String {
        let group = dialect.qualified(&self.group.table, &self.group.column);
        format!(
            "SELECT {group} AS x, {aggs} {from} GROUP BY {group} ORDER BY x",
            group = group,
            aggs = self.aggregate_select(dialect),
            from = self.from_clause(dialect),
        )
    }

    /// 汇总与分组使用同一连接链，保证两者覆盖同一批行
    pub fn summary_sql(&self, dialect: Dialect) -> String {
        format!(
            "SELECT {aggs} {from}",
            aggs = self.aggregate_select(dialect),
            from = self.from_clause(dialect),
        )
    }

    /// SQLite 与 MySQL 对文本做 SUM/AVG 会静默得到 0，先查出取值列里的非数值。
    /// SQLite 按值的存储类型检查，MySQL 按列的声明类型检查；Postgres 自身会报错。
    pub fn type_guard_sql(&self, dialect: Dialect) -> Option<String> {
        match dialect {
            Dialect::Sqlite => Some(format!(
                "SELECT typeof({v}) AS value_type FROM {t} WHERE typeof({v}) NOT IN ('integer', 'real', 'null') LIMIT 1",
                v = dialect.qualified(&self.value.table, &self.value.column),
                t = dialect.quote_ident(&self.value.table),
            )),
            Dialect::MySql => Some(format!(
                "SELECT CAST(DATA_TYPE AS CHAR) AS value_type FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {t} AND COLUMN_NAME = {c} \
                 AND DATA_TYPE NOT IN ('tinyint', 'smallint', 'mediumint', 'int', 'bigint', 'decimal', 'float', 'double', 'bit', 'year')",
                t = string_literal(&self.value.table),
                c = string_literal(&self.value.column),
            )),
            Dialect::Postgres => None,
        }
    }

    pub async fn run(&self, runner: &dyn ReadOnlyRunner) -> AnalyticsResult<AggregateResult> {
        let dialect = runner.dialect();
        let grouped_sql = self.grouped_sql(dialect);
        let summary_sql = self.summary_sql(dialect);
        debug!("Grouped SQL: {}", grouped_sql);
        debug!("Summary SQL: {}", summary_sql);

        let mut statements: Vec<String> = self.type_guard_sql(dialect).into_iter().collect();
        statements.push(grouped_sql);
        statements.push(summary_sql);

        let mut results = runner
            .fetch_read_only(&statements)
            .await
            .map_err(|e| AnalyticsError::QueryExecution(e.to_string()))?;

        let summary_rows = results.pop().unwrap_or_default();
        let grouped = results.pop().unwrap_or_default();
        // 剩下的只可能是类型检查的结果
        if let Some(row) = results.pop().and_then(|rows| rows.into_iter().next()) {
            let found = row
                .get("value_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(AnalyticsError::QueryExecution(format!(
                "cannot aggregate non-numeric column {}.{} (found {} values)",
                self.value.table, self.value.column, found
            )));
        }
        let summary = summary_rows.into_iter().next().unwrap_or_else(|| {
            AGGREGATE_ALIASES
                .iter()
                .map(|alias| (alias.to_string(), Value::Null))
                .collect()
        });

        Ok(AggregateResult { grouped, summary })
    }
}

fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

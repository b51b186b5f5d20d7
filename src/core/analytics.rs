use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::core::aggregate::AggregateQuery;
use crate::core::alias_index::AliasIndex;
use crate::core::join_chain::JoinChain;
use crate::core::raw_query;
use crate::core::schema_graph::{SchemaCache, SchemaGraph};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::infra::catalog::{ReadOnlyRunner, SchemaCatalog};
use crate::models::chart::{AnalyticsRequest, AnalyticsResponse, RawQueryResponse};
use crate::models::schema::{ColumnRef, TableDescription};

/// 分析请求的编排入口。探测能力与执行能力显式注入，schema 图按需缓存。
pub struct AnalyticsEngine {
    catalog: Arc<dyn SchemaCatalog>,
    runner: Arc<dyn ReadOnlyRunner>,
    aliases: AliasIndex,
    schema: SchemaCache,
}

impl AnalyticsEngine {
    pub fn new(
        catalog: Arc<dyn SchemaCatalog>,
        runner: Arc<dyn ReadOnlyRunner>,
        aliases: AliasIndex,
    ) -> Self {
        Self {
            catalog,
            runner,
            aliases,
            schema: SchemaCache::new(),
        }
    }

    pub async fn schema_graph(&self) -> AnalyticsResult<Arc<SchemaGraph>> {
        self.schema.get_or_build(self.catalog.as_ref()).await
    }

    pub async fn refresh_schema(&self) -> AnalyticsResult<Arc<SchemaGraph>> {
        self.schema.refresh(self.catalog.as_ref()).await
    }

    pub async fn describe_schema(&self) -> AnalyticsResult<BTreeMap<String, TableDescription>> {
        Ok(self.schema_graph().await?.describe())
    }

    pub async fn raw_query(&self, sql: &str) -> AnalyticsResult<RawQueryResponse> {
        raw_query::execute(self.runner.as_ref(), sql).await
    }

    #[instrument(skip(self, request), fields(x = %request.chart.x, y = %request.chart.y))]
    pub async fn handle(&self, request: AnalyticsRequest) -> AnalyticsResult<AnalyticsResponse> {
        request.validate().inspect_err(|e| warn!("请求校验失败: {}", e))?;
        let chart = &request.chart;
        info!(
            "开始分析请求: table={}, y={}.{}, x={}.{}",
            request.table_name, chart.y_table_name, chart.y, chart.x_table_name, chart.x
        );

        let value = self.aliases.resolve(&chart.y_table_name, &chart.y);
        let group = self.aliases.resolve(&chart.x_table_name, &chart.x);

        let graph = self.schema_graph().await?;
        ensure_known(&graph, &value)?;
        ensure_known(&graph, &group)?;

        let path = graph
            .find_path(&value.table, &group.table)
            .ok_or_else(|| AnalyticsError::NoJoinPath {
                from: value.table.clone(),
                to: group.table.clone(),
            })
            .inspect_err(|e| warn!("{}", e))?;
        let joins = JoinChain::build(&path, &graph)?;

        let query = AggregateQuery {
            value,
            group,
            joins,
        };
        let result = query.run(self.runner.as_ref()).await?;
        info!(
            "分析完成: 路径 {}, 分组 {} 行",
            path.join(" -> "),
            result.grouped.len()
        );

        Ok(AnalyticsResponse {
            chart: request.chart,
            join_path: path,
            grouped: result.grouped,
            summary: result.summary,
        })
    }
}

/// 写入 SQL 的标识符必须来自已探测的 schema
fn ensure_known(graph: &SchemaGraph, column: &ColumnRef) -> AnalyticsResult<()> {
    if !graph.contains_table(&column.table) {
        return Err(AnalyticsError::UnknownTable(column.table.clone()));
    }
    if !graph.has_column(&column.table, &column.column) {
        return Err(AnalyticsError::UnknownColumn {
            table: column.table.clone(),
            column: column.column.clone(),
        });
    }
    Ok(())
}

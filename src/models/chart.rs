use serde::{Deserialize, Serialize};
use validator::Validate;

/// 一行查询结果：列别名 -> 值，保持 SELECT 中的列顺序
pub type JsonRow = serde_json::Map<String, serde_json::Value>;

/// 图表描述，原样回显给调用方
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub chart_type: String,

    /// 逻辑分组列
    #[validate(length(min = 1, message = "chart.x must not be empty"))]
    pub x: String,

    /// 逻辑取值列
    #[validate(length(min = 1, message = "chart.y must not be empty"))]
    pub y: String,

    #[validate(length(min = 1, message = "chart.x_table_name must not be empty"))]
    pub x_table_name: String,

    #[validate(length(min = 1, message = "chart.y_table_name must not be empty"))]
    pub y_table_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct AnalyticsRequest {
    /// 上下文表名，仅作记录
    pub table_name: String,

    #[validate(nested)]
    pub chart: ChartSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsResponse {
    pub chart: ChartSpec,
    pub join_path: Vec<String>,
    pub grouped: Vec<JsonRow>,
    pub summary: JsonRow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawQueryRequest {
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawQueryResponse {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub data: Vec<JsonRow>,
}

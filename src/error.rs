use thiserror::Error;

/// 分析引擎错误分类。除 `SchemaIntrospection` 与 `AmbiguousJoinInternal`
/// 外均属于调用方输入问题。
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Schema introspection failed: {0}")]
    SchemaIntrospection(#[source] sqlx::Error),

    #[error("No relationship path found between tables '{from}' and '{to}'")]
    NoJoinPath { from: String, to: String },

    #[error("Join path edge '{from}' -> '{to}' has no backing foreign key")]
    AmbiguousJoinInternal { from: String, to: String },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    #[error("Raw query rejected: {0}")]
    RawQueryRejected(String),
}

impl AnalyticsError {
    /// 是否为调用方错误 (4xx)
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            AnalyticsError::SchemaIntrospection(_) | AnalyticsError::AmbiguousJoinInternal { .. }
        )
    }
}

impl From<validator::ValidationErrors> for AnalyticsError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AnalyticsError::InvalidRequest(errors.to_string())
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

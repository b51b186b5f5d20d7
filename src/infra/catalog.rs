use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::models::chart::JsonRow;
use crate::models::schema::ForeignKey;

/// SQL 方言，只影响标识符引用与只读事务语句
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// `table.column` 形式的限定列名
    pub fn qualified(&self, table: &str, column: &str) -> String {
        format!("{}.{}", self.quote_ident(table), self.quote_ident(column))
    }
}

/// 运行时 schema 探测能力
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// 按表名排序
    async fn table_names(&self) -> Result<Vec<String>, sqlx::Error>;

    /// 按目录顺序返回 `table` 上声明的外键
    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, sqlx::Error>;

    async fn columns(&self, table: &str) -> Result<Vec<String>, sqlx::Error>;

    async fn primary_key(&self, table: &str) -> Result<Vec<String>, sqlx::Error>;
}

/// 只读 SQL 执行能力。一次调用占用一个连接，
/// 所有语句在同一个只读事务中执行，结束后回滚。
#[async_trait]
pub trait ReadOnlyRunner: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn fetch_read_only(&self, statements: &[String]) -> Result<Vec<Vec<JsonRow>>, sqlx::Error>;

    /// 只准备不执行，取结果列名 (无数据行时使用)
    async fn column_names(&self, sql: &str) -> Result<Vec<String>, sqlx::Error>;
}

#[derive(Debug, Clone, Default)]
struct StaticTable {
    columns: Vec<String>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
}

/// 内存中的固定 schema，用于测试或离线构图
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    tables: BTreeMap<String, StaticTable>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, columns: &[&str]) -> Self {
        let entry = self.tables.entry(name.to_string()).or_default();
        entry.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn primary_key(mut self, table: &str, columns: &[&str]) -> Self {
        let entry = self.tables.entry(table.to_string()).or_default();
        entry.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// 外键按添加顺序保存
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.tables
            .entry(fk.table.clone())
            .or_default()
            .foreign_keys
            .push(fk);
        self
    }
}

#[async_trait]
impl SchemaCatalog for StaticCatalog {
    async fn table_names(&self) -> Result<Vec<String>, sqlx::Error> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, sqlx::Error> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.foreign_keys.clone())
            .unwrap_or_default())
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>, sqlx::Error> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>, sqlx::Error> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.primary_key.clone())
            .unwrap_or_default())
    }
}

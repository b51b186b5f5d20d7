use serde::{Deserialize, Serialize};

/// 一条外键约束。`constrained_columns` 与 `referred_columns` 按键序一一对应。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub constrained_columns: Vec<String>,
    pub referred_table: String,
    pub referred_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        referred_table: impl Into<String>,
        referred_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            constrained_columns: vec![column.into()],
            referred_table: referred_table.into(),
            referred_columns: vec![referred_column.into()],
        }
    }

    /// 连接谓词只取第一对列
    pub fn first_pair(&self) -> Option<(&str, &str)> {
        let local = self.constrained_columns.first()?;
        let remote = self.referred_columns.first()?;
        Some((local.as_str(), remote.as_str()))
    }
}

/// 物理 (表, 列) 引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// 逻辑列到物理列的别名。`table` 为空表示对任意逻辑表生效。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAlias {
    #[serde(default)]
    pub table: Option<String>,
    pub column: String,
    pub physical_table: String,
    pub physical_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyDescription {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// `/analytics/schema` 中单表的描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescription {
    pub columns: Vec<String>,
    pub pk: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDescription>,
}

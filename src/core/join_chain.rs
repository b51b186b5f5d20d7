use crate::core::schema_graph::SchemaGraph;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::infra::catalog::Dialect;
use crate::models::schema::ColumnRef;

/// 单个连接谓词：`local` 所在表持有外键，`remote` 为被引用列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPredicate {
    pub local: ColumnRef,
    pub remote: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    /// 本步新加入的表
    pub table: String,
    pub predicate: JoinPredicate,
}

/// 按路径顺序排列的 JOIN 序列，接在 `FROM <path[0]>` 之后
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinChain {
    pub steps: Vec<JoinStep>,
}

impl JoinChain {
    /// 为路径上每对相邻表选择一个外键谓词。
    /// 先找 A 指向 B 的外键，再找 B 指向 A 的，均取目录顺序中的第一个。
    pub fn build(path: &[String], graph: &SchemaGraph) -> AnalyticsResult<Self> {
        let mut steps = Vec::with_capacity(path.len().saturating_sub(1));

        for pair in path.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);

            let forward = graph
                .foreign_keys(a)
                .iter()
                .find(|fk| fk.referred_table == *b)
                .and_then(|fk| fk.first_pair())
                .map(|(local, remote)| JoinPredicate {
                    local: ColumnRef::new(a.as_str(), local),
                    remote: ColumnRef::new(b.as_str(), remote),
                });

            let predicate = match forward {
                Some(p) => Some(p),
                None => graph
                    .foreign_keys(b)
                    .iter()
                    .find(|fk| fk.referred_table == *a)
                    .and_then(|fk| fk.first_pair())
                    .map(|(local, remote)| JoinPredicate {
                        local: ColumnRef::new(b.as_str(), local),
                        remote: ColumnRef::new(a.as_str(), remote),
                    }),
            };

            let predicate = predicate.ok_or_else(|| AnalyticsError::AmbiguousJoinInternal {
                from: a.clone(),
                to: b.clone(),
            })?;

            steps.push(JoinStep {
                table: b.clone(),
                predicate,
            });
        }

        Ok(Self { steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.steps
            .iter()
            .map(|step| {
                format!(
                    "JOIN {} ON {} = {}",
                    dialect.quote_ident(&step.table),
                    dialect.qualified(&step.predicate.local.table, &step.predicate.local.column),
                    dialect.qualified(&step.predicate.remote.table, &step.predicate.remote.column),
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

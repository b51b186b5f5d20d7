use std::collections::BTreeMap;

use fst::{Map, MapBuilder};

use crate::models::schema::{ColumnAlias, ColumnRef};

const WILDCARD: &str = "*";
const SEPARATOR: char = '\u{1f}';

/// 内置别名：前端使用的业务名词 -> 实际存储位置
pub fn builtin_aliases() -> Vec<ColumnAlias> {
    [
        ("department", "departments", "name"),
        ("position", "positions", "title"),
        ("incentive", "incentives", "amount"),
    ]
    .into_iter()
    .map(|(column, physical_table, physical_column)| ColumnAlias {
        table: None,
        column: column.to_string(),
        physical_table: physical_table.to_string(),
        physical_column: physical_column.to_string(),
    })
    .collect()
}

/// 逻辑列解析索引。FST 键为 `表␟列` (小写)，表为 `*` 时对任意表生效。
pub struct AliasIndex {
    index: Map<Vec<u8>>,
    targets: Vec<ColumnRef>,
}

fn key(table: &str, column: &str) -> String {
    format!("{}{}{}", table.to_lowercase(), SEPARATOR, column.to_lowercase())
}

impl AliasIndex {
    /// 后出现的别名覆盖先出现的同键别名
    pub fn build(aliases: &[ColumnAlias]) -> anyhow::Result<Self> {
        // FST 键必须有序
        let mut data: BTreeMap<String, u64> = BTreeMap::new();
        let mut targets = Vec::with_capacity(aliases.len());

        for alias in aliases {
            let id = targets.len() as u64;
            let table = alias.table.as_deref().unwrap_or(WILDCARD);
            data.insert(key(table, &alias.column), id);
            targets.push(ColumnRef::new(
                alias.physical_table.as_str(),
                alias.physical_column.as_str(),
            ));
        }

        let mut builder = MapBuilder::memory();
        for (k, id) in data {
            builder.insert(k, id)?;
        }
        let bytes = builder.into_inner()?;
        Ok(Self {
            index: Map::new(bytes)?,
            targets,
        })
    }

    pub fn with_builtins(extra: &[ColumnAlias]) -> anyhow::Result<Self> {
        let mut aliases = builtin_aliases();
        aliases.extend_from_slice(extra);
        Self::build(&aliases)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 逻辑 (表, 列) -> 物理 (表, 列)。表专属别名优先于通配别名，未登记的原样返回。
    pub fn resolve(&self, table: &str, column: &str) -> ColumnRef {
        let hit = self
            .index
            .get(key(table, column))
            .or_else(|| self.index.get(key(WILDCARD, column)));

        match hit.and_then(|id| self.targets.get(id as usize)) {
            Some(target) => target.clone(),
            None => ColumnRef::new(table, column),
        }
    }
}

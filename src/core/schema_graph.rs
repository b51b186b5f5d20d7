//! 外键关系图：运行时探测 schema，构建无向表图，并以 BFS 求最短连接路径。

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use petgraph::graph::{NodeIndex, UnGraph};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::infra::catalog::SchemaCatalog;
use crate::models::schema::{ForeignKey, ForeignKeyDescription, TableDescription};

#[derive(Debug, Clone, Default)]
struct TableMeta {
    columns: Vec<String>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
}

/// 一次探测得到的 schema 快照。构建后只读，可跨请求共享。
#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    graph: UnGraph<String, ()>,
    index: BTreeMap<String, NodeIndex>,
    tables: BTreeMap<String, TableMeta>,
}

impl SchemaGraph {
    /// 从目录构建。每个表都会成为节点，包括没有外键的表，
    /// 以及只被其他表引用、未出现在表清单中的表。
    pub async fn build(catalog: &dyn SchemaCatalog) -> AnalyticsResult<Self> {
        let names = catalog
            .table_names()
            .await
            .map_err(AnalyticsError::SchemaIntrospection)?;

        let mut schema = SchemaGraph::default();
        for name in &names {
            let columns = catalog
                .columns(name)
                .await
                .map_err(AnalyticsError::SchemaIntrospection)?;
            let primary_key = catalog
                .primary_key(name)
                .await
                .map_err(AnalyticsError::SchemaIntrospection)?;
            let foreign_keys = catalog
                .foreign_keys(name)
                .await
                .map_err(AnalyticsError::SchemaIntrospection)?;

            schema.add_table(name);
            schema.tables.insert(
                name.clone(),
                TableMeta {
                    columns,
                    primary_key,
                    foreign_keys,
                },
            );
        }

        let fks: Vec<ForeignKey> = schema
            .tables
            .values()
            .flat_map(|t| t.foreign_keys.iter().cloned())
            .collect();
        for fk in &fks {
            let a = schema.add_table(&fk.table);
            let b = schema.add_table(&fk.referred_table);
            // 自引用不参与路径搜索
            if a != b {
                schema.graph.update_edge(a, b, ());
            }
        }

        info!(
            "schema 关系图构建完成: 表 {} 个, 关系边 {} 条",
            schema.index.len(),
            schema.graph.edge_count()
        );
        Ok(schema)
    }

    fn add_table(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.index.contains_key(table)
    }

    pub fn table_count(&self) -> usize {
        self.index.len()
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|t| t.columns.iter().any(|c| c == column))
    }

    /// `table` 上声明的外键，按目录顺序
    pub fn foreign_keys(&self, table: &str) -> &[ForeignKey] {
        self.tables
            .get(table)
            .map(|t| t.foreign_keys.as_slice())
            .unwrap_or_default()
    }

    /// 表名 -> 相邻表名集合
    pub fn adjacency(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.index
            .iter()
            .map(|(name, idx)| {
                let neighbors = self
                    .graph
                    .neighbors(*idx)
                    .map(|n| self.graph[n].clone())
                    .collect();
                (name.clone(), neighbors)
            })
            .collect()
    }

    /// 相邻表按字母序，保证 BFS 结果稳定
    fn sorted_neighbors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors(idx).collect();
        neighbors.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        neighbors.dedup();
        neighbors
    }

    /// BFS 最短路径。`start == end` 时直接返回 `[start]`；不可达时返回 `None`。
    pub fn find_path(&self, start: &str, end: &str) -> Option<Vec<String>> {
        if start == end {
            return Some(vec![start.to_string()]);
        }
        let from = *self.index.get(start)?;
        let to = *self.index.get(end)?;

        let mut queue = VecDeque::from([from]);
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        parent.insert(from, from);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![self.graph[current].clone()];
                let mut node = current;
                while node != from {
                    node = parent[&node];
                    path.push(self.graph[node].clone());
                }
                path.reverse();
                debug!("找到连接路径: {}", path.join(" -> "));
                return Some(path);
            }

            for neighbor in self.sorted_neighbors(current) {
                if let std::collections::hash_map::Entry::Vacant(e) = parent.entry(neighbor) {
                    e.insert(current);
                    queue.push_back(neighbor);
                }
            }
        }

        None
    }

    /// 按表名排序的 schema 描述，只包含有列的表
    pub fn describe(&self) -> BTreeMap<String, TableDescription> {
        self.tables
            .iter()
            .filter(|(_, meta)| !meta.columns.is_empty())
            .map(|(name, meta)| {
                let mut columns = meta.columns.clone();
                columns.sort();
                let foreign_keys = meta
                    .foreign_keys
                    .iter()
                    .flat_map(|fk| {
                        fk.constrained_columns
                            .iter()
                            .zip(&fk.referred_columns)
                            .map(|(local, remote)| ForeignKeyDescription {
                                column: local.clone(),
                                ref_table: fk.referred_table.clone(),
                                ref_column: remote.clone(),
                            })
                    })
                    .collect();
                (
                    name.clone(),
                    TableDescription {
                        columns,
                        pk: meta.primary_key.clone(),
                        foreign_keys,
                    },
                )
            })
            .collect()
    }
}

/// 进程内 schema 缓存。只在首次使用或显式 `refresh` 时构建。
#[derive(Default)]
pub struct SchemaCache {
    inner: RwLock<Option<Arc<SchemaGraph>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_build(&self, catalog: &dyn SchemaCatalog) -> AnalyticsResult<Arc<SchemaGraph>> {
        if let Some(graph) = self.inner.read().await.as_ref() {
            return Ok(graph.clone());
        }

        let mut guard = self.inner.write().await;
        // 等待写锁期间可能已被其他请求构建
        if let Some(graph) = guard.as_ref() {
            return Ok(graph.clone());
        }
        let graph = Arc::new(SchemaGraph::build(catalog).await?);
        *guard = Some(graph.clone());
        Ok(graph)
    }

    /// 重新探测并整体替换；失败时保留旧图
    pub async fn refresh(&self, catalog: &dyn SchemaCatalog) -> AnalyticsResult<Arc<SchemaGraph>> {
        let graph = Arc::new(SchemaGraph::build(catalog).await?);
        *self.inner.write().await = Some(graph.clone());
        info!("schema 缓存已刷新");
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::catalog::StaticCatalog;
    use async_trait::async_trait;

    fn hr_catalog() -> StaticCatalog {
        StaticCatalog::new()
            .table("departments", &["id", "name"])
            .table("positions", &["id", "title"])
            .table(
                "employee_performance",
                &["id", "name", "department_id", "position_id", "salary"],
            )
            .table("incentives", &["id", "employee_id", "amount"])
            .table("audit_log", &["id", "message"])
            .foreign_key(ForeignKey::new("employee_performance", "department_id", "departments", "id"))
            .foreign_key(ForeignKey::new("employee_performance", "position_id", "positions", "id"))
            .foreign_key(ForeignKey::new("incentives", "employee_id", "employee_performance", "id"))
    }

    async fn hr_graph() -> SchemaGraph {
        SchemaGraph::build(&hr_catalog()).await.unwrap()
    }

    #[tokio::test]
    async fn test_adjacency_is_undirected_and_complete() {
        let graph = hr_graph().await;
        let adj = graph.adjacency();

        assert_eq!(adj.len(), 5);
        assert!(adj["audit_log"].is_empty());
        assert!(adj["departments"].contains("employee_performance"));
        assert!(adj["employee_performance"].contains("departments"));
        assert_eq!(adj["employee_performance"].len(), 3);
        assert_eq!(
            adj["incentives"].iter().collect::<Vec<_>>(),
            vec!["employee_performance"]
        );
    }

    #[tokio::test]
    async fn test_referred_only_table_is_added() {
        let catalog = StaticCatalog::new()
            .table("leaves", &["id", "employee_id"])
            .foreign_key(ForeignKey::new("leaves", "employee_id", "employees", "id"));
        let graph = SchemaGraph::build(&catalog).await.unwrap();

        assert!(graph.contains_table("employees"));
        assert!(graph.adjacency()["employees"].contains("leaves"));
        assert_eq!(
            graph.find_path("leaves", "employees"),
            Some(vec!["leaves".to_string(), "employees".to_string()])
        );
    }

    #[tokio::test]
    async fn test_self_reference_adds_no_edge() {
        let catalog = StaticCatalog::new()
            .table("employees", &["id", "manager_id"])
            .foreign_key(ForeignKey::new("employees", "manager_id", "employees", "id"));
        let graph = SchemaGraph::build(&catalog).await.unwrap();
        assert!(graph.adjacency()["employees"].is_empty());
    }

    #[tokio::test]
    async fn test_identity_path() {
        let graph = hr_graph().await;
        for table in graph.adjacency().keys() {
            assert_eq!(graph.find_path(table, table), Some(vec![table.clone()]));
        }
    }

    #[tokio::test]
    async fn test_unreachable_returns_none() {
        let graph = hr_graph().await;
        assert_eq!(graph.find_path("audit_log", "departments"), None);
        assert_eq!(graph.find_path("departments", "audit_log"), None);
        assert_eq!(graph.find_path("departments", "no_such_table"), None);
    }

    #[tokio::test]
    async fn test_two_hop_path_through_bridge() {
        let graph = hr_graph().await;
        assert_eq!(
            graph.find_path("incentives", "departments").unwrap(),
            vec!["incentives", "employee_performance", "departments"]
        );
    }

    /// 与穷举 BFS 距离对比
    #[tokio::test]
    async fn test_path_length_is_shortest_distance() {
        let catalog = StaticCatalog::new()
            .table("a", &["id"])
            .table("b", &["id"])
            .table("c", &["id"])
            .table("d", &["id"])
            .table("e", &["id"])
            .table("f", &["id"])
            .foreign_key(ForeignKey::new("a", "b_id", "b", "id"))
            .foreign_key(ForeignKey::new("b", "c_id", "c", "id"))
            .foreign_key(ForeignKey::new("c", "d_id", "d", "id"))
            .foreign_key(ForeignKey::new("d", "e_id", "e", "id"))
            .foreign_key(ForeignKey::new("a", "e_id", "e", "id"))
            .foreign_key(ForeignKey::new("f", "c_id", "c", "id"));
        let graph = SchemaGraph::build(&catalog).await.unwrap();
        let adj = graph.adjacency();

        let distance = |from: &str, to: &str| -> Option<usize> {
            let mut dist: HashMap<&str, usize> = HashMap::from([(from, 0)]);
            let mut queue = VecDeque::from([from]);
            while let Some(cur) = queue.pop_front() {
                for next in &adj[cur] {
                    if !dist.contains_key(next.as_str()) {
                        dist.insert(next.as_str(), dist[cur] + 1);
                        queue.push_back(next.as_str());
                    }
                }
            }
            dist.get(to).copied()
        };

        for from in adj.keys() {
            for to in adj.keys() {
                let path = graph.find_path(from, to).unwrap();
                assert_eq!(Some(path.len() - 1), distance(from, to), "{} -> {}", from, to);
                for pair in path.windows(2) {
                    assert!(adj[&pair[0]].contains(&pair[1]));
                }
            }
        }
    }

    /// 多条等长路径时取字母序较小的邻居
    #[tokio::test]
    async fn test_tie_break_is_alphabetical_and_stable() {
        let catalog = StaticCatalog::new()
            .table("start", &["id"])
            .table("zeta", &["id"])
            .table("alpha", &["id"])
            .table("goal", &["id"])
            .foreign_key(ForeignKey::new("start", "zeta_id", "zeta", "id"))
            .foreign_key(ForeignKey::new("start", "alpha_id", "alpha", "id"))
            .foreign_key(ForeignKey::new("zeta", "goal_id", "goal", "id"))
            .foreign_key(ForeignKey::new("alpha", "goal_id", "goal", "id"));
        let graph = SchemaGraph::build(&catalog).await.unwrap();

        let expected = vec!["start", "alpha", "goal"];
        for _ in 0..10 {
            assert_eq!(graph.find_path("start", "goal").unwrap(), expected);
        }
        let rebuilt = SchemaGraph::build(&catalog).await.unwrap();
        assert_eq!(rebuilt.find_path("start", "goal").unwrap(), expected);
    }

    #[tokio::test]
    async fn test_describe_lists_tables_with_columns_only() {
        let catalog = hr_catalog()
            .primary_key("departments", &["id"])
            .foreign_key(ForeignKey::new("ghost", "x", "departments", "id"));
        let graph = SchemaGraph::build(&catalog).await.unwrap();
        let described = graph.describe();

        assert!(graph.contains_table("ghost"));
        assert!(!described.contains_key("ghost"));
        assert_eq!(described["departments"].pk, vec!["id"]);
        assert_eq!(described["departments"].columns, vec!["id", "name"]);
        let fks = &described["employee_performance"].foreign_keys;
        assert_eq!(fks.len(), 2);
        assert_eq!(fks[0].column, "department_id");
        assert_eq!(fks[0].ref_table, "departments");
        assert_eq!(fks[0].ref_column, "id");
    }

    struct BrokenCatalog;

    #[async_trait]
    impl SchemaCatalog for BrokenCatalog {
        async fn table_names(&self) -> Result<Vec<String>, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }
        async fn foreign_keys(&self, _table: &str) -> Result<Vec<ForeignKey>, sqlx::Error> {
            Ok(vec![])
        }
        async fn columns(&self, _table: &str) -> Result<Vec<String>, sqlx::Error> {
            Ok(vec![])
        }
        async fn primary_key(&self, _table: &str) -> Result<Vec<String>, sqlx::Error> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_unreadable_catalog_is_introspection_error() {
        let err = SchemaGraph::build(&BrokenCatalog).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::SchemaIntrospection(_)));
    }

    #[tokio::test]
    async fn test_cache_builds_once_until_refresh() {
        let cache = SchemaCache::new();
        let first = cache.get_or_build(&hr_catalog()).await.unwrap();

        // 缓存命中时不会再访问目录
        let second = cache.get_or_build(&BrokenCatalog).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(cache.refresh(&BrokenCatalog).await.is_err());
        let still = cache.get_or_build(&BrokenCatalog).await.unwrap();
        assert!(Arc::ptr_eq(&first, &still));

        let extended = hr_catalog().table("leaves", &["id"]);
        let refreshed = cache.refresh(&extended).await.unwrap();
        assert!(refreshed.contains_table("leaves"));
        assert!(!Arc::ptr_eq(&first, &refreshed));
    }
}

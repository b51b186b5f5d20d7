use async_trait::async_trait;
use sqlx::{
    mysql::MySqlPoolOptions, postgres::PgPoolOptions, sqlite::SqlitePoolOptions, Column, Executor,
    MySql, Pool, Postgres, Sqlite,
};
use tracing::{info, warn};

use crate::infra::catalog::{Dialect, ReadOnlyRunner, SchemaCatalog};
use crate::infra::utils::{mysql_row_to_json, pg_row_to_json, sqlite_row_to_json};
use crate::models::chart::JsonRow;
use crate::models::schema::ForeignKey;

pub enum DynamicPool {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
    Sqlite(Pool<Sqlite>),
}

/// 分析库连接。同时提供 schema 探测与只读查询。
pub struct Database {
    pool: DynamicPool,
    /// 仅 Postgres 使用
    schema: String,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32, schema: &str) -> anyhow::Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default().to_lowercase();
        let pool = match scheme.as_str() {
            "postgres" | "postgresql" => {
                let pool = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await?;
                DynamicPool::Postgres(pool)
            }
            "mysql" | "mariadb" => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await?;
                DynamicPool::MySql(pool)
            }
            "sqlite" => {
                // 内存库每个连接都是独立的数据库
                let max = if url.contains(":memory:") { 1 } else { max_connections };
                let pool = SqlitePoolOptions::new()
                    .max_connections(max)
                    .connect(url)
                    .await?;
                DynamicPool::Sqlite(pool)
            }
            _ => return Err(anyhow::anyhow!("Unsupported DB type: {}", scheme)),
        };
        info!("分析库连接池已建立: type={}, max_connections={}", scheme, max_connections);
        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    pub fn from_pool(pool: DynamicPool, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }
}

#[async_trait]
impl SchemaCatalog for Database {
    async fn table_names(&self) -> Result<Vec<String>, sqlx::Error> {
        match &self.pool {
            DynamicPool::Postgres(p) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT table_name::text FROM information_schema.tables
                     WHERE table_schema = $1 AND table_type = 'BASE TABLE'
                     ORDER BY table_name",
                )
                .bind(&self.schema)
                .fetch_all(p)
                .await
            }
            DynamicPool::MySql(p) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES
                     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
                     ORDER BY TABLE_NAME",
                )
                .fetch_all(p)
                .await
            }
            DynamicPool::Sqlite(p) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                     ORDER BY name",
                )
                .fetch_all(p)
                .await
            }
        }
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, sqlx::Error> {
        let rows: Vec<(String, String, String, String)> = match &self.pool {
            DynamicPool::Postgres(p) => {
                sqlx::query_as(
                    "SELECT con.conname::text, tgt.relname::text, la.attname::text, ra.attname::text
                     FROM pg_constraint con
                     JOIN pg_class src ON src.oid = con.conrelid
                     JOIN pg_namespace ns ON ns.oid = src.relnamespace
                     JOIN pg_class tgt ON tgt.oid = con.confrelid
                     CROSS JOIN LATERAL unnest(con.conkey, con.confkey)
                         WITH ORDINALITY AS k(local_num, remote_num, ord)
                     JOIN pg_attribute la ON la.attrelid = con.conrelid AND la.attnum = k.local_num
                     JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.remote_num
                     WHERE con.contype = 'f' AND ns.nspname = $1 AND src.relname = $2
                     ORDER BY con.conname, k.ord",
                )
                .bind(&self.schema)
                .bind(table)
                .fetch_all(p)
                .await?
            }
            DynamicPool::MySql(p) => {
                sqlx::query_as(
                    "SELECT CAST(CONSTRAINT_NAME AS CHAR), CAST(REFERENCED_TABLE_NAME AS CHAR),
                            CAST(COLUMN_NAME AS CHAR), CAST(REFERENCED_COLUMN_NAME AS CHAR)
                     FROM information_schema.KEY_COLUMN_USAGE
                     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
                       AND REFERENCED_TABLE_NAME IS NOT NULL
                     ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION",
                )
                .bind(table)
                .fetch_all(p)
                .await?
            }
            DynamicPool::Sqlite(p) => {
                let raw: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
                    "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1)
                     ORDER BY id, seq",
                )
                .bind(table)
                .fetch_all(p)
                .await?;

                let mut rows = Vec::with_capacity(raw.len());
                for (id, referred, local, remote) in raw {
                    // 省略引用列时指向被引用表的主键
                    let remote = match remote {
                        Some(col) => col,
                        None => self
                            .primary_key(&referred)
                            .await?
                            .into_iter()
                            .next()
                            .unwrap_or_else(|| "rowid".to_string()),
                    };
                    rows.push((id.to_string(), referred, local, remote));
                }
                rows
            }
        };
        Ok(group_foreign_keys(table, rows))
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>, sqlx::Error> {
        match &self.pool {
            DynamicPool::Postgres(p) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT column_name::text FROM information_schema.columns
                     WHERE table_schema = $1 AND table_name = $2
                     ORDER BY ordinal_position",
                )
                .bind(&self.schema)
                .bind(table)
                .fetch_all(p)
                .await
            }
            DynamicPool::MySql(p) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT CAST(COLUMN_NAME AS CHAR) FROM information_schema.COLUMNS
                     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
                     ORDER BY ORDINAL_POSITION",
                )
                .bind(table)
                .fetch_all(p)
                .await
            }
            DynamicPool::Sqlite(p) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT name FROM pragma_table_info(?1) ORDER BY cid",
                )
                .bind(table)
                .fetch_all(p)
                .await
            }
        }
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>, sqlx::Error> {
        match &self.pool {
            DynamicPool::Postgres(p) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT a.attname::text
                     FROM pg_constraint con
                     JOIN pg_class c ON c.oid = con.conrelid
                     JOIN pg_namespace ns ON ns.oid = c.relnamespace
                     CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
                     JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
                     WHERE con.contype = 'p' AND ns.nspname = $1 AND c.relname = $2
                     ORDER BY k.ord",
                )
                .bind(&self.schema)
                .bind(table)
                .fetch_all(p)
                .await
            }
            DynamicPool::MySql(p) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT CAST(COLUMN_NAME AS CHAR) FROM information_schema.KEY_COLUMN_USAGE
                     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
                       AND CONSTRAINT_NAME = 'PRIMARY'
                     ORDER BY ORDINAL_POSITION",
                )
                .bind(table)
                .fetch_all(p)
                .await
            }
            DynamicPool::Sqlite(p) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk",
                )
                .bind(table)
                .fetch_all(p)
                .await
            }
        }
    }
}

#[async_trait]
impl ReadOnlyRunner for Database {
    fn dialect(&self) -> Dialect {
        match &self.pool {
            DynamicPool::Postgres(_) => Dialect::Postgres,
            DynamicPool::MySql(_) => Dialect::MySql,
            DynamicPool::Sqlite(_) => Dialect::Sqlite,
        }
    }

    async fn fetch_read_only(&self, statements: &[String]) -> Result<Vec<Vec<JsonRow>>, sqlx::Error> {
        let mut results = Vec::with_capacity(statements.len());

        match &self.pool {
            DynamicPool::Postgres(p) => {
                let mut conn = p.acquire().await?;
                (&mut *conn).execute("BEGIN READ ONLY").await?;
                let outcome: Result<(), sqlx::Error> = async {
                    for sql in statements {
                        let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
                        results.push(rows.iter().map(pg_row_to_json).collect());
                    }
                    Ok(())
                }
                .await;
                if let Err(e) = (&mut *conn).execute("ROLLBACK").await {
                    warn!("只读事务回滚失败，丢弃连接: {}", e);
                    drop(conn.detach());
                }
                outcome?;
            }
            DynamicPool::MySql(p) => {
                let mut conn = p.acquire().await?;
                (&mut *conn).execute("START TRANSACTION READ ONLY").await?;
                let outcome: Result<(), sqlx::Error> = async {
                    for sql in statements {
                        let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
                        results.push(rows.iter().map(mysql_row_to_json).collect());
                    }
                    Ok(())
                }
                .await;
                if let Err(e) = (&mut *conn).execute("ROLLBACK").await {
                    warn!("只读事务回滚失败，丢弃连接: {}", e);
                    drop(conn.detach());
                }
                outcome?;
            }
            DynamicPool::Sqlite(p) => {
                let mut conn = p.acquire().await?;
                (&mut *conn).execute("PRAGMA query_only = ON").await?;
                let outcome: Result<(), sqlx::Error> = async {
                    (&mut *conn).execute("BEGIN").await?;
                    for sql in statements {
                        let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
                        results.push(rows.iter().map(sqlite_row_to_json).collect());
                    }
                    Ok(())
                }
                .await;
                let reset = async {
                    (&mut *conn).execute("ROLLBACK").await?;
                    (&mut *conn).execute("PRAGMA query_only = OFF").await
                }
                .await;
                if let Err(e) = reset {
                    warn!("只读事务回滚失败，丢弃连接: {}", e);
                    drop(conn.detach());
                }
                outcome?;
            }
        }

        Ok(results)
    }

    async fn column_names(&self, sql: &str) -> Result<Vec<String>, sqlx::Error> {
        match &self.pool {
            DynamicPool::Postgres(p) => Ok(described_names(p.describe(sql).await?.columns())),
            DynamicPool::MySql(p) => Ok(described_names(p.describe(sql).await?.columns())),
            DynamicPool::Sqlite(p) => Ok(described_names(p.describe(sql).await?.columns())),
        }
    }
}

fn described_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// 把按 (约束名, 键序) 排好的行合并为外键，保持首次出现顺序
fn group_foreign_keys(table: &str, rows: Vec<(String, String, String, String)>) -> Vec<ForeignKey> {
    let mut keys: Vec<(String, ForeignKey)> = Vec::new();
    for (name, referred, local, remote) in rows {
        match keys.iter_mut().find(|(n, _)| *n == name) {
            Some((_, fk)) => {
                fk.constrained_columns.push(local);
                fk.referred_columns.push(remote);
            }
            None => keys.push((name, ForeignKey::new(table, local, referred, remote))),
        }
    }
    keys.into_iter().map(|(_, fk)| fk).collect()
}

#![allow(dead_code)]

use std::sync::Arc;

use hr_analytics::core::alias_index::AliasIndex;
use hr_analytics::core::analytics::AnalyticsEngine;
use hr_analytics::infra::database::{Database, DynamicPool};
use hr_analytics::models::chart::{AnalyticsRequest, ChartSpec};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    "CREATE TABLE departments (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE positions (id INTEGER PRIMARY KEY, title TEXT NOT NULL)",
    "CREATE TABLE employee_performance (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        department_id INTEGER REFERENCES departments(id),
        position_id INTEGER REFERENCES positions(id),
        salary REAL,
        performance INTEGER,
        status TEXT
    )",
    "CREATE TABLE incentives (
        id INTEGER PRIMARY KEY,
        employee_id INTEGER REFERENCES employee_performance(id),
        amount REAL
    )",
    "CREATE TABLE chat_history (id INTEGER PRIMARY KEY, message TEXT)",
];

const SEED: &[&str] = &[
    "INSERT INTO departments (id, name) VALUES (1, 'Engineering'), (2, 'Sales'), (3, 'HR'), (4, 'Legal')",
    "INSERT INTO positions (id, title) VALUES (1, 'Engineer'), (2, 'Manager')",
    "INSERT INTO employee_performance (id, name, department_id, position_id, salary, performance, status) VALUES
        (1, 'Alice', 1, 1, 100.0, 80, 'Active'),
        (2, 'Bob',   1, 2, 200.0, 90, 'Active'),
        (3, 'Carol', 2, 1, 150.0, 70, 'On Leave'),
        (4, 'Dan',   2, 2, NULL,  NULL, 'Active'),
        (5, 'Eve',   NULL, 1, 50.0, 60, 'Resigned'),
        (6, 'Frank', 4, 2, NULL,  75, 'Active')",
    "INSERT INTO incentives (id, employee_id, amount) VALUES
        (1, 1, 10.0), (2, 1, 20.0), (3, 2, 5.0), (4, 3, 40.0)",
    "INSERT INTO chat_history (id, message) VALUES (1, 'hello')",
];

/// 建一个带 HR 示例数据的内存库，返回 (引擎, 可写连接池)
pub async fn hr_engine() -> (AnalyticsEngine, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    for stmt in SCHEMA.iter().chain(SEED) {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }

    let db = Arc::new(Database::from_pool(DynamicPool::Sqlite(pool.clone()), "main"));
    let engine = AnalyticsEngine::new(db.clone(), db, AliasIndex::with_builtins(&[]).unwrap());
    (engine, pool)
}

pub fn chart_request(x_table: &str, x: &str, y_table: &str, y: &str) -> AnalyticsRequest {
    AnalyticsRequest {
        table_name: "employee_performance".to_string(),
        chart: ChartSpec {
            chart_type: "bar".to_string(),
            x: x.to_string(),
            y: y.to_string(),
            x_table_name: x_table.to_string(),
            y_table_name: y_table.to_string(),
        },
    }
}

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::warn;
use uuid::Uuid;

use crate::models::chart::JsonRow;

/// Postgres 列的解码方式，按原生类型名分派
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PgValueKind {
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Bool,
    Date,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    /// TEXT/VARCHAR 以及枚举、citext 等未单独处理的类型，按文本读取
    Text,
}

fn pg_value_kind(type_name: &str) -> PgValueKind {
    match type_name {
        "INT2" => PgValueKind::Int2,
        "INT4" => PgValueKind::Int4,
        "INT8" => PgValueKind::Int8,
        "FLOAT4" => PgValueKind::Float4,
        "FLOAT8" => PgValueKind::Float8,
        "NUMERIC" => PgValueKind::Numeric,
        "BOOL" => PgValueKind::Bool,
        "DATE" => PgValueKind::Date,
        "TIMESTAMP" => PgValueKind::Timestamp,
        "TIMESTAMPTZ" => PgValueKind::TimestampTz,
        "UUID" => PgValueKind::Uuid,
        "JSON" | "JSONB" => PgValueKind::Json,
        _ => PgValueKind::Text,
    }
}

pub fn pg_row_to_json(row: &PgRow) -> JsonRow {
    let mut map = JsonRow::new();

    for col in row.columns() {
        let name = col.name();
        let idx = col.ordinal();
        let type_info = col.type_info();
        let type_name = type_info.name(); // 获取数据库原生类型名，如 "INT4", "NUMERIC"

        let val = match pg_value_kind(type_name) {
            PgValueKind::Int2 => json!(row.try_get::<Option<i16>, _>(idx).unwrap_or(None)),
            PgValueKind::Int4 => json!(row.try_get::<Option<i32>, _>(idx).unwrap_or(None)),
            PgValueKind::Int8 => json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None)),
            PgValueKind::Float4 => json!(row.try_get::<Option<f32>, _>(idx).unwrap_or(None)),
            PgValueKind::Float8 => json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None)),
            PgValueKind::Numeric => {
                let v: Option<rust_decimal::Decimal> = row.try_get(idx).unwrap_or(None);
                // 聚合结果统一输出为数值
                json!(v.and_then(|d| d.to_f64()))
            }
            PgValueKind::Bool => json!(row.try_get::<Option<bool>, _>(idx).unwrap_or(None)),
            PgValueKind::Date => {
                let v: Option<NaiveDate> = row.try_get(idx).unwrap_or(None);
                json!(v.map(|d| d.to_string()))
            }
            PgValueKind::Timestamp => {
                let v: Option<NaiveDateTime> = row.try_get(idx).unwrap_or(None);
                json!(v.map(|dt| dt.to_string()))
            }
            PgValueKind::TimestampTz => {
                let v: Option<DateTime<Utc>> = row.try_get(idx).unwrap_or(None);
                json!(v.map(|dt| dt.to_rfc3339()))
            }
            PgValueKind::Uuid => {
                let v: Option<Uuid> = row.try_get(idx).unwrap_or(None);
                json!(v.map(|u| u.to_string()))
            }
            PgValueKind::Json => {
                let v: Option<Value> = row.try_get(idx).unwrap_or(None);
                v.unwrap_or(Value::Null)
            }
            PgValueKind::Text => {
                // 枚举等自定义类型过不了 String 的类型检查，跳过检查直接按 UTF-8 读
                match row.try_get_unchecked::<Option<String>, _>(idx) {
                    Ok(v) => json!(v),
                    Err(e) => {
                        warn!("列 {} ({}) 无法按文本解码: {}", name, type_name, e);
                        Value::Null
                    }
                }
            }
        };

        map.insert(name.to_string(), val);
    }

    map
}

pub fn mysql_row_to_json(row: &MySqlRow) -> JsonRow {
    let mut map = JsonRow::new();

    for col in row.columns() {
        let name = col.name();
        let idx = col.ordinal();
        let type_info = col.type_info();
        let type_name = type_info.name(); // 如 "INT", "DECIMAL", "VARCHAR", "DATE"

        let val = match type_name {
            "TINYINT" | "SMALLINT" | "INT" | "MEDIUMINT" | "BIGINT" => {
                json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None))
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "INT UNSIGNED" | "MEDIUMINT UNSIGNED"
            | "BIGINT UNSIGNED" => json!(row.try_get::<Option<u64>, _>(idx).unwrap_or(None)),
            "FLOAT" => json!(row.try_get::<Option<f32>, _>(idx).unwrap_or(None)),
            "DOUBLE" => json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None)),
            "DECIMAL" => {
                let v: Option<rust_decimal::Decimal> = row.try_get(idx).unwrap_or(None);
                json!(v.and_then(|d| d.to_f64()))
            }
            "BOOLEAN" => json!(row.try_get::<Option<bool>, _>(idx).unwrap_or(None)),
            "DATE" => {
                let v: Option<NaiveDate> = row.try_get(idx).unwrap_or(None);
                json!(v.map(|d| d.to_string()))
            }
            "DATETIME" | "TIMESTAMP" => {
                let v: Option<NaiveDateTime> = row.try_get(idx).unwrap_or(None);
                json!(v.map(|dt| dt.to_string()))
            }
            "JSON" => {
                let v: Option<Value> = row.try_get(idx).unwrap_or(None);
                v.unwrap_or(Value::Null)
            }
            _ => json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None)),
        };

        map.insert(name.to_string(), val);
    }

    map
}

/// SQLite 是动态类型，按每个值的实际存储类型解码
pub fn sqlite_row_to_json(row: &SqliteRow) -> JsonRow {
    let mut map = JsonRow::new();

    for col in row.columns() {
        let name = col.name();
        let idx = col.ordinal();

        let val = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => Value::Null,
            Ok(raw) => match raw.type_info().name() {
                "INTEGER" => json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None)),
                "REAL" => json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None)),
                "BOOLEAN" => json!(row.try_get::<Option<bool>, _>(idx).unwrap_or(None)),
                _ => json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None)),
            },
            Err(_) => Value::Null,
        };

        map.insert(name.to_string(), val);
    }

    map
}

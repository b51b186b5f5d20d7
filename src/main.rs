use std::sync::Arc;

use hr_analytics::api::{self, AppState};
use hr_analytics::config::AppConfig;
use hr_analytics::core::alias_index::AliasIndex;
use hr_analytics::core::analytics::AnalyticsEngine;
use hr_analytics::infra::database::Database;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let aliases = AliasIndex::with_builtins(&config.load_aliases()?)?;
    info!("列别名索引已加载: {} 条", aliases.len());

    let db = Arc::new(
        Database::connect(&config.database_url, config.max_connections, &config.db_schema).await?,
    );
    let engine = AnalyticsEngine::new(db.clone(), db, aliases);

    // 预热 schema 图；失败不阻止启动，首个请求会重试
    match engine.schema_graph().await {
        Ok(graph) => info!("schema 预热完成: {} 张表", graph.table_count()),
        Err(e) => warn!("schema 预热失败: {}", e),
    }

    let app = api::router(Arc::new(AppState { engine }));

    info!("🚀 HR Analytics 运行在 http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

use anyhow::Result;
use mokuro_integration::{logger, App, Config};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logger::init(&config)?;

    let app = App::initialize(config).await.map_err(|e| {
        error!("初始化失败: {:#}", e);
        e
    })?;
    app.run().await
}

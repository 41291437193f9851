use anyhow::Result;
use lingua_common::observability::{LogConfig, LogFormat, init_logging};
use lingua_config::{HarvestConfig, HarvestConfigLoader};
use lingua_drivers::browser::session::WebDriverSession;
use lingua_harvest::Harvester;
use lingua_store::SqliteRecordStore;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 1) Load config (env wins)
    let cfg: HarvestConfig = HarvestConfigLoader::new()
        .with_optional_file("lingua.yaml")
        .load()?;

    let log_path = init_logging(log_config(&cfg)?)?;
    info!(log = %log_path.display(), url = %cfg.target.listing_url, "app.start");

    // 2) Store, then browser session
    let store =
        SqliteRecordStore::connect(&cfg.store.url, &cfg.store.database, &cfg.store.collection)
            .await?;
    let driver = WebDriverSession::connect(
        &cfg.webdriver.endpoint,
        cfg.webdriver.headless,
        cfg.webdriver.wait_timeout(),
    )
    .await?;

    // 3) One pass over the whole listing
    let report = Harvester::new(driver, store, cfg)?.run().await?;
    info!(report = %serde_json::to_string(&report)?, "app.done");
    Ok(())
}

fn log_config(cfg: &HarvestConfig) -> Result<LogConfig> {
    let format: LogFormat = cfg.logging.format.parse().map_err(anyhow::Error::msg)?;
    Ok(LogConfig {
        app_name: "lingua".to_string(),
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format,
        default_filter: cfg.logging.filter.clone(),
    })
}

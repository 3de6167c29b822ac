//!
//! src/main.rs
//!
//! Main source file: wires config, logging, the Deezer client and the
//! catalog aggregator together, then hands the finished table to the
//! calling layer (here: a JSON file)
//!

mod config;
mod errors;
mod logging;

mod fetch;
mod resolver;
mod record;
mod table;
mod aggregator;

use std::sync::Arc;

use crate::errors::IngestError;

#[tokio::main]
async fn main() -> Result<(), IngestError> {
    let cfgs = config::load_config()?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service = "playlist-crawler",
        version = %env!("CARGO_PKG_VERSION"),
        user = %cfgs.ingest.user_id,
        full = cfgs.ingest.full,
        "starting"
    );

    let client = fetch::DeezerClient::new(&cfgs.http, &cfgs.deezer)?;
    let fetcher = fetch::Fetcher::new(Arc::new(client.clone()), cfgs.http.retry.clone());
    let mode = record::Mode::from_flag(cfgs.ingest.full);

    let catalog = aggregator::CatalogAggregator::new(client, fetcher, mode);
    let table = catalog.build(&cfgs.ingest.user_id).await?;

    let rendered = serde_json::to_string_pretty(&table.to_rows())?;
    std::fs::write(&cfgs.ingest.output_path, rendered)?;

    tracing::info!(
        path = %cfgs.ingest.output_path,
        rows = table.len(),
        columns = table.columns().len(),
        "track list written"
    );
    Ok(())
}

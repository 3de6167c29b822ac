//!
//! src/aggregator.rs
//!
//! Drives the per-playlist ingestion loop and merges every playlist's
//! tracks into the single deduplicated wide table
//!

use serde_json::Value;
use tracing::{debug, info};

use crate::fetch::{DeezerClient, Fetcher};
use crate::record::{Mode, RecordBuilder};
use crate::resolver::OwnerResolver;
use crate::table::TrackTable;
use crate::IngestError;

/// Sequentially ingests one user's owned playlists into a `TrackTable`.
/// One playlist is fully processed, detail fetches included, before the
/// next begins.
pub struct CatalogAggregator {
    client: DeezerClient,
    fetcher: Fetcher,
    resolver: OwnerResolver,
    builder: RecordBuilder,
    mode: Mode,
}

impl CatalogAggregator {
    pub fn new(client: DeezerClient, fetcher: Fetcher, mode: Mode) -> Self {
        let resolver = OwnerResolver::new(client.clone(), fetcher.clone());
        let builder = RecordBuilder::new(client.clone(), fetcher.clone(), mode);
        Self { client, fetcher, resolver, builder, mode }
    }

    pub async fn build(&self, user_id: &str) -> Result<TrackTable, IngestError> {
        let mut table = TrackTable::new(self.mode);
        let playlists = self.resolver.resolve(user_id).await?;

        for playlist in &playlists {
            debug!(playlist_id = playlist.id, title = %playlist.title, "catalog.fetch");
            self.ingest_playlist(playlist.id, &mut table).await?;
        }

        info!(
            tracks = table.len(),
            playlists = playlists.len(),
            shared = table.shared_track_count(),
            "catalog.done"
        );
        Ok(table)
    }

    async fn ingest_playlist(&self, playlist_id: u64, table: &mut TrackTable) ->
        Result<(), IngestError> {

        // Capped at the configured track page size; longer playlists are
        // silently truncated by the remote service.
        let payload = self.fetcher.fetch(&self.client.playlist(playlist_id)).await?;
        let title = payload.get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::Parse(
                format!("playlist {playlist_id} detail has no title")
            ))?
            .to_string();
        let tracks = payload.pointer("/tracks/data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        info!(playlist = %title, tracks = tracks.len(), "catalog.playlist");

        for entry in &tracks {
            match entry.get("id").and_then(Value::as_u64) {
                Some(id) if table.contains(id) => {
                    table.mark_membership(id, &title);
                }
                _ => {
                    if let Some(record) = self.builder.build(entry, &title).await? {
                        let id = record.id;
                        table.insert(record);
                        // every surviving row carries the membership that
                        // created it, in short mode too
                        table.mark_membership(id, &title);
                    }
                }
            }
        }
        Ok(())
    }
}

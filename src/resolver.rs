//!
//! src/resolver.rs
//!
//! Resolves which playlists in a user's listing the user actually created,
//! by majority creator name. A listing mixes owned playlists with followed
//! ones; the most common creator is taken to be the true owner.
//!

use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use crate::fetch::{DeezerClient, Fetcher};
use crate::IngestError;

/// Ephemeral handle onto one listed playlist. Lives only through
/// resolution and iteration, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: u64,
    pub title: String,
    pub creator: String,
}

fn parse_ref(entry: &Value) -> Option<PlaylistRef> {
    Some(PlaylistRef {
        id: entry.get("id")?.as_u64()?,
        title: entry.get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        creator: entry.pointer("/creator/name")?.as_str()?.to_string(),
    })
}

/// Mode by count over creator names; a tie goes to whichever tied creator
/// appears first in the listing. Heuristic, not a correctness guarantee.
fn most_common_creator(refs: &[PlaylistRef]) -> &str {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in refs {
        *counts.entry(r.creator.as_str()).or_insert(0) += 1;
    }
    let best = counts.values().copied().max().unwrap_or(0);
    refs.iter()
        .map(|r| r.creator.as_str())
        .find(|name| counts[name] == best)
        .unwrap_or_default()
}

/// Filters a user's playlist listing down to the heuristic true owner's
/// playlists, preserving listing order.
pub struct OwnerResolver {
    client: DeezerClient,
    fetcher: Fetcher,
}

impl OwnerResolver {
    pub fn new(client: DeezerClient, fetcher: Fetcher) -> Self {
        Self { client, fetcher }
    }

    /// Single listing page only; playlists beyond the configured page
    /// limit are never seen.
    pub async fn resolve(&self, user_id: &str) -> Result<Vec<PlaylistRef>, IngestError> {
        let url = self.client.user_playlists(user_id);
        let payload = self.fetcher.fetch(&url).await?;
        let listing = payload.get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| IngestError::Parse(
                format!("playlist listing for user {user_id} has no data array")
            ))?;

        let refs: Vec<PlaylistRef> = listing.iter().filter_map(parse_ref).collect();
        if refs.is_empty() {
            return Err(IngestError::NotFound(
                format!("no playlists listed for user {user_id}")
            ));
        }

        let owner = most_common_creator(&refs).to_string();
        let owned: Vec<PlaylistRef> = refs.into_iter()
            .filter(|p| p.creator == owner)
            .collect();

        info!(owner = %owner, count = owned.len(), "resolver.done");
        Ok(owned)
    }
}

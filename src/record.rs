//!
//! src/record.rs
//!
//! Defines the normalized track record and the builder that turns one raw
//! playlist track entry into a record, optionally enriched from the
//! per-track detail endpoint
//!

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::fetch::{DeezerClient, Fetcher};
use crate::IngestError;

/// Ingestion variant: `Full` performs one extra detail fetch per new track
/// and populates the extended and contributor fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Short,
    Full,
}

impl Mode {
    pub fn from_flag(full: bool) -> Self {
        if full { Mode::Full } else { Mode::Short }
    }

    pub fn is_full(self) -> bool {
        self == Mode::Full
    }
}

/// A contributing artist in an `artist_{slot}` column. Slots are 1-based
/// listing positions; a dropped duplicate leaves a gap, never a renumbering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contributor {
    pub slot: usize,
    pub name: String,
}

impl Contributor {
    pub fn column_name(&self) -> String {
        format!("artist_{}", self.slot)
    }
}

/// One logical track. Created the first time its id is seen; only its
/// membership set is mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRecord {
    pub id: u64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<i64>,
    pub rank: Option<i64>,

    // full mode only
    pub release_date: Option<String>,
    pub bpm: Option<f64>,
    pub gain: Option<f64>,
    pub contributors: Vec<Contributor>,

    /// Playlist titles this row belongs to.
    pub memberships: BTreeSet<String>,
}

impl TrackRecord {
    pub fn in_playlist(&self, title: &str) -> bool {
        self.memberships.contains(title)
    }

    pub fn contributor(&self, slot: usize) -> Option<&str> {
        self.contributors.iter()
            .find(|c| c.slot == slot)
            .map(|c| c.name.as_str())
    }
}

fn field_str(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn nested_str(v: &Value, outer: &str, inner: &str) -> Option<String> {
    v.get(outer)
        .and_then(|o| o.get(inner))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// A detail payload supersedes the shallow entry only when it actually
/// describes a track: carries an id and no error object.
fn usable_detail(payload: &Value) -> bool {
    payload.get("error").is_none()
        && payload.get("id").and_then(Value::as_u64).is_some()
}

/// Builds normalized records from raw playlist track entries. Per-track
/// failures are logged and swallowed; the run continues without the track.
pub struct RecordBuilder {
    client: DeezerClient,
    fetcher: Fetcher,
    mode: Mode,
}

impl RecordBuilder {
    pub fn new(client: DeezerClient, fetcher: Fetcher, mode: Mode) -> Self {
        Self { client, fetcher, mode }
    }

    /// `None` means the track is skipped, never that the run should die.
    /// Quota exhaustion inside the detail fetch still aborts the run.
    pub async fn build(&self, entry: &Value, playlist_title: &str) ->
        Result<Option<TrackRecord>, IngestError> {

        match self.try_build(entry, playlist_title).await {
            Ok(record) => Ok(Some(record)),
            Err(e @ IngestError::QuotaExceeded(_)) => Err(e),
            Err(e) => {
                let id = entry.get("id").and_then(Value::as_u64);
                error!(track_id = ?id, error = %e, "record.skip");
                Ok(None)
            }
        }
    }

    async fn try_build(&self, entry: &Value, playlist_title: &str) ->
        Result<TrackRecord, IngestError> {

        let shallow_id = entry.get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| IngestError::Parse("track entry missing id".into()))?;

        // In full mode the detail payload fully supersedes the shallow
        // entry; there is no field-by-field merge.
        let detail;
        let source: &Value = if self.mode.is_full() {
            detail = self.fetcher.fetch(&self.client.track(shallow_id)).await?;
            if !usable_detail(&detail) {
                return Err(IngestError::Parse(
                    format!("unusable detail payload for track {shallow_id}")
                ));
            }
            &detail
        } else {
            entry
        };

        let id = source.get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| IngestError::Parse("track payload missing id".into()))?;

        let mut record = TrackRecord {
            id,
            title: field_str(source, "title"),
            artist: nested_str(source, "artist", "name"),
            album: nested_str(source, "album", "title"),
            duration: source.get("duration").and_then(Value::as_i64),
            rank: source.get("rank").and_then(Value::as_i64),
            release_date: None,
            bpm: None,
            gain: None,
            contributors: Vec::new(),
            memberships: BTreeSet::new(),
        };

        if self.mode.is_full() {
            record.release_date = field_str(source, "release_date");
            record.bpm  = source.get("bpm").and_then(Value::as_f64);
            record.gain = source.get("gain").and_then(Value::as_f64);
            record.contributors = Self::contributor_slots(source, record.artist.as_deref());

            // The fresh record announces its own first-seen membership.
            record.memberships.insert(playlist_title.to_string());
        }

        Ok(record)
    }

    /// Slots contributors by listing order. When the first contributor just
    /// repeats the primary artist, its slot is dropped and later slots keep
    /// their numbers.
    fn contributor_slots(source: &Value, primary: Option<&str>) -> Vec<Contributor> {
        let names: Vec<&str> = source.get("contributors")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();

        names.iter()
            .enumerate()
            .map(|(i, name)| Contributor { slot: i + 1, name: (*name).to_string() })
            .filter(|c| !(c.slot == 1 && Some(c.name.as_str()) == primary))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::DeezerConfig;
    use crate::fetch::stub::{StubSource, quota_payload, zero_delay_retry};
    use serde_json::json;
    use url::Url;

    fn client() -> DeezerClient {
        DeezerClient {
            http: reqwest::Client::new(),
            cfg: DeezerConfig {
                base_url: Url::parse("https://api.deezer.com/").unwrap(),
                playlist_page_limit: 100,
                track_page_limit: 2000,
            },
        }
    }

    fn builder(source: Arc<StubSource>, mode: Mode) -> RecordBuilder {
        let fetcher = Fetcher::new(source, zero_delay_retry());
        RecordBuilder::new(client(), fetcher, mode)
    }

    fn shallow_entry() -> Value {
        json!({
            "id": 42,
            "title": "Shallow Title",
            "artist": { "name": "Shallow Artist" },
            "album": { "title": "Shallow Album" },
            "duration": 200,
            "rank": 100
        })
    }

    #[tokio::test]
    async fn short_mode_reads_the_shallow_entry_only() {
        let source = Arc::new(StubSource::new());
        let b = builder(source.clone(), Mode::Short);

        let record = b.build(&shallow_entry(), "Favorites").await.unwrap().unwrap();
        assert_eq!(record.id, 42);
        assert_eq!(record.title.as_deref(), Some("Shallow Title"));
        assert_eq!(record.artist.as_deref(), Some("Shallow Artist"));
        assert_eq!(record.album.as_deref(), Some("Shallow Album"));
        assert_eq!(record.duration, Some(200));
        assert_eq!(record.rank, Some(100));
        assert!(record.release_date.is_none());
        assert!(record.contributors.is_empty());
        // no detail fetch happened
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn full_mode_detail_supersedes_shallow_entry() {
        let source = Arc::new(StubSource::new());
        let b = builder(source.clone(), Mode::Full);
        source.insert(&b.client.track(42), vec![json!({
            "id": 42,
            "title": "Detail Title",
            "artist": { "name": "Detail Artist" },
            "album": { "title": "Detail Album" },
            "duration": 201,
            "rank": 900,
            "release_date": "2020-01-31",
            "bpm": 120.5,
            "gain": -7.1,
            "contributors": [
                { "name": "Someone Else" },
                { "name": "Third Artist" }
            ]
        })]);

        let record = b.build(&shallow_entry(), "Favorites").await.unwrap().unwrap();
        assert_eq!(record.title.as_deref(), Some("Detail Title"));
        assert_eq!(record.artist.as_deref(), Some("Detail Artist"));
        assert_eq!(record.release_date.as_deref(), Some("2020-01-31"));
        assert_eq!(record.bpm, Some(120.5));
        assert_eq!(record.gain, Some(-7.1));
        assert_eq!(record.contributor(1), Some("Someone Else"));
        assert_eq!(record.contributor(2), Some("Third Artist"));
        assert!(record.in_playlist("Favorites"));
    }

    #[tokio::test]
    async fn duplicate_first_contributor_leaves_a_gap() {
        let source = Arc::new(StubSource::new());
        let b = builder(source.clone(), Mode::Full);
        source.insert(&b.client.track(42), vec![json!({
            "id": 42,
            "title": "Song",
            "artist": { "name": "Main Artist" },
            "duration": 180,
            "rank": 1,
            "contributors": [
                { "name": "Main Artist" },
                { "name": "Featured Artist" }
            ]
        })]);

        let record = b.build(&shallow_entry(), "Favorites").await.unwrap().unwrap();
        assert_eq!(record.contributor(1), None);
        assert_eq!(record.contributor(2), Some("Featured Artist"));
    }

    #[tokio::test]
    async fn missing_id_skips_the_track() {
        let source = Arc::new(StubSource::new());
        let b = builder(source, Mode::Short);
        let entry = json!({ "title": "No Id Here" });

        assert!(b.build(&entry, "Favorites").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn error_detail_payload_skips_the_track() {
        let source = Arc::new(StubSource::new());
        let b = builder(source.clone(), Mode::Full);
        source.insert(&b.client.track(42), vec![json!({
            "error": { "type": "DataException", "message": "no data", "code": 800 }
        })]);

        assert!(b.build(&shallow_entry(), "Favorites").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn detail_fetch_failure_skips_the_track() {
        // no stub payload registered: transport-level failure
        let source = Arc::new(StubSource::new());
        let b = builder(source, Mode::Full);

        assert!(b.build(&shallow_entry(), "Favorites").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn quota_exhaustion_in_detail_fetch_is_fatal() {
        let source = Arc::new(StubSource::new());
        let b = builder(source.clone(), Mode::Full);
        source.insert(&b.client.track(42), vec![quota_payload()]);

        let err = b.build(&shallow_entry(), "Favorites").await.unwrap_err();
        assert!(matches!(err, IngestError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn absent_nested_fields_stay_absent() {
        let source = Arc::new(StubSource::new());
        let b = builder(source, Mode::Short);
        let entry = json!({ "id": 7, "title": "Bare", "duration": 90 });

        let record = b.build(&entry, "Favorites").await.unwrap().unwrap();
        assert!(record.artist.is_none());
        assert!(record.album.is_none());
        assert!(record.rank.is_none());
    }
}

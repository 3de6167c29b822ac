//!
//! src/table.rs
//!
//! Defines the schema-evolving wide track table: an ordered column
//! registry plus one sparse record per unique track id
//!

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::record::{Contributor, Mode, TrackRecord};

pub const COLUMNS_SHORT: [&str; 6] = ["id", "title", "artist", "album", "duration", "rank"];
pub const COLUMNS_EXTENDED: [&str; 3] = ["release_date", "bpm", "gain"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Base,
    Extended,
    /// 1-based `artist_{slot}` contributor column.
    Contributor(usize),
    /// Boolean membership column named after a playlist title.
    Membership,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// The single growing output table. Columns are registered lazily as
/// playlists and contributor slots are first seen; the registry only ever
/// widens. Rows are keyed by track id and never removed.
#[derive(Debug)]
pub struct TrackTable {
    columns: Vec<Column>,
    rows: Vec<TrackRecord>,
    index: HashMap<u64, usize>,
}

impl TrackTable {
    pub fn new(mode: Mode) -> Self {
        let mut columns: Vec<Column> = COLUMNS_SHORT.iter()
            .map(|name| Column { name: (*name).to_string(), kind: ColumnKind::Base })
            .collect();
        if mode.is_full() {
            columns.extend(COLUMNS_EXTENDED.iter().map(|name| Column {
                name: (*name).to_string(),
                kind: ColumnKind::Extended,
            }));
        }
        Self {
            columns,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[TrackRecord] {
        &self.rows
    }

    pub fn get(&self, id: u64) -> Option<&TrackRecord> {
        self.index.get(&id).map(|i| &self.rows[*i])
    }

    /// Rows that belong to more than one playlist.
    pub fn shared_track_count(&self) -> usize {
        self.rows.iter().filter(|r| r.memberships.len() > 1).count()
    }

    /// Appends a freshly built record, registering any columns it brings
    /// with it. A record whose id is already present is rejected.
    pub fn insert(&mut self, record: TrackRecord) -> bool {
        if self.contains(record.id) {
            return false;
        }
        for contributor in &record.contributors {
            self.register_contributor(contributor);
        }
        for title in &record.memberships {
            self.register_membership(title);
        }
        self.index.insert(record.id, self.rows.len());
        self.rows.push(record);
        true
    }

    /// Flips the membership flag for an already-known track. Registers the
    /// playlist column when this is its first sighting.
    pub fn mark_membership(&mut self, id: u64, playlist_title: &str) -> bool {
        let Some(&row) = self.index.get(&id) else {
            return false;
        };
        self.register_membership(playlist_title);
        self.rows[row].memberships.insert(playlist_title.to_string());
        true
    }

    fn register_membership(&mut self, title: &str) {
        if !self.columns.iter().any(|c| c.name == title) {
            self.columns.push(Column {
                name: title.to_string(),
                kind: ColumnKind::Membership,
            });
        }
    }

    fn register_contributor(&mut self, contributor: &Contributor) {
        let name = contributor.column_name();
        if !self.columns.iter().any(|c| c.name == name) {
            self.columns.push(Column {
                name,
                kind: ColumnKind::Contributor(contributor.slot),
            });
        }
    }

    /// Materializes the table for the calling layer, one object per row in
    /// registry column order. Absent scalars become null; memberships a row
    /// never saw become explicit false.
    pub fn to_rows(&self) -> Vec<Map<String, Value>> {
        self.rows.iter().map(|row| self.materialize(row)).collect()
    }

    fn materialize(&self, row: &TrackRecord) -> Map<String, Value> {
        let mut out = Map::new();
        for column in &self.columns {
            let value = match &column.kind {
                ColumnKind::Base => base_value(row, &column.name),
                ColumnKind::Extended => extended_value(row, &column.name),
                ColumnKind::Contributor(slot) => row.contributor(*slot)
                    .map(|name| Value::String(name.to_string()))
                    .unwrap_or(Value::Null),
                ColumnKind::Membership => Value::Bool(row.in_playlist(&column.name)),
            };
            out.insert(column.name.clone(), value);
        }
        out
    }
}

fn opt_str(value: &Option<String>) -> Value {
    value.as_deref()
        .map(|s| Value::String(s.to_string()))
        .unwrap_or(Value::Null)
}

fn opt_int(value: Option<i64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn base_value(row: &TrackRecord, name: &str) -> Value {
    match name {
        "id" => Value::from(row.id),
        "title" => opt_str(&row.title),
        "artist" => opt_str(&row.artist),
        "album" => opt_str(&row.album),
        "duration" => opt_int(row.duration),
        "rank" => opt_int(row.rank),
        _ => Value::Null,
    }
}

fn extended_value(row: &TrackRecord, name: &str) -> Value {
    match name {
        "release_date" => opt_str(&row.release_date),
        "bpm" => row.bpm.map(Value::from).unwrap_or(Value::Null),
        "gain" => row.gain.map(Value::from).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::catalog::{SessionType, TrackInfo};
use crate::error::{Result, TimingError};

/// A duration in seconds.
pub type Seconds = f64;

/// Team / manufacturer value for drivers missing from the roster.
pub const UNKNOWN: &str = "Unknown";

/// Car number used for manually entered laps when the roster has none.
pub const MANUAL_CAR_NUMBER: &str = "99";

/// Transponder quality readings. Passed through as exported, never validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalQuality {
    #[serde(default)]
    pub hits: Option<f64>,
    #[serde(default)]
    pub strength: Option<f64>,
    #[serde(default)]
    pub noise: Option<f64>,
}

/// One timed lap by one driver in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    /// Driver identity (full name as printed in the export header).
    pub driver_id: String,
    /// Car number; the roster value takes precedence over the header's.
    pub car_number: String,
    /// Category text from the block header.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub lap_number: Option<u32>,
    /// Raw time-of-day cell, kept verbatim.
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub lap_time: Option<Seconds>,
    /// One slot per sector of the session, `None` where no time was recorded.
    #[serde(default)]
    pub sector_times: Vec<Option<Seconds>>,
    /// Average lap speed in km/h.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Speed-trap reading in km/h.
    #[serde(default)]
    pub speed_trap: Option<f64>,
    #[serde(default)]
    pub signal: Option<SignalQuality>,
    pub team: String,
    pub manufacturer: String,
}

impl LapRecord {
    /// Build a manually entered lap, resolving team data through `roster`.
    pub fn manual(
        driver: &str,
        lap_time: Option<Seconds>,
        sector_times: Vec<Option<Seconds>>,
        roster: &Roster,
    ) -> Self {
        let entry = roster.get(driver);
        Self {
            driver_id: driver.to_string(),
            car_number: entry
                .and_then(|e| e.car_number.clone())
                .unwrap_or_else(|| MANUAL_CAR_NUMBER.to_string()),
            category: String::new(),
            lap_number: None,
            time_of_day: None,
            lap_time,
            sector_times,
            speed: None,
            speed_trap: None,
            signal: None,
            team: roster.team_of(driver),
            manufacturer: roster.manufacturer_of(driver),
        }
    }

    /// Time for sector `index` (0-based), `None` when absent or out of range.
    pub fn sector(&self, index: usize) -> Option<Seconds> {
        self.sector_times.get(index).copied().flatten()
    }
}

/// Which optional columns a session carries. Resolved once at ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSchema {
    pub sector_count: usize,
    pub has_lap_number: bool,
    pub has_speed: bool,
    pub has_speed_trap: bool,
    pub has_signal: bool,
}

impl SessionSchema {
    /// Schema implied by a single record (used when a manual entry opens a session).
    pub fn from_record(record: &LapRecord) -> Self {
        Self {
            sector_count: record.sector_times.len(),
            has_lap_number: record.lap_number.is_some(),
            has_speed: record.speed.is_some(),
            has_speed_trap: record.speed_trap.is_some(),
            has_signal: record.signal.is_some(),
        }
    }
}

/// Identity of a stored session: `(season, stage, session type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub season: String,
    /// Free-text stage label, e.g. `"#3 Interlagos"`.
    pub stage: String,
    pub session_type: SessionType,
}

impl SessionKey {
    pub fn new(
        season: impl Into<String>,
        stage: impl Into<String>,
        session_type: SessionType,
    ) -> Self {
        Self {
            season: season.into(),
            stage: stage.into(),
            session_type,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.season, self.stage, self.session_type.label())
    }
}

/// Caller-supplied metadata for a session that is about to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub key: SessionKey,
    pub track: TrackInfo,
    /// Explicit chronological position of the stage within its season.
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What the caller knows about an export before it is parsed.
///
/// The track is resolved against the catalogue after parsing, once the
/// sector count is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub key: SessionKey,
    pub track: String,
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl IngestRequest {
    pub fn into_meta(self, track: TrackInfo) -> SessionMeta {
        SessionMeta {
            key: self.key,
            track,
            round: self.round,
            notes: self.notes,
        }
    }
}

/// How sessions are ordered in an evolution series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionOrder {
    /// By season, then explicit round; sessions without a round follow those
    /// with one in the same season. Ties keep insertion order.
    #[default]
    Chronological,
    /// Store insertion order.
    Insertion,
    /// Lexicographic order of the rendered session key.
    KeyLexicographic,
}

impl std::str::FromStr for EvolutionOrder {
    type Err = TimingError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "chronological" => Ok(Self::Chronological),
            "insertion" => Ok(Self::Insertion),
            "key_lexicographic" | "key" => Ok(Self::KeyLexicographic),
            other => Err(TimingError::Config(format!(
                "unknown evolution order '{other}'"
            ))),
        }
    }
}

/// A stored collection of laps plus session metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSession {
    pub key: SessionKey,
    pub track: TrackInfo,
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub schema: SessionSchema,
    #[serde(default)]
    pub records: Vec<LapRecord>,
}

impl TimingSession {
    pub fn new(meta: SessionMeta, schema: SessionSchema, records: Vec<LapRecord>) -> Self {
        Self {
            key: meta.key,
            track: meta.track,
            round: meta.round,
            notes: meta.notes,
            created_at: Utc::now(),
            schema,
            records,
        }
    }

    /// Distinct driver ids in first-encounter order.
    pub fn drivers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.driver_id.as_str()) {
                seen.push(&record.driver_id);
            }
        }
        seen
    }

    /// All laps of one driver, in file order.
    pub fn laps_of<'a>(&'a self, driver: &'a str) -> impl Iterator<Item = &'a LapRecord> + 'a {
        self.records.iter().filter(move |r| r.driver_id == driver)
    }

    /// Fastest valid lap of `driver`, `None` when every lap is absent.
    pub fn best_lap_of(&self, driver: &str) -> Option<Seconds> {
        self.laps_of(driver)
            .filter_map(|r| r.lap_time)
            .fold(None, |best: Option<Seconds>, t| {
                Some(best.map_or(t, |b| b.min(t)))
            })
    }
}

/// Where a reference profile's times came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    Session(SessionKey),
    Manual,
}

/// A named benchmark time set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    pub name: String,
    pub driver: String,
    pub best_lap: Option<Seconds>,
    #[serde(default)]
    pub sector_bests: Vec<Option<Seconds>>,
    #[serde(default)]
    pub speed_trap_peak: Option<f64>,
    pub source: ReferenceSource,
}

impl ReferenceProfile {
    /// A benchmark typed in by hand.
    pub fn manual(
        name: impl Into<String>,
        driver: impl Into<String>,
        best_lap: Option<Seconds>,
        sector_bests: Vec<Option<Seconds>>,
        speed_trap_peak: Option<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            driver: driver.into(),
            best_lap,
            sector_bests,
            speed_trap_peak,
            source: ReferenceSource::Manual,
        }
    }

    /// Capture `driver`'s bests in `session`: fastest lap, fastest time in
    /// each sector (independently) and peak speed-trap reading.
    pub fn from_session(
        name: impl Into<String>,
        session: &TimingSession,
        driver: &str,
    ) -> Result<Self> {
        let laps: Vec<&LapRecord> = session.laps_of(driver).collect();
        if laps.is_empty() {
            return Err(TimingError::DriverNotFound(driver.to_string()));
        }

        let min_of = |values: Vec<f64>| values.into_iter().reduce(f64::min);
        let sector_bests = (0..session.schema.sector_count)
            .map(|s| min_of(laps.iter().filter_map(|r| r.sector(s)).collect()))
            .collect();

        Ok(Self {
            name: name.into(),
            driver: driver.to_string(),
            best_lap: session.best_lap_of(driver),
            sector_bests,
            speed_trap_peak: laps
                .iter()
                .filter_map(|r| r.speed_trap)
                .reduce(f64::max),
            source: ReferenceSource::Session(session.key.clone()),
        })
    }

    pub fn sector_best(&self, index: usize) -> Option<Seconds> {
        self.sector_bests.get(index).copied().flatten()
    }
}

/// Read-only access to stored sessions in insertion order.
///
/// Implemented by the session store so analysis code can iterate sessions
/// without depending on how they are held.
pub trait SessionSource {
    fn sessions(&self) -> Box<dyn Iterator<Item = &TimingSession> + '_>;
}

impl SessionSource for [TimingSession] {
    fn sessions(&self) -> Box<dyn Iterator<Item = &TimingSession> + '_> {
        Box::new(self.iter())
    }
}

impl SessionSource for Vec<TimingSession> {
    fn sessions(&self) -> Box<dyn Iterator<Item = &TimingSession> + '_> {
        Box::new(self.iter())
    }
}

// ── Roster ────────────────────────────────────────────────────────────────────

/// Team data for one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub team: String,
    pub manufacturer: String,
    #[serde(default)]
    pub car_number: Option<String>,
}

/// Driver name → team / manufacturer / car number lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    entries: HashMap<String, RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object keyed by driver name.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| TimingError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let roster: Self = serde_json::from_str(&content)?;
        debug!("Loaded {} roster entries from {}", roster.len(), path.display());
        Ok(roster)
    }

    pub fn insert(&mut self, driver: impl Into<String>, entry: RosterEntry) {
        self.entries.insert(driver.into(), entry);
    }

    pub fn get(&self, driver: &str) -> Option<&RosterEntry> {
        self.entries.get(driver)
    }

    pub fn team_of(&self, driver: &str) -> String {
        self.get(driver)
            .map(|e| e.team.clone())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn manufacturer_of(&self, driver: &str) -> String {
        self.get(driver)
            .map(|e| e.manufacturer.clone())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

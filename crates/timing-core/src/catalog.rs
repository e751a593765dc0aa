use crate::error::{Result, TimingError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Official session types of a race weekend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    /// Practice reserved for rookie drivers.
    RookieTest,
    /// Short installation run.
    ShakeDown,
    /// First free practice ("T1").
    Practice1,
    /// Second free practice ("T2").
    Practice2,
    /// First qualifying segment, group 1 ("Q1-G1").
    Q1Group1,
    /// First qualifying segment, group 2 ("Q1-G2").
    Q1Group2,
    /// Second qualifying segment.
    Q2,
    /// Third qualifying segment.
    Q3,
    /// Final super-pole shoot-out ("QF").
    SuperPole,
    /// Sprint race ("Prova1 Sprint").
    SprintRace,
    /// Main race ("P2").
    MainRace,
    /// Pre-race warm up.
    WarmUp,
}

/// Broad category of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Practice,
    Qualifying,
    Race,
    WarmUp,
}

impl SessionType {
    /// Every session type in weekend order.
    pub const ALL: [SessionType; 12] = [
        SessionType::RookieTest,
        SessionType::ShakeDown,
        SessionType::Practice1,
        SessionType::Practice2,
        SessionType::Q1Group1,
        SessionType::Q1Group2,
        SessionType::Q2,
        SessionType::Q3,
        SessionType::SuperPole,
        SessionType::SprintRace,
        SessionType::MainRace,
        SessionType::WarmUp,
    ];

    /// Label used by the timing service and in session keys.
    pub fn label(&self) -> &'static str {
        match self {
            SessionType::RookieTest => "Treino Rookies",
            SessionType::ShakeDown => "Shake Down",
            SessionType::Practice1 => "T1",
            SessionType::Practice2 => "T2",
            SessionType::Q1Group1 => "Q1-G1",
            SessionType::Q1Group2 => "Q1-G2",
            SessionType::Q2 => "Q2",
            SessionType::Q3 => "Q3",
            SessionType::SuperPole => "QF",
            SessionType::SprintRace => "Prova1 Sprint",
            SessionType::MainRace => "P2",
            SessionType::WarmUp => "Warm Up",
        }
    }

    pub fn kind(&self) -> SessionKind {
        match self {
            SessionType::RookieTest
            | SessionType::ShakeDown
            | SessionType::Practice1
            | SessionType::Practice2 => SessionKind::Practice,
            SessionType::Q1Group1
            | SessionType::Q1Group2
            | SessionType::Q2
            | SessionType::Q3
            | SessionType::SuperPole => SessionKind::Qualifying,
            SessionType::SprintRace | SessionType::MainRace => SessionKind::Race,
            SessionType::WarmUp => SessionKind::WarmUp,
        }
    }

    /// Nominal session length in minutes.
    pub fn duration_minutes(&self) -> u32 {
        match self {
            SessionType::RookieTest => 30,
            SessionType::ShakeDown => 15,
            SessionType::Practice1 | SessionType::Practice2 => 90,
            SessionType::Q1Group1 | SessionType::Q1Group2 => 15,
            SessionType::Q2 => 12,
            SessionType::Q3 => 10,
            SessionType::SuperPole => 8,
            SessionType::SprintRace => 30,
            SessionType::MainRace => 50,
            SessionType::WarmUp => 20,
        }
    }

    /// Whether finishing positions in this session score championship points.
    pub fn awards_points(&self) -> bool {
        self.kind() == SessionKind::Race
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SessionType {
    type Err = TimingError;

    /// Case-insensitive construction from either the timing-service label
    /// (`"Q1-G1"`, `"Prova1 Sprint"`) or the snake_case identifier
    /// (`"q1_group1"`, `"sprint_race"`).
    fn from_str(value: &str) -> Result<Self> {
        let needle = value.trim().to_lowercase();
        SessionType::ALL
            .into_iter()
            .find(|t| {
                t.label().to_lowercase() == needle
                    || serde_json::to_value(t)
                        .ok()
                        .and_then(|v| v.as_str().map(|s| s == needle))
                        .unwrap_or(false)
            })
            .ok_or_else(|| TimingError::UnknownSessionType(value.to_string()))
    }
}

// ── Tracks ────────────────────────────────────────────────────────────────────

/// Static description of a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub name: String,
    /// Lap length in kilometres (0.0 when unknown).
    pub distance_km: f64,
    /// Number of timed sectors.
    pub sectors: usize,
    #[serde(default)]
    pub drs_zones: u32,
}

impl TrackInfo {
    /// Placeholder for a track missing from the catalogue.
    pub fn unlisted(name: impl Into<String>, sectors: usize) -> Self {
        Self {
            name: name.into(),
            distance_km: 0.0,
            sectors,
            drs_zones: 0,
        }
    }
}

/// Name-indexed lookup of known circuits.
#[derive(Debug, Clone)]
pub struct TrackCatalog {
    tracks: HashMap<String, TrackInfo>,
}

impl Default for TrackCatalog {
    fn default() -> Self {
        Self::official()
    }
}

impl TrackCatalog {
    /// An empty catalogue.
    pub fn empty() -> Self {
        Self {
            tracks: HashMap::new(),
        }
    }

    /// The built-in list of championship circuits.
    pub fn official() -> Self {
        let mut catalog = Self::empty();
        for (name, distance_km, drs_zones) in OFFICIAL_TRACKS {
            catalog.insert(TrackInfo {
                name: name.to_string(),
                distance_km: *distance_km,
                sectors: 3,
                drs_zones: *drs_zones,
            });
        }
        catalog
    }

    /// Load a JSON array of [`TrackInfo`] and merge it over the built-in list.
    pub fn official_with_overrides(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| TimingError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let extra: Vec<TrackInfo> = serde_json::from_str(&content)?;
        let mut catalog = Self::official();
        debug!("Merging {} track definitions from {}", extra.len(), path.display());
        for track in extra {
            catalog.insert(track);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, track: TrackInfo) {
        self.tracks.insert(track.name.clone(), track);
    }

    pub fn get(&self, name: &str) -> Option<&TrackInfo> {
        self.tracks.get(name)
    }

    /// Look up `name`, falling back to [`TrackInfo::unlisted`].
    pub fn resolve(&self, name: &str, sectors: usize) -> TrackInfo {
        self.get(name)
            .cloned()
            .unwrap_or_else(|| TrackInfo::unlisted(name, sectors))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// `(name, distance_km, drs_zones)`; every official circuit is timed in 3 sectors.
const OFFICIAL_TRACKS: &[(&str, f64, u32)] = &[
    ("Goiânia", 3.835, 1),
    ("Velocitta", 3.150, 2),
    ("Interlagos", 4.309, 2),
    ("Cascavel", 3.458, 1),
    ("Velopark", 3.068, 2),
    ("Belo Horizonte", 3.067, 1),
    ("Buenos Aires", 4.200, 2),
    ("Uruguai", 3.200, 1),
    ("Curitiba", 2.369, 1),
    ("Santa Cruz do Sul", 3.067, 1),
    ("Tarumã", 3.068, 2),
    ("Ribeirão Preto", 4.216, 2),
];

// ── Championship points ───────────────────────────────────────────────────────

/// Points for finishing positions 1..=15; everything below scores nothing.
pub const POINTS_TABLE: &[u32] = &[25, 20, 16, 13, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1];

/// Championship points for a 1-based finishing position.
pub fn points_for_position(position: usize) -> u32 {
    position
        .checked_sub(1)
        .and_then(|idx| POINTS_TABLE.get(idx).copied())
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

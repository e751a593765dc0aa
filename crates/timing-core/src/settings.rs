use clap::{Args, Parser, Subcommand, ValueEnum};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::catalog::SessionType;
use crate::error::{FormatError, Result, TimingError};
use crate::models::{EvolutionOrder, IngestRequest, SessionKey};
use crate::time_literal::DEFAULT_NO_TIME_SENTINEL;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Lap-timing export analysis
#[derive(Parser, Debug, Clone)]
#[command(
    name = "timing-analytics",
    about = "Ingest lap-timing exports and compute rankings, deltas and evolution",
    version
)]
pub struct Settings {
    /// Logging level
    #[arg(
        long,
        global = true,
        default_value = "INFO",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    pub log_level: String,

    /// Ingest configuration file (JSON)
    #[arg(long, global = true, env = "TIMING_CONFIG")]
    pub config: Option<PathBuf>,

    /// Driver roster file (JSON object keyed by driver name)
    #[arg(long, global = true, env = "TIMING_ROSTER")]
    pub roster: Option<PathBuf>,

    /// Extra track definitions merged over the built-in catalogue (JSON array)
    #[arg(long, global = true)]
    pub tracks: Option<PathBuf>,

    /// Write the effective ingest configuration to this file
    #[arg(long, global = true)]
    pub save_config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Rank one session and print its sector, team and speed-trap analysis
    Analyze(AnalyzeArgs),
    /// Compare one session against a reference profile
    Compare(CompareArgs),
    /// Best-lap evolution of one driver across the sessions of a manifest
    Evolution(EvolutionArgs),
    /// Championship standings over the race sessions of a manifest
    Championship(ManifestArgs),
    /// Stage-versus-stage comparison of one session type
    Stages(StagesArgs),
    /// Ingest every export under a directory, one stage per file
    Ingest(IngestDirArgs),
    /// One driver's results across every session of a manifest
    History(HistoryArgs),
}

/// Identifies a single export file and where it belongs.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Export file (CSV)
    pub file: PathBuf,

    #[arg(long)]
    pub season: String,

    /// Stage label, e.g. "#3 Interlagos"
    #[arg(long)]
    pub stage: String,

    /// Session type label ("Q2", "Prova1 Sprint") or identifier ("sprint_race")
    #[arg(long)]
    pub session: SessionType,

    /// Track name; defaults to the stage label
    #[arg(long)]
    pub track: Option<String>,

    #[arg(long)]
    pub round: Option<u32>,

    #[arg(long)]
    pub notes: Option<String>,
}

impl SessionArgs {
    pub fn request(&self) -> IngestRequest {
        IngestRequest {
            key: SessionKey::new(&self.season, &self.stage, self.session),
            track: self.track.clone().unwrap_or_else(|| self.stage.clone()),
            round: self.round,
            notes: self.notes.clone(),
        }
    }
}

/// Inclusion filters; each flag may be repeated.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(long = "team")]
    pub teams: Vec<String>,

    #[arg(long = "manufacturer")]
    pub manufacturers: Vec<String>,

    #[arg(long = "driver")]
    pub drivers: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Print a detailed report for this driver
    #[arg(long)]
    pub report: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Reference profile file (JSON)
    #[arg(long, conflicts_with = "reference_driver", required_unless_present = "reference_driver")]
    pub reference: Option<PathBuf>,

    /// Build the reference from this driver's bests in the same session
    #[arg(long)]
    pub reference_driver: Option<String>,

    /// Write the reference profile used for the comparison to this file
    #[arg(long)]
    pub save_reference: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ManifestArgs {
    /// Manifest file listing the exports to load (JSON array)
    pub manifest: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct EvolutionArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[arg(long)]
    pub driver: String,

    #[arg(long)]
    pub session: SessionType,

    /// chronological | insertion | key-lexicographic
    #[arg(long, default_value = "chronological")]
    pub order: EvolutionOrder,
}

#[derive(Args, Debug, Clone)]
pub struct StagesArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[arg(long)]
    pub season: String,

    #[arg(long)]
    pub session: SessionType,

    /// Earlier stage label
    #[arg(long)]
    pub from: String,

    /// Later stage label
    #[arg(long)]
    pub to: String,
}

#[derive(Args, Debug, Clone)]
pub struct IngestDirArgs {
    /// Directory searched recursively for `.csv` exports
    pub dir: PathBuf,

    #[arg(long)]
    pub season: String,

    /// Session type shared by every export in the directory
    #[arg(long)]
    pub session: SessionType,

    /// Track name for every export; defaults to each file's stage label
    #[arg(long)]
    pub track: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[arg(long)]
    pub driver: String,
}

// ── Header pattern ─────────────────────────────────────────────────────────────

/// Which rows of the identification column open a driver block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPattern {
    /// `<digits> - <text> - <text>`
    #[default]
    Lenient,
    /// As lenient, but the category must end in a four-digit year.
    Strict,
    /// Caller-supplied regular expression.
    Custom(String),
}

const LENIENT_HEADER: &str = r"^\d+ - .+ - .+$";
const STRICT_HEADER: &str = r"^\d+ - .+ - .+ \d{4}$";

impl HeaderPattern {
    pub fn as_str(&self) -> &str {
        match self {
            HeaderPattern::Lenient => LENIENT_HEADER,
            HeaderPattern::Strict => STRICT_HEADER,
            HeaderPattern::Custom(pattern) => pattern,
        }
    }

    /// Compile the pattern. Only a custom pattern can fail.
    pub fn compile(&self) -> std::result::Result<Regex, FormatError> {
        Ok(Regex::new(self.as_str())?)
    }
}

// ── Column aliases ─────────────────────────────────────────────────────────────

/// Accepted column names per field across export format generations.
///
/// Sector templates use `{n}` for the 1-based sector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub lap_number: Vec<String>,
    pub time_of_day: Vec<String>,
    pub lap_time: Vec<String>,
    pub sector: Vec<String>,
    pub speed: Vec<String>,
    pub speed_trap: Vec<String>,
    pub hits: Vec<String>,
    pub strength: Vec<String>,
    pub noise: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }
        Self {
            lap_number: names(&["Lap"]),
            time_of_day: names(&["Time of Day"]),
            lap_time: names(&["Lap Tm", "Lap Time"]),
            sector: names(&["S{n} Tm", "Sector {n}"]),
            speed: names(&["Speed"]),
            speed_trap: names(&["SPT", "Speed Trap"]),
            hits: names(&["Hits"]),
            strength: names(&["Strength"]),
            noise: names(&["Noise"]),
        }
    }
}

impl ColumnAliases {
    /// Candidate column names for sector `n` (1-based).
    pub fn sector_names(&self, n: usize) -> Vec<String> {
        self.sector
            .iter()
            .map(|template| template.replace("{n}", &n.to_string()))
            .collect()
    }
}

// ── IngestConfig ───────────────────────────────────────────────────────────────

/// Parser configuration, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub header_pattern: HeaderPattern,
    /// Column scanned for driver headers; `None` means the first column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_column: Option<String>,
    pub no_time_sentinel: String,
    pub column_aliases: ColumnAliases,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            header_pattern: HeaderPattern::default(),
            id_column: None,
            no_time_sentinel: DEFAULT_NO_TIME_SENTINEL.to_string(),
            column_aliases: ColumnAliases::default(),
        }
    }
}

impl IngestConfig {
    /// Load a config file. Fields missing from the file take their defaults;
    /// an unreadable file or an invalid header pattern is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| TimingError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.header_pattern.compile().map_err(TimingError::from)?;
        debug!("Loaded ingest config from {}", path.display());
        Ok(config)
    }

    /// Atomically write the config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }
}

// ── Manifest ───────────────────────────────────────────────────────────────────

/// One export listed in a multi-session manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: PathBuf,
    pub season: String,
    pub stage: String,
    pub session: SessionType,
    pub track: String,
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ManifestEntry {
    pub fn request(&self) -> IngestRequest {
        IngestRequest {
            key: SessionKey::new(&self.season, &self.stage, self.session),
            track: self.track.clone(),
            round: self.round,
            notes: self.notes.clone(),
        }
    }
}

/// Read a manifest; relative file paths are resolved against its directory.
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let content = std::fs::read_to_string(path).map_err(|source| TimingError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut entries: Vec<ManifestEntry> = serde_json::from_str(&content)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for entry in &mut entries {
        if entry.file.is_relative() {
            entry.file = base.join(&entry.file);
        }
    }
    Ok(entries)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── Settings ──────────────────────────────────────────────────────────────

    #[test]
    fn test_settings_analyze_defaults() {
        let settings = Settings::parse_from([
            "timing-analytics",
            "analyze",
            "q2.csv",
            "--season",
            "2024",
            "--stage",
            "Interlagos",
            "--session",
            "Q2",
        ]);

        assert_eq!(settings.log_level, "INFO");
        assert_eq!(settings.format, OutputFormat::Table);
        assert!(settings.roster.is_none());
        let Command::Analyze(args) = settings.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.session.session, SessionType::Q2);
        assert!(args.filter.teams.is_empty());

        let request = args.session.request();
        assert_eq!(request.track, "Interlagos");
        assert_eq!(request.key.to_string(), "2024_Interlagos_Q2");
    }

    #[test]
    fn test_settings_global_flags_after_subcommand() {
        let settings = Settings::parse_from([
            "timing-analytics",
            "championship",
            "season.json",
            "--format",
            "json",
            "--log-level",
            "DEBUG",
        ]);
        assert_eq!(settings.format, OutputFormat::Json);
        assert_eq!(settings.log_level, "DEBUG");
        assert!(matches!(settings.command, Command::Championship(_)));
    }

    #[test]
    fn test_settings_repeated_filters() {
        let settings = Settings::parse_from([
            "timing-analytics",
            "compare",
            "q2.csv",
            "--season",
            "2024",
            "--stage",
            "Goiânia",
            "--session",
            "sprint_race",
            "--reference-driver",
            "A",
            "--team",
            "X",
            "--team",
            "Y",
        ]);
        let Command::Compare(args) = settings.command else {
            panic!("expected compare");
        };
        assert_eq!(args.filter.teams, vec!["X", "Y"]);
        assert_eq!(args.session.session, SessionType::SprintRace);
        assert_eq!(args.reference_driver.as_deref(), Some("A"));
    }

    #[test]
    fn test_settings_compare_requires_reference() {
        let result = Settings::try_parse_from([
            "timing-analytics",
            "compare",
            "q2.csv",
            "--season",
            "2024",
            "--stage",
            "S",
            "--session",
            "Q2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_rejects_unknown_session() {
        let result = Settings::try_parse_from([
            "timing-analytics",
            "analyze",
            "q2.csv",
            "--season",
            "2024",
            "--stage",
            "S",
            "--session",
            "Q9",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_evolution_order() {
        let settings = Settings::parse_from([
            "timing-analytics",
            "evolution",
            "m.json",
            "--driver",
            "A",
            "--session",
            "Q2",
            "--order",
            "key-lexicographic",
        ]);
        let Command::Evolution(args) = settings.command else {
            panic!("expected evolution");
        };
        assert_eq!(args.order, EvolutionOrder::KeyLexicographic);
    }

    #[test]
    fn test_settings_ingest_dir_and_save_config() {
        let settings = Settings::parse_from([
            "timing-analytics",
            "ingest",
            "exports/2024",
            "--season",
            "2024",
            "--session",
            "Q2",
            "--save-config",
            "effective.json",
        ]);
        assert_eq!(settings.save_config, Some(PathBuf::from("effective.json")));
        let Command::Ingest(args) = settings.command else {
            panic!("expected ingest");
        };
        assert_eq!(args.dir, PathBuf::from("exports/2024"));
        assert_eq!(args.session, SessionType::Q2);
        assert!(args.track.is_none());
    }

    #[test]
    fn test_settings_history() {
        let settings =
            Settings::parse_from(["timing-analytics", "history", "m.json", "--driver", "A"]);
        let Command::History(args) = settings.command else {
            panic!("expected history");
        };
        assert_eq!(args.driver, "A");
        assert_eq!(args.manifest.manifest, PathBuf::from("m.json"));
    }

    // ── HeaderPattern ─────────────────────────────────────────────────────────

    #[test]
    fn test_lenient_pattern() {
        let re = HeaderPattern::Lenient.compile().unwrap();
        assert!(re.is_match("12 - Jane Doe - Stock Car PRO 2024"));
        assert!(re.is_match("7 - John Roe - Rookie"));
        assert!(!re.is_match("1:30.500"));
        assert!(!re.is_match("A - Jane - Cat"));
    }

    #[test]
    fn test_strict_pattern_requires_year() {
        let re = HeaderPattern::Strict.compile().unwrap();
        assert!(re.is_match("12 - Jane Doe - Stock Car PRO 2024"));
        assert!(!re.is_match("7 - John Roe - Rookie"));
    }

    #[test]
    fn test_custom_pattern_invalid() {
        let err = HeaderPattern::Custom("(".to_string()).compile().unwrap_err();
        assert!(matches!(err, FormatError::InvalidPattern(_)));
    }

    // ── ColumnAliases ─────────────────────────────────────────────────────────

    #[test]
    fn test_sector_names() {
        let aliases = ColumnAliases::default();
        assert_eq!(aliases.sector_names(2), vec!["S2 Tm", "Sector 2"]);
    }

    // ── IngestConfig ──────────────────────────────────────────────────────────

    #[test]
    fn test_ingest_config_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("conf").join("ingest.json");
        let config = IngestConfig {
            header_pattern: HeaderPattern::Strict,
            id_column: Some("Time of Day".to_string()),
            no_time_sentinel: "sem tempo".to_string(),
            column_aliases: ColumnAliases::default(),
        };

        config.save_to(&path).expect("save");
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(IngestConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_ingest_config_partial_file_uses_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("ingest.json");
        std::fs::write(&path, r#"{"header_pattern": {"custom": "^\\d+ / .+$"}}"#).unwrap();

        let config = IngestConfig::load_from(&path).unwrap();
        assert_eq!(config.header_pattern, HeaderPattern::Custom(r"^\d+ / .+$".to_string()));
        assert_eq!(config.no_time_sentinel, DEFAULT_NO_TIME_SENTINEL);
        assert_eq!(config.column_aliases, ColumnAliases::default());
    }

    #[test]
    fn test_ingest_config_missing_file_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = IngestConfig::load_from(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, TimingError::FileRead { .. }));
    }

    #[test]
    fn test_ingest_config_load_rejects_bad_pattern() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("ingest.json");
        std::fs::write(&path, r#"{"header_pattern": {"custom": "("}}"#).unwrap();
        let err = IngestConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, TimingError::Format(FormatError::InvalidPattern(_))));
    }

    // ── Manifest ──────────────────────────────────────────────────────────────

    #[test]
    fn test_load_manifest_resolves_relative_paths() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("season.json");
        std::fs::write(
            &path,
            r#"[{"file": "r1_q2.csv", "season": "2024", "stage": "Goiânia", "session": "q2", "track": "Goiânia", "round": 1},
                {"file": "/abs/r2.csv", "season": "2024", "stage": "Velocitta", "session": "sprint_race", "track": "Velocitta"}]"#,
        )
        .unwrap();

        let entries = load_manifest(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file, tmp.path().join("r1_q2.csv"));
        assert_eq!(entries[1].file, PathBuf::from("/abs/r2.csv"));
        assert_eq!(entries[0].request().round, Some(1));
        assert_eq!(entries[1].request().key.session_type, SessionType::SprintRace);
    }
}

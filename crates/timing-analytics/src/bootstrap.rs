use anyhow::Context;
use std::path::Path;
use timing_core::catalog::TrackCatalog;
use timing_core::models::Roster;
use timing_core::settings::{IngestConfig, Settings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` value to an [`EnvFilter`] directive.
///
/// `CRITICAL` has no tracing counterpart and maps to `error`. Unknown values
/// fall back to `info`.
pub fn filter_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber. Output goes to stderr so that
/// JSON on stdout stays machine-readable.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}

// ── Inputs ─────────────────────────────────────────────────────────────────────

/// Everything an analysis session needs before the first export is read.
pub struct Inputs {
    pub config: IngestConfig,
    pub roster: Roster,
    pub tracks: TrackCatalog,
}

/// Load the ingest configuration, roster and track catalogue named on the
/// command line. Missing flags yield defaults; unreadable files are errors.
pub fn load_inputs(settings: &Settings) -> anyhow::Result<Inputs> {
    let config = match &settings.config {
        Some(path) => IngestConfig::load_from(path)
            .with_context(|| format!("loading ingest config {}", path.display()))?,
        None => IngestConfig::default(),
    };

    let roster = match &settings.roster {
        Some(path) => Roster::load_from(path)
            .with_context(|| format!("loading roster {}", path.display()))?,
        None => Roster::new(),
    };

    let tracks = match &settings.tracks {
        Some(path) => TrackCatalog::official_with_overrides(path)
            .with_context(|| format!("loading tracks {}", path.display()))?,
        None => TrackCatalog::official(),
    };

    if let Some(path) = &settings.save_config {
        save_config(&config, path)?;
    }

    Ok(Inputs {
        config,
        roster,
        tracks,
    })
}

/// Persist the effective ingest configuration so a later run can reuse it
/// through `--config`.
pub fn save_config(config: &IngestConfig, path: &Path) -> anyhow::Result<()> {
    config
        .save_to(path)
        .with_context(|| format!("saving ingest config {}", path.display()))?;
    tracing::info!("Ingest config saved to {}", path.display());
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::TempDir;

    fn settings(extra: &[&str]) -> Settings {
        let mut args = vec!["timing-analytics"];
        args.extend_from_slice(extra);
        args.extend_from_slice(&[
            "championship",
            "manifest.json",
        ]);
        Settings::parse_from(args)
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("info"), "info");
        assert_eq!(filter_directive("WARNING"), "warn");
        assert_eq!(filter_directive("CRITICAL"), "error");
        assert_eq!(filter_directive("bogus"), "info");
    }

    #[test]
    fn test_load_inputs_defaults() {
        let inputs = load_inputs(&settings(&[])).unwrap();
        assert!(inputs.roster.is_empty());
        assert_eq!(inputs.config, IngestConfig::default());
        assert_eq!(inputs.tracks.len(), TrackCatalog::official().len());
    }

    #[test]
    fn test_load_inputs_reads_roster() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("roster.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"Ana Lima": {{"team": "Blue", "manufacturer": "Toyota", "car_number": "7"}}}}"#
        )
        .unwrap();

        let inputs = load_inputs(&settings(&["--roster", path.to_str().unwrap()])).unwrap();
        assert_eq!(inputs.roster.team_of("Ana Lima"), "Blue");
    }

    #[test]
    fn test_load_inputs_rejects_missing_roster() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.json");
        let result = load_inputs(&settings(&["--roster", path.to_str().unwrap()]));
        assert!(result.is_err());
    }

    #[test]
    fn test_save_config_round_trips_through_config_flag() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("ingest.json");
        std::fs::write(&source, r#"{"no_time_sentinel": "Sem Tempo"}"#).unwrap();
        let saved = tmp.path().join("out").join("effective.json");

        let inputs = load_inputs(&settings(&[
            "--config",
            source.to_str().unwrap(),
            "--save-config",
            saved.to_str().unwrap(),
        ]))
        .unwrap();
        assert!(saved.exists());

        let reloaded = load_inputs(&settings(&["--config", saved.to_str().unwrap()])).unwrap();
        assert_eq!(reloaded.config, inputs.config);
        assert_eq!(reloaded.config.no_time_sentinel, "Sem Tempo");
    }

    #[test]
    fn test_load_inputs_rejects_missing_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.json");
        let result = load_inputs(&settings(&["--config", path.to_str().unwrap()]));
        assert!(result.is_err());
    }
}

mod bootstrap;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use timing_core::models::{ReferenceProfile, SessionKey};
use timing_core::settings::{
    load_manifest, AnalyzeArgs, Command, CompareArgs, EvolutionArgs, FilterArgs, IngestDirArgs,
    OutputFormat, Settings, StagesArgs,
};
use timing_data::aggregator::RecordFilter;
use timing_runtime::session::AnalysisSession;

fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(&settings.log_level)?;
    tracing::info!("timing-analytics v{} starting", env!("CARGO_PKG_VERSION"));

    let inputs = bootstrap::load_inputs(&settings)?;
    let mut session = AnalysisSession::start(inputs.config, inputs.roster, inputs.tracks);

    let result = run(&settings, &mut session);
    session.teardown();
    result
}

fn run(settings: &Settings, session: &mut AnalysisSession) -> Result<()> {
    let format = settings.format;
    match &settings.command {
        Command::Analyze(args) => analyze(session, args, format),
        Command::Compare(args) => compare(session, args, format),
        Command::Evolution(args) => {
            load_all(session, &args.manifest.manifest)?;
            evolution(session, args, format)
        }
        Command::Championship(args) => {
            load_all(session, &args.manifest)?;
            let rows = session.championship();
            emit(format, &rows, || render::championship(&rows))
        }
        Command::Stages(args) => {
            load_all(session, &args.manifest.manifest)?;
            stages(session, args, format)
        }
        Command::Ingest(args) => ingest(session, args, format),
        Command::History(args) => {
            load_all(session, &args.manifest.manifest)?;
            let history = session.driver_history(&args.driver)?;
            emit(format, &history, || render::driver_history(&history))
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────────

fn record_filter(args: &FilterArgs) -> RecordFilter {
    let mut filter = RecordFilter::all();
    if !args.teams.is_empty() {
        filter = filter.with_teams(&args.teams);
    }
    if !args.manufacturers.is_empty() {
        filter = filter.with_manufacturers(&args.manufacturers);
    }
    if !args.drivers.is_empty() {
        filter = filter.with_drivers(&args.drivers);
    }
    filter
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => print!("{}", text()),
    }
    Ok(())
}

/// Ingest every export listed in a manifest.
fn load_all(session: &mut AnalysisSession, manifest: &Path) -> Result<()> {
    let entries = load_manifest(manifest)
        .with_context(|| format!("loading manifest {}", manifest.display()))?;
    tracing::info!("Loading {} exports from {}", entries.len(), manifest.display());

    for entry in entries {
        session
            .ingest_file(&entry.file, entry.request())
            .with_context(|| format!("ingesting {}", entry.file.display()))?;
    }
    Ok(())
}

// ── Commands ───────────────────────────────────────────────────────────────────

fn analyze(session: &mut AnalysisSession, args: &AnalyzeArgs, format: OutputFormat) -> Result<()> {
    let request = args.session.request();
    let key = request.key.clone();
    session
        .ingest_file(&args.session.file, request)
        .with_context(|| format!("ingesting {}", args.session.file.display()))?;

    let analysis = session.analyze(&key, &record_filter(&args.filter), args.report.as_deref())?;
    emit(format, &analysis, || render::session_analysis(&analysis))
}

fn compare(session: &mut AnalysisSession, args: &CompareArgs, format: OutputFormat) -> Result<()> {
    let request = args.session.request();
    let key = request.key.clone();
    session
        .ingest_file(&args.session.file, request)
        .with_context(|| format!("ingesting {}", args.session.file.display()))?;

    let name = match (&args.reference, &args.reference_driver) {
        (Some(path), _) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading reference {}", path.display()))?;
            let profile: ReferenceProfile = serde_json::from_str(&content)
                .with_context(|| format!("parsing reference {}", path.display()))?;
            let name = profile.name.clone();
            session.add_reference(profile);
            name
        }
        (None, Some(driver)) => {
            let name = format!("{driver} best");
            session.reference_from_session(&name, &key, driver)?;
            name
        }
        (None, None) => anyhow::bail!("either --reference or --reference-driver is required"),
    };

    if let Some(path) = &args.save_reference {
        let profile = session.store().get_reference(&name)?;
        std::fs::write(path, serde_json::to_string_pretty(profile)?)
            .with_context(|| format!("writing reference {}", path.display()))?;
        tracing::info!("Reference '{}' saved to {}", name, path.display());
    }

    let table = session.compare(&key, &name, &record_filter(&args.filter))?;
    emit(format, &table, || render::comparison(&table))
}

fn ingest(session: &mut AnalysisSession, args: &IngestDirArgs, format: OutputFormat) -> Result<()> {
    let ingested =
        session.ingest_directory(&args.dir, &args.season, args.session, args.track.as_deref());
    if ingested.is_empty() {
        anyhow::bail!("no readable exports under {}", args.dir.display());
    }
    emit(format, &ingested, || render::ingest_summary(&ingested))
}

fn evolution(session: &AnalysisSession, args: &EvolutionArgs, format: OutputFormat) -> Result<()> {
    let series = session.evolution(&args.driver, args.session, args.order);
    if series.is_empty() {
        tracing::warn!("{} has no timed laps in any {} session", args.driver, args.session.label());
    }
    emit(format, &series, || render::evolution(&series))
}

fn stages(session: &AnalysisSession, args: &StagesArgs, format: OutputFormat) -> Result<()> {
    let from = SessionKey::new(&args.season, &args.from, args.session);
    let to = SessionKey::new(&args.season, &args.to, args.session);
    let comparison = session.compare_stages(&from, &to)?;
    emit(format, &comparison, || render::stages(&comparison))
}

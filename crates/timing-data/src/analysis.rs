//! Ingest pipeline: raw export → parsed blocks → normalised session.
//!
//! Nothing here touches a store. The pipeline either returns a complete
//! [`TimingSession`] or an error, so callers can insert all-or-nothing.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use timing_core::catalog::TrackCatalog;
use timing_core::error::Result;
use timing_core::models::{IngestRequest, Roster, TimingSession};
use timing_core::settings::IngestConfig;
use tracing::{info, warn};

use crate::parser::{BlockParser, ColumnMap};
use crate::reader::{read_table, RawTable};

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside an ingested session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestMetadata {
    /// RFC 3339 timestamp of the ingest.
    pub generated_at: String,
    pub rows_read: usize,
    pub blocks_found: usize,
    pub records: usize,
    /// Records whose lap time was absent or unreadable.
    pub records_without_time: usize,
    pub drivers: usize,
    pub sector_count: usize,
    /// Wall-clock seconds spent reading the file (zero for in-memory tables).
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent segmenting and normalising.
    pub transform_time_seconds: f64,
}

/// The complete output of an ingest.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub session: TimingSession,
    pub metadata: IngestMetadata,
}

/// Everything an ingest needs besides the table itself.
#[derive(Debug, Clone, Copy)]
pub struct IngestContext<'a> {
    pub config: &'a IngestConfig,
    pub roster: &'a Roster,
    pub tracks: &'a TrackCatalog,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Read `path` and ingest it.
pub fn ingest_file(
    path: &Path,
    request: IngestRequest,
    ctx: IngestContext<'_>,
) -> Result<IngestOutcome> {
    let load_start = Instant::now();
    let table = read_table(path)?;
    let load_time = load_start.elapsed().as_secs_f64();

    let mut outcome = ingest_table(&table, request, ctx)?;
    outcome.metadata.load_time_seconds = load_time;
    Ok(outcome)
}

/// Run the full pipeline over an in-memory table.
///
/// 1. Build the parser from the ingest config.
/// 2. Segment the table into driver blocks.
/// 3. Resolve the column layout (and so the session schema) once.
/// 4. Normalise every block row into a lap record.
/// 5. Resolve the track against the catalogue and assemble the session.
pub fn ingest_table(
    table: &RawTable,
    request: IngestRequest,
    ctx: IngestContext<'_>,
) -> Result<IngestOutcome> {
    let transform_start = Instant::now();

    // ── Step 1-2: Segment ─────────────────────────────────────────────────────
    let parser = BlockParser::new(ctx.config)?;
    let blocks = parser.parse(table)?;

    // ── Step 3: Schema ────────────────────────────────────────────────────────
    let columns = ColumnMap::resolve(table, parser.aliases());
    let schema = columns.schema();
    if columns.lap_time.is_none() {
        warn!("No lap time column found; every lap will be recorded without a time");
    }

    // ── Step 4: Normalise ─────────────────────────────────────────────────────
    let records = parser.normalize(&blocks, &columns, ctx.roster);

    // ── Step 5: Assemble ──────────────────────────────────────────────────────
    let track = ctx.tracks.resolve(&request.track, schema.sector_count);
    let session = TimingSession::new(request.into_meta(track), schema, records);
    let transform_time = transform_start.elapsed().as_secs_f64();

    let metadata = IngestMetadata {
        generated_at: Utc::now().to_rfc3339(),
        rows_read: table.len(),
        blocks_found: blocks.len(),
        records: session.records.len(),
        records_without_time: session.records.iter().filter(|r| r.lap_time.is_none()).count(),
        drivers: session.drivers().len(),
        sector_count: schema.sector_count,
        load_time_seconds: 0.0,
        transform_time_seconds: transform_time,
    };

    info!(
        "Ingested {}: {} drivers, {} laps ({} without time), {} sectors",
        session.key,
        metadata.drivers,
        metadata.records,
        metadata.records_without_time,
        metadata.sector_count
    );

    Ok(IngestOutcome { session, metadata })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

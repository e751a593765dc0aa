//! Analysis session: the explicit lifecycle around one [`SessionStore`].
//!
//! `start` builds an empty store with the ingest configuration, roster and
//! track catalogue; every ingest and query goes through the session;
//! `teardown` clears everything. Nothing is persisted between sessions.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use timing_core::catalog::{SessionType, TrackCatalog};
use timing_core::error::Result;
use timing_core::models::{
    EvolutionOrder, IngestRequest, LapRecord, ReferenceProfile, Roster, SessionKey, Seconds,
};
use timing_core::settings::IngestConfig;
use timing_data::aggregator::{
    Aggregator, ChampionshipRow, ConsistencyRow, DriverHistory, DriverReport, GroupRow,
    ManufacturerSpeedRow, RankingTable, RecordFilter, SectorKing, SectorRow, SessionOverview,
    SpeedReading, SpeedTrapRow,
};
use timing_data::analysis::{self, IngestContext, IngestMetadata, IngestOutcome};
use timing_data::reader::{find_csv_files, RawTable};
use timing_data::reference::{
    compare_sessions, compare_to_reference, evolution, ComparisonTable, EvolutionSeries,
    StageComparison,
};
use tracing::{info, warn};

use crate::store::SessionStore;

/// How many individual speed-trap readings a session analysis lists.
pub const TOP_SPEED_READINGS: usize = 10;

/// Every per-session table computed in one pass over a stored session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionAnalysis {
    pub overview: SessionOverview,
    pub ranking: RankingTable,
    pub sectors: Vec<SectorRow>,
    pub sector_kings: Vec<SectorKing>,
    pub teams: Vec<GroupRow>,
    pub manufacturers: Vec<GroupRow>,
    pub consistency: Vec<ConsistencyRow>,
    /// `None` when the session has no speed-trap column.
    pub speed_trap: Option<Vec<SpeedTrapRow>>,
    pub speed_trap_by_manufacturer: Vec<ManufacturerSpeedRow>,
    pub top_speed_readings: Vec<SpeedReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_report: Option<DriverReport>,
}

pub struct AnalysisSession {
    config: IngestConfig,
    roster: Roster,
    tracks: TrackCatalog,
    store: SessionStore,
    started_at: DateTime<Utc>,
}

impl AnalysisSession {
    pub fn start(config: IngestConfig, roster: Roster, tracks: TrackCatalog) -> Self {
        info!(
            "Analysis session started ({} roster entries, {} tracks)",
            roster.len(),
            tracks.len()
        );
        Self {
            config,
            roster,
            tracks,
            store: SessionStore::new(),
            started_at: Utc::now(),
        }
    }

    /// Clear every stored session and reference.
    pub fn teardown(&mut self) {
        info!(
            "Analysis session ended after {}s",
            (Utc::now() - self.started_at).num_seconds()
        );
        self.store.clear_all();
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SessionStore {
        &mut self.store
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn context(&self) -> IngestContext<'_> {
        IngestContext {
            config: &self.config,
            roster: &self.roster,
            tracks: &self.tracks,
        }
    }

    // ── Ingest ────────────────────────────────────────────────────────────

    /// Parse `path` and store the result, replacing any session with the
    /// same key. The store is untouched when parsing fails.
    pub fn ingest_file(&mut self, path: &Path, request: IngestRequest) -> Result<IngestMetadata> {
        let outcome = analysis::ingest_file(path, request, self.context())?;
        Ok(self.commit(outcome))
    }

    pub fn ingest_table(
        &mut self,
        table: &RawTable,
        request: IngestRequest,
    ) -> Result<IngestMetadata> {
        let outcome = analysis::ingest_table(table, request, self.context())?;
        Ok(self.commit(outcome))
    }

    /// Ingest every `.csv` export under `dir` as one stage of `season`.
    ///
    /// The stage label is the file stem and the track defaults to it. Files
    /// are taken in path order; a file that fails to parse is logged and
    /// skipped without touching the store.
    pub fn ingest_directory(
        &mut self,
        dir: &Path,
        season: &str,
        session_type: SessionType,
        track: Option<&str>,
    ) -> Vec<(SessionKey, IngestMetadata)> {
        let files = find_csv_files(dir);
        info!("Found {} exports under {}", files.len(), dir.display());

        let mut ingested = Vec::with_capacity(files.len());
        for file in files {
            let Some(stage) = file.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let request = IngestRequest {
                key: SessionKey::new(season, stage.as_str(), session_type),
                track: track.map_or_else(|| stage.clone(), str::to_string),
                round: None,
                notes: None,
            };
            let key = request.key.clone();
            match self.ingest_file(&file, request) {
                Ok(metadata) => ingested.push((key, metadata)),
                Err(e) => warn!("Skipping {}: {}", file.display(), e),
            }
        }
        ingested
    }

    fn commit(&mut self, outcome: IngestOutcome) -> IngestMetadata {
        self.store.put(outcome.session);
        outcome.metadata
    }

    /// Record a hand-timed lap, appending to (or creating) the session.
    pub fn add_manual_lap(
        &mut self,
        request: IngestRequest,
        driver: &str,
        lap_time: Option<Seconds>,
        sector_times: Vec<Option<Seconds>>,
    ) -> Result<()> {
        let record = LapRecord::manual(driver, lap_time, sector_times, &self.roster);
        let track = self.tracks.resolve(&request.track, record.sector_times.len());
        self.store.append_record(request.into_meta(track), record)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn ranking(&self, key: &SessionKey, filter: &RecordFilter) -> Result<RankingTable> {
        Ok(Aggregator::best_per_driver(self.store.get(key)?, filter))
    }

    /// Run every per-session analysis on `key`. `report_for` adds a detailed
    /// report for one driver, failing when the driver has no laps.
    pub fn analyze(
        &self,
        key: &SessionKey,
        filter: &RecordFilter,
        report_for: Option<&str>,
    ) -> Result<SessionAnalysis> {
        let session = self.store.get(key)?;
        let driver_report = report_for
            .map(|driver| Aggregator::driver_report(session, driver))
            .transpose()?;

        Ok(SessionAnalysis {
            overview: Aggregator::session_overview(session),
            ranking: Aggregator::best_per_driver(session, filter),
            sectors: Aggregator::sector_analysis(session, filter),
            sector_kings: Aggregator::sector_kings(session, filter),
            teams: Aggregator::team_ranking(session, filter),
            manufacturers: Aggregator::manufacturer_ranking(session, filter),
            consistency: Aggregator::consistency_ranking(session, filter),
            speed_trap: Aggregator::speed_trap_analysis(session),
            speed_trap_by_manufacturer: Aggregator::speed_trap_by_manufacturer(session, filter),
            top_speed_readings: Aggregator::top_speed_trap_readings(
                session,
                filter,
                TOP_SPEED_READINGS,
            ),
            driver_report,
        })
    }

    /// Store a reference profile loaded from elsewhere (a file, a form).
    pub fn add_reference(&mut self, profile: ReferenceProfile) {
        self.store.put_reference(profile);
    }

    /// Store a reference built from `driver`'s bests in the session `key`.
    pub fn reference_from_session(
        &mut self,
        name: &str,
        key: &SessionKey,
        driver: &str,
    ) -> Result<&ReferenceProfile> {
        let profile = ReferenceProfile::from_session(name, self.store.get(key)?, driver)?;
        self.store.put_reference(profile);
        self.store.get_reference(name)
    }

    pub fn compare(
        &self,
        key: &SessionKey,
        reference: &str,
        filter: &RecordFilter,
    ) -> Result<ComparisonTable> {
        let session = self.store.get(key)?;
        let reference = self.store.get_reference(reference)?;
        Ok(compare_to_reference(session, reference, filter))
    }

    pub fn evolution(
        &self,
        driver: &str,
        session_type: SessionType,
        order: EvolutionOrder,
    ) -> EvolutionSeries {
        evolution(&self.store, driver, session_type, order)
    }

    pub fn compare_stages(&self, from: &SessionKey, to: &SessionKey) -> Result<StageComparison> {
        Ok(compare_sessions(self.store.get(from)?, self.store.get(to)?))
    }

    pub fn championship(&self) -> Vec<ChampionshipRow> {
        Aggregator::championship_standings(&self.store)
    }

    /// `driver`'s results across every stored session, in insertion order.
    pub fn driver_history(&self, driver: &str) -> Result<DriverHistory> {
        Aggregator::driver_history(&self.store, driver)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

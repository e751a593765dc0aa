//! Rankings, sector breakdowns and per-driver summaries over a session.
//!
//! Every function is a pure read of a [`TimingSession`]: absent times are
//! skipped, and grouping always preserves the order in which drivers first
//! appear in the export so ties resolve deterministically.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use timing_core::catalog::points_for_position;
use timing_core::error::{Result, TimingError};
use timing_core::formatting::format_gap;
use timing_core::models::{LapRecord, SessionKey, SessionSource, Seconds, TimingSession};
use timing_core::stats::{self, TimeStats};

// ── RecordFilter ──────────────────────────────────────────────────────────────

/// Optional inclusion sets. `None` means unrestricted; all set filters must
/// match for a record to be kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub teams: Option<HashSet<String>>,
    pub manufacturers: Option<HashSet<String>>,
    pub drivers: Option<HashSet<String>>,
}

impl RecordFilter {
    /// The unrestricted filter.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_teams<I, S>(mut self, teams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.teams = Some(teams.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_manufacturers<I, S>(mut self, manufacturers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manufacturers = Some(manufacturers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_drivers<I, S>(mut self, drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drivers = Some(drivers.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, record: &LapRecord) -> bool {
        fn allowed(set: &Option<HashSet<String>>, value: &str) -> bool {
            set.as_ref().map_or(true, |s| s.contains(value))
        }
        allowed(&self.teams, &record.team)
            && allowed(&self.manufacturers, &record.manufacturer)
            && allowed(&self.drivers, &record.driver_id)
    }

    /// The matching rows of `records`, in their original order.
    pub fn apply<'a>(&self, records: &'a [LapRecord]) -> Vec<&'a LapRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

// ── Grouping helpers ──────────────────────────────────────────────────────────

/// One driver's laps, in file order.
#[derive(Debug, Clone)]
pub(crate) struct DriverLaps<'a> {
    pub driver: &'a str,
    pub laps: Vec<&'a LapRecord>,
}

impl<'a> DriverLaps<'a> {
    pub fn first(&self) -> &'a LapRecord {
        self.laps[0]
    }

    pub fn lap_times(&self) -> Vec<Seconds> {
        self.laps.iter().filter_map(|r| r.lap_time).collect()
    }

    pub fn best_lap(&self) -> Option<Seconds> {
        stats::min(&self.lap_times())
    }

    pub fn sector_times(&self, index: usize) -> Vec<Seconds> {
        self.laps.iter().filter_map(|r| r.sector(index)).collect()
    }
}

/// Group records by driver in first-encounter order.
pub(crate) fn group_by_driver<'a, I>(records: I) -> Vec<DriverLaps<'a>>
where
    I: IntoIterator<Item = &'a LapRecord>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<DriverLaps<'a>> = Vec::new();
    for record in records {
        match index.get(record.driver_id.as_str()) {
            Some(&i) => groups[i].laps.push(record),
            None => {
                index.insert(&record.driver_id, groups.len());
                groups.push(DriverLaps {
                    driver: &record.driver_id,
                    laps: vec![record],
                });
            }
        }
    }
    groups
}

/// Ascending order on an optional time with absent values last.
fn cmp_optional(a: Option<Seconds>, b: Option<Seconds>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(x), Some(y)) => stats::total_cmp(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ── Result tables ─────────────────────────────────────────────────────────────

/// One row of the best-lap leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub position: usize,
    pub driver: String,
    pub car_number: String,
    pub team: String,
    pub manufacturer: String,
    pub best_lap: Seconds,
    /// Best lap minus the leader's best lap.
    pub gap: Seconds,
    /// `"Leader"` for position 1, `"+X.XXXs"` otherwise.
    pub gap_display: String,
    pub valid_laps: usize,
    pub top_speed: Option<f64>,
    pub top_speed_trap: Option<f64>,
    /// Championship points, only for sessions that award them.
    pub points: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingTable {
    pub session: SessionKey,
    pub rows: Vec<RankingRow>,
}

impl RankingTable {
    pub fn leader(&self) -> Option<&RankingRow> {
        self.rows.first()
    }

    pub fn position_of(&self, driver: &str) -> Option<usize> {
        self.rows.iter().find(|r| r.driver == driver).map(|r| r.position)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-driver sector breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorRow {
    pub driver: String,
    pub team: String,
    pub manufacturer: String,
    pub best_lap: Option<Seconds>,
    pub lap_count: usize,
    pub sector_best: Vec<Option<Seconds>>,
    pub sector_mean: Vec<Option<Seconds>>,
    pub sector_std: Vec<Option<Seconds>>,
    /// 0-based index of the driver's strongest sector; `None` unless every
    /// sector has a best time.
    pub strong_sector: Option<usize>,
}

/// Fastest lap of a team or manufacturer, with the row that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub position: usize,
    pub group: String,
    pub best_lap: Seconds,
    pub gap: Seconds,
    pub driver: String,
    pub car_number: String,
    /// Team of the fastest driver (manufacturer rankings only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    pub drivers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorSummary {
    pub best: Option<Seconds>,
    pub mean: Option<Seconds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverReport {
    pub driver: String,
    pub car_number: String,
    pub team: String,
    pub manufacturer: String,
    pub total_laps: usize,
    pub valid_laps: usize,
    pub lap_stats: TimeStats,
    pub speed_max: Option<f64>,
    pub speed_mean: Option<f64>,
    pub speed_trap_max: Option<f64>,
    pub sectors: Vec<SectorSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedTrapRow {
    pub driver: String,
    pub team: String,
    pub manufacturer: String,
    pub max: f64,
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub readings: usize,
    pub best_lap: Option<Seconds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyRow {
    pub position: usize,
    pub driver: String,
    pub team: String,
    pub valid_laps: usize,
    pub best_lap: Seconds,
    pub mean_lap: Seconds,
    pub std_dev: Seconds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOverview {
    pub session: SessionKey,
    pub track: String,
    pub drivers: usize,
    pub laps: usize,
    pub lap_stats: TimeStats,
    pub sector_stats: Vec<TimeStats>,
    pub max_speed_trap: Option<f64>,
    pub fastest_driver: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChampionshipRow {
    pub position: usize,
    pub driver: String,
    pub team: String,
    pub manufacturer: String,
    pub points: u32,
    pub wins: u32,
    pub podiums: u32,
    pub events: u32,
    pub average: f64,
}

/// Fastest single time in one sector and the driver who set it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorKing {
    /// 0-based sector index.
    pub sector: usize,
    pub driver: String,
    pub team: String,
    pub manufacturer: String,
    pub time: Seconds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManufacturerSpeedRow {
    pub manufacturer: String,
    pub max: f64,
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub readings: usize,
    pub drivers: usize,
}

/// One speed-trap reading, ranked across the whole session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedReading {
    pub position: usize,
    pub driver: String,
    pub team: String,
    pub manufacturer: String,
    pub lap_number: Option<u32>,
    pub speed_trap: f64,
}

/// One session's line in a driver's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub session: SessionKey,
    pub track: String,
    pub total_laps: usize,
    pub best_lap: Option<Seconds>,
    pub speed_max: Option<f64>,
    pub speed_trap_max: Option<f64>,
    /// Sample std of the timed laps; needs two of them.
    pub consistency: Option<Seconds>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySummary {
    pub stages: usize,
    pub total_laps: usize,
    pub best_lap: Option<Seconds>,
    /// Session of the absolute best lap; the earliest wins ties.
    pub best_session: Option<SessionKey>,
    pub speed_max: Option<f64>,
    pub speed_trap_max: Option<f64>,
}

/// Everything one driver did across the stored sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverHistory {
    pub driver: String,
    pub car_number: String,
    pub team: String,
    pub manufacturer: String,
    pub stages: Vec<StageReport>,
    pub summary: HistorySummary,
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Stateless helper computing the per-session analysis tables.
pub struct Aggregator;

impl Aggregator {
    /// Best-lap leaderboard.
    ///
    /// Drivers without a single present lap time are left out. Ties keep
    /// the order in which drivers appear in the export.
    pub fn best_per_driver(session: &TimingSession, filter: &RecordFilter) -> RankingTable {
        let groups = group_by_driver(filter.apply(&session.records));

        let mut ranked: Vec<(DriverLaps<'_>, Seconds)> = groups
            .into_iter()
            .filter_map(|g| g.best_lap().map(|best| (g, best)))
            .collect();
        ranked.sort_by(|a, b| stats::total_cmp(&a.1, &b.1));

        let leader_best = ranked.first().map(|(_, best)| *best).unwrap_or_default();
        let awards_points = session.key.session_type.awards_points();

        let rows = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (group, best))| {
                let position = i + 1;
                let first = group.first();
                let valid: Vec<&LapRecord> = group
                    .laps
                    .iter()
                    .copied()
                    .filter(|r| r.lap_time.is_some())
                    .collect();
                let gap = best - leader_best;
                RankingRow {
                    position,
                    driver: group.driver.to_string(),
                    car_number: first.car_number.clone(),
                    team: first.team.clone(),
                    manufacturer: first.manufacturer.clone(),
                    best_lap: best,
                    gap,
                    gap_display: format_gap(gap, position),
                    valid_laps: valid.len(),
                    top_speed: stats::max(
                        &valid.iter().filter_map(|r| r.speed).collect::<Vec<_>>(),
                    ),
                    top_speed_trap: stats::max(
                        &valid.iter().filter_map(|r| r.speed_trap).collect::<Vec<_>>(),
                    ),
                    points: awards_points.then(|| points_for_position(position)),
                }
            })
            .collect();

        RankingTable {
            session: session.key.clone(),
            rows,
        }
    }

    /// Per-driver best/mean/std per sector, ordered by best lap (drivers
    /// without one last).
    pub fn sector_analysis(session: &TimingSession, filter: &RecordFilter) -> Vec<SectorRow> {
        let sector_count = session.schema.sector_count;
        let mut rows: Vec<SectorRow> = group_by_driver(filter.apply(&session.records))
            .into_iter()
            .map(|group| {
                let per_sector: Vec<Vec<Seconds>> =
                    (0..sector_count).map(|s| group.sector_times(s)).collect();
                let sector_best: Vec<Option<Seconds>> =
                    per_sector.iter().map(|t| stats::min(t)).collect();
                let first = group.first();
                SectorRow {
                    driver: group.driver.to_string(),
                    team: first.team.clone(),
                    manufacturer: first.manufacturer.clone(),
                    best_lap: group.best_lap(),
                    lap_count: group.laps.len(),
                    sector_mean: per_sector.iter().map(|t| stats::mean(t)).collect(),
                    sector_std: per_sector.iter().map(|t| stats::std_dev(t)).collect(),
                    strong_sector: strongest_sector(&sector_best),
                    sector_best,
                }
            })
            .collect();

        rows.sort_by(|a, b| cmp_optional(a.best_lap, b.best_lap));
        rows
    }

    /// Fastest lap per team, with the driver who set it.
    pub fn team_ranking(session: &TimingSession, filter: &RecordFilter) -> Vec<GroupRow> {
        group_ranking(session, filter, |r| &r.team, false)
    }

    /// Fastest lap per manufacturer, with the driver and team who set it.
    pub fn manufacturer_ranking(session: &TimingSession, filter: &RecordFilter) -> Vec<GroupRow> {
        group_ranking(session, filter, |r| &r.manufacturer, true)
    }

    /// Detailed statistics for one driver.
    pub fn driver_report(session: &TimingSession, driver: &str) -> Result<DriverReport> {
        let laps: Vec<&LapRecord> = session.laps_of(driver).collect();
        let Some(first) = laps.first() else {
            return Err(TimingError::DriverNotFound(driver.to_string()));
        };

        let lap_times: Vec<Seconds> = laps.iter().filter_map(|r| r.lap_time).collect();
        let speeds: Vec<f64> = laps.iter().filter_map(|r| r.speed).collect();
        let traps: Vec<f64> = laps.iter().filter_map(|r| r.speed_trap).collect();
        let sectors = (0..session.schema.sector_count)
            .map(|s| {
                let times: Vec<Seconds> = laps.iter().filter_map(|r| r.sector(s)).collect();
                SectorSummary {
                    best: stats::min(&times),
                    mean: stats::mean(&times),
                }
            })
            .collect();

        Ok(DriverReport {
            driver: driver.to_string(),
            car_number: first.car_number.clone(),
            team: first.team.clone(),
            manufacturer: first.manufacturer.clone(),
            total_laps: laps.len(),
            valid_laps: lap_times.len(),
            lap_stats: TimeStats::from_values(&lap_times),
            speed_max: stats::max(&speeds),
            speed_mean: stats::mean(&speeds),
            speed_trap_max: stats::max(&traps),
            sectors,
        })
    }

    /// Speed-trap readings per driver, fastest peak first.
    ///
    /// `None` when the export carried no speed-trap column at all.
    pub fn speed_trap_analysis(session: &TimingSession) -> Option<Vec<SpeedTrapRow>> {
        if !session.schema.has_speed_trap {
            return None;
        }

        let mut rows: Vec<SpeedTrapRow> = group_by_driver(&session.records)
            .into_iter()
            .filter_map(|group| {
                let readings: Vec<f64> = group.laps.iter().filter_map(|r| r.speed_trap).collect();
                let first = group.first();
                Some(SpeedTrapRow {
                    driver: group.driver.to_string(),
                    team: first.team.clone(),
                    manufacturer: first.manufacturer.clone(),
                    max: stats::max(&readings)?,
                    mean: stats::mean(&readings)?,
                    std_dev: stats::std_dev(&readings),
                    readings: readings.len(),
                    best_lap: group.best_lap(),
                })
            })
            .collect();

        rows.sort_by(|a, b| stats::total_cmp(&b.max, &a.max));
        Some(rows)
    }

    /// Drivers with at least two timed laps, most consistent first.
    pub fn consistency_ranking(
        session: &TimingSession,
        filter: &RecordFilter,
    ) -> Vec<ConsistencyRow> {
        let mut rows: Vec<ConsistencyRow> = group_by_driver(filter.apply(&session.records))
            .into_iter()
            .filter_map(|group| {
                let times = group.lap_times();
                Some(ConsistencyRow {
                    position: 0,
                    driver: group.driver.to_string(),
                    team: group.first().team.clone(),
                    valid_laps: times.len(),
                    best_lap: stats::min(&times)?,
                    mean_lap: stats::mean(&times)?,
                    std_dev: stats::std_dev(&times)?,
                })
            })
            .collect();

        rows.sort_by(|a, b| stats::total_cmp(&a.std_dev, &b.std_dev));
        for (i, row) in rows.iter_mut().enumerate() {
            row.position = i + 1;
        }
        rows
    }

    pub fn session_overview(session: &TimingSession) -> SessionOverview {
        let lap_stats = TimeStats::from_optional(session.records.iter().map(|r| r.lap_time));
        let sector_stats = (0..session.schema.sector_count)
            .map(|s| TimeStats::from_optional(session.records.iter().map(|r| r.sector(s))))
            .collect();
        let traps: Vec<f64> = session.records.iter().filter_map(|r| r.speed_trap).collect();

        SessionOverview {
            session: session.key.clone(),
            track: session.track.name.clone(),
            drivers: session.drivers().len(),
            laps: session.records.len(),
            lap_stats,
            sector_stats,
            max_speed_trap: stats::max(&traps),
            fastest_driver: Self::best_per_driver(session, &RecordFilter::all())
                .leader()
                .map(|r| r.driver.clone()),
        }
    }

    /// Fastest driver per sector. Sectors nobody timed are left out; on
    /// equal times the earlier row wins.
    pub fn sector_kings(session: &TimingSession, filter: &RecordFilter) -> Vec<SectorKing> {
        let records = filter.apply(&session.records);
        (0..session.schema.sector_count)
            .filter_map(|s| {
                let mut best: Option<(&LapRecord, Seconds)> = None;
                for &record in &records {
                    let Some(time) = record.sector(s) else {
                        continue;
                    };
                    if best.map_or(true, |(_, t)| time < t) {
                        best = Some((record, time));
                    }
                }
                let (record, time) = best?;
                Some(SectorKing {
                    sector: s,
                    driver: record.driver_id.clone(),
                    team: record.team.clone(),
                    manufacturer: record.manufacturer.clone(),
                    time,
                })
            })
            .collect()
    }

    /// Speed-trap statistics per manufacturer, fastest peak first.
    pub fn speed_trap_by_manufacturer(
        session: &TimingSession,
        filter: &RecordFilter,
    ) -> Vec<ManufacturerSpeedRow> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, (Vec<f64>, HashSet<&str>)> = HashMap::new();
        for record in filter.apply(&session.records) {
            let Some(reading) = record.speed_trap else {
                continue;
            };
            let (readings, drivers) = groups
                .entry(record.manufacturer.as_str())
                .or_insert_with(|| {
                    order.push(&record.manufacturer);
                    (Vec::new(), HashSet::new())
                });
            readings.push(reading);
            drivers.insert(&record.driver_id);
        }

        let mut rows: Vec<ManufacturerSpeedRow> = order
            .into_iter()
            .filter_map(|manufacturer| {
                let (readings, drivers) = groups.get(manufacturer)?;
                Some(ManufacturerSpeedRow {
                    manufacturer: manufacturer.to_string(),
                    max: stats::max(readings)?,
                    mean: stats::mean(readings)?,
                    std_dev: stats::std_dev(readings),
                    readings: readings.len(),
                    drivers: drivers.len(),
                })
            })
            .collect();

        rows.sort_by(|a, b| stats::total_cmp(&b.max, &a.max));
        rows
    }

    /// The `limit` highest individual speed-trap readings. Equal readings
    /// keep file order.
    pub fn top_speed_trap_readings(
        session: &TimingSession,
        filter: &RecordFilter,
        limit: usize,
    ) -> Vec<SpeedReading> {
        let mut readings: Vec<(&LapRecord, f64)> = filter
            .apply(&session.records)
            .into_iter()
            .filter_map(|r| r.speed_trap.map(|v| (r, v)))
            .collect();
        readings.sort_by(|a, b| stats::total_cmp(&b.1, &a.1));

        readings
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (record, speed_trap))| SpeedReading {
                position: i + 1,
                driver: record.driver_id.clone(),
                team: record.team.clone(),
                manufacturer: record.manufacturer.clone(),
                lap_number: record.lap_number,
                speed_trap,
            })
            .collect()
    }

    /// One driver's per-session results over every session in `source`,
    /// in source order, with an overall summary.
    pub fn driver_history<S>(source: &S, driver: &str) -> Result<DriverHistory>
    where
        S: SessionSource + ?Sized,
    {
        let mut identity: Option<&LapRecord> = None;
        let mut stages = Vec::new();

        for session in source.sessions() {
            let laps: Vec<&LapRecord> = session.laps_of(driver).collect();
            let Some(&first) = laps.first() else {
                continue;
            };
            identity.get_or_insert(first);

            let times: Vec<Seconds> = laps.iter().filter_map(|r| r.lap_time).collect();
            let speeds: Vec<f64> = laps.iter().filter_map(|r| r.speed).collect();
            let traps: Vec<f64> = laps.iter().filter_map(|r| r.speed_trap).collect();
            stages.push(StageReport {
                session: session.key.clone(),
                track: session.track.name.clone(),
                total_laps: laps.len(),
                best_lap: stats::min(&times),
                speed_max: stats::max(&speeds),
                speed_trap_max: stats::max(&traps),
                consistency: stats::std_dev(&times),
            });
        }

        let Some(first) = identity else {
            return Err(TimingError::DriverNotFound(driver.to_string()));
        };

        let best = stages
            .iter()
            .filter_map(|s| s.best_lap.map(|t| (s, t)))
            .fold(None, |best: Option<(&StageReport, Seconds)>, (s, t)| match best {
                Some((_, b)) if b <= t => best,
                _ => Some((s, t)),
            });
        let speeds: Vec<f64> = stages.iter().filter_map(|s| s.speed_max).collect();
        let traps: Vec<f64> = stages.iter().filter_map(|s| s.speed_trap_max).collect();
        let summary = HistorySummary {
            stages: stages.len(),
            total_laps: stages.iter().map(|s| s.total_laps).sum(),
            best_lap: best.map(|(_, t)| t),
            best_session: best.map(|(s, _)| s.session.clone()),
            speed_max: stats::max(&speeds),
            speed_trap_max: stats::max(&traps),
        };

        Ok(DriverHistory {
            driver: driver.to_string(),
            car_number: first.car_number.clone(),
            team: first.team.clone(),
            manufacturer: first.manufacturer.clone(),
            stages,
            summary,
        })
    }

    /// Points standings over every points-awarding session in `source`.
    ///
    /// Each session is ranked by best lap and scored from the points table.
    /// Ties on points keep the order in which drivers were first scored.
    pub fn championship_standings<S>(source: &S) -> Vec<ChampionshipRow>
    where
        S: SessionSource + ?Sized,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<ChampionshipRow> = Vec::new();

        for session in source
            .sessions()
            .filter(|s| s.key.session_type.awards_points())
        {
            let ranking = Self::best_per_driver(session, &RecordFilter::all());
            for entry in &ranking.rows {
                let i = *index.entry(entry.driver.clone()).or_insert_with(|| {
                    rows.push(ChampionshipRow {
                        position: 0,
                        driver: entry.driver.clone(),
                        team: entry.team.clone(),
                        manufacturer: entry.manufacturer.clone(),
                        points: 0,
                        wins: 0,
                        podiums: 0,
                        events: 0,
                        average: 0.0,
                    });
                    rows.len() - 1
                });
                let row = &mut rows[i];
                row.points += entry.points.unwrap_or(0);
                row.events += 1;
                if entry.position == 1 {
                    row.wins += 1;
                }
                if entry.position <= 3 {
                    row.podiums += 1;
                }
            }
        }

        rows.sort_by(|a, b| b.points.cmp(&a.points));
        for (i, row) in rows.iter_mut().enumerate() {
            row.position = i + 1;
            row.average = if row.events > 0 {
                f64::from(row.points) / f64::from(row.events)
            } else {
                0.0
            };
        }
        rows
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Index of the smallest sector best when every sector has one; first wins ties.
fn strongest_sector(bests: &[Option<Seconds>]) -> Option<usize> {
    if bests.is_empty() || bests.iter().any(Option::is_none) {
        return None;
    }
    let mut strongest = 0;
    for (i, best) in bests.iter().enumerate().skip(1) {
        if let (Some(candidate), Some(current)) = (best, bests[strongest]) {
            if *candidate < current {
                strongest = i;
            }
        }
    }
    Some(strongest)
}

fn group_ranking<F>(
    session: &TimingSession,
    filter: &RecordFilter,
    key: F,
    with_team: bool,
) -> Vec<GroupRow>
where
    F: Fn(&LapRecord) -> &String,
{
    struct Acc<'a> {
        best: &'a LapRecord,
        time: Seconds,
        drivers: HashSet<&'a str>,
    }

    let mut order: Vec<&String> = Vec::new();
    let mut groups: HashMap<&String, Acc<'_>> = HashMap::new();

    for record in filter.apply(&session.records) {
        let Some(time) = record.lap_time else {
            continue;
        };
        let group = key(record);
        match groups.get_mut(group) {
            Some(acc) => {
                acc.drivers.insert(&record.driver_id);
                if time < acc.time {
                    acc.best = record;
                    acc.time = time;
                }
            }
            None => {
                order.push(group);
                groups.insert(
                    group,
                    Acc {
                        best: record,
                        time,
                        drivers: HashSet::from([record.driver_id.as_str()]),
                    },
                );
            }
        }
    }

    let mut rows: Vec<GroupRow> = order
        .into_iter()
        .filter_map(|group| {
            let acc = groups.get(group)?;
            Some(GroupRow {
                position: 0,
                group: group.clone(),
                best_lap: acc.time,
                gap: 0.0,
                driver: acc.best.driver_id.clone(),
                car_number: acc.best.car_number.clone(),
                team: with_team.then(|| acc.best.team.clone()),
                drivers: acc.drivers.len(),
            })
        })
        .collect();

    rows.sort_by(|a, b| stats::total_cmp(&a.best_lap, &b.best_lap));
    let leader = rows.first().map(|r| r.best_lap).unwrap_or_default();
    for (i, row) in rows.iter_mut().enumerate() {
        row.position = i + 1;
        row.gap = row.best_lap - leader;
    }
    rows
}

// ── Tests ─────────────────────────────────────────────────────────────────────

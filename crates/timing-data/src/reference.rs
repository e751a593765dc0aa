//! Deltas against a reference profile, and best-lap evolution across sessions.

use std::collections::HashMap;

use serde::Serialize;
use timing_core::catalog::SessionType;
use timing_core::formatting::percentage;
use timing_core::models::{
    EvolutionOrder, ReferenceProfile, SessionKey, SessionSource, Seconds, TimingSession,
};
use timing_core::stats;
use tracing::debug;

use crate::aggregator::{group_by_driver, RecordFilter};

// ── Reference comparison ──────────────────────────────────────────────────────

/// One driver's best deltas to the reference. Each column is minimised on its
/// own, so the sector deltas may come from different laps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub driver: String,
    pub team: String,
    pub manufacturer: String,
    pub best_lap: Option<Seconds>,
    pub lap_delta: Option<Seconds>,
    pub sector_deltas: Vec<Option<Seconds>>,
    /// Driver's peak speed-trap reading minus the reference peak.
    pub speed_trap_delta: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonSummary {
    /// Drivers with a lap delta.
    pub compared: usize,
    pub faster_than_reference: usize,
    pub best_delta: Option<Seconds>,
    pub mean_delta: Option<Seconds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonTable {
    pub session: SessionKey,
    pub reference: String,
    pub rows: Vec<ComparisonRow>,
    pub summary: ComparisonSummary,
}

/// Compare every timed lap in `session` with `reference`, keep each
/// driver's smallest delta per column, and order drivers by lap delta.
pub fn compare_to_reference(
    session: &TimingSession,
    reference: &ReferenceProfile,
    filter: &RecordFilter,
) -> ComparisonTable {
    let sector_count = session.schema.sector_count;
    let timed = filter
        .apply(&session.records)
        .into_iter()
        .filter(|r| r.lap_time.is_some());

    let mut rows: Vec<ComparisonRow> = group_by_driver(timed)
        .into_iter()
        .map(|group| {
            let lap_deltas: Vec<Seconds> = group
                .laps
                .iter()
                .filter_map(|r| Some(r.lap_time? - reference.best_lap?))
                .collect();
            let sector_deltas = (0..sector_count)
                .map(|s| {
                    let deltas: Vec<Seconds> = group
                        .laps
                        .iter()
                        .filter_map(|r| Some(r.sector(s)? - reference.sector_best(s)?))
                        .collect();
                    stats::min(&deltas)
                })
                .collect();
            let traps: Vec<f64> = group.laps.iter().filter_map(|r| r.speed_trap).collect();
            let first = group.first();

            ComparisonRow {
                driver: group.driver.to_string(),
                team: first.team.clone(),
                manufacturer: first.manufacturer.clone(),
                best_lap: group.best_lap(),
                lap_delta: stats::min(&lap_deltas),
                sector_deltas,
                speed_trap_delta: stats::max(&traps)
                    .zip(reference.speed_trap_peak)
                    .map(|(peak, reference_peak)| peak - reference_peak),
            }
        })
        .collect();

    rows.sort_by(|a, b| match (a.lap_delta, b.lap_delta) {
        (Some(x), Some(y)) => stats::total_cmp(&x, &y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let deltas: Vec<Seconds> = rows.iter().filter_map(|r| r.lap_delta).collect();
    let summary = ComparisonSummary {
        compared: deltas.len(),
        faster_than_reference: deltas.iter().filter(|d| **d < 0.0).count(),
        best_delta: stats::min(&deltas),
        mean_delta: stats::mean(&deltas),
    };

    ComparisonTable {
        session: session.key.clone(),
        reference: reference.name.clone(),
        rows,
        summary,
    }
}

// ── Evolution ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionPoint {
    pub session: SessionKey,
    pub round: Option<u32>,
    pub track: String,
    pub best_lap: Seconds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionSeries {
    pub driver: String,
    pub session_type: SessionType,
    pub order: EvolutionOrder,
    pub points: Vec<EvolutionPoint>,
}

impl EvolutionSeries {
    /// Last best lap minus first; needs at least two points.
    pub fn first_to_last(&self) -> Option<Seconds> {
        match self.points.as_slice() {
            [first, .., last] => Some(last.best_lap - first.best_lap),
            _ => None,
        }
    }

    /// Fastest point of the series; the earliest wins ties.
    pub fn historical_best(&self) -> Option<&EvolutionPoint> {
        self.points.iter().fold(None, |best: Option<&EvolutionPoint>, p| match best {
            Some(b) if b.best_lap <= p.best_lap => Some(b),
            _ => Some(p),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Best lap of `driver` in every stored session of `session_type`.
///
/// Sessions where the driver has no timed lap are skipped, not reported as
/// gaps.
pub fn evolution<S>(
    source: &S,
    driver: &str,
    session_type: SessionType,
    order: EvolutionOrder,
) -> EvolutionSeries
where
    S: SessionSource + ?Sized,
{
    let mut sessions: Vec<&TimingSession> = source
        .sessions()
        .filter(|s| s.key.session_type == session_type)
        .collect();

    match order {
        EvolutionOrder::Insertion => {}
        EvolutionOrder::Chronological => {
            sessions.sort_by(|a, b| {
                a.key
                    .season
                    .cmp(&b.key.season)
                    .then_with(|| a.round.is_none().cmp(&b.round.is_none()))
                    .then_with(|| a.round.cmp(&b.round))
            });
        }
        EvolutionOrder::KeyLexicographic => {
            sessions.sort_by_cached_key(|s| s.key.to_string());
        }
    }

    let points: Vec<EvolutionPoint> = sessions
        .into_iter()
        .filter_map(|s| {
            let best_lap = s.best_lap_of(driver)?;
            Some(EvolutionPoint {
                session: s.key.clone(),
                round: s.round,
                track: s.track.name.clone(),
                best_lap,
            })
        })
        .collect();

    debug!(
        "Evolution of '{}' over {}: {} points",
        driver,
        session_type,
        points.len()
    );

    EvolutionSeries {
        driver: driver.to_string(),
        session_type,
        order,
        points,
    }
}

// ── Stage comparison ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRow {
    pub driver: String,
    pub team: String,
    pub manufacturer: String,
    pub time_from: Seconds,
    pub time_to: Seconds,
    /// `time_to - time_from`; negative means the driver got faster.
    pub evolution: Seconds,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageSummary {
    pub compared: usize,
    pub improved: usize,
    pub best_evolution: Option<Seconds>,
    pub worst_evolution: Option<Seconds>,
    pub mean_evolution: Option<Seconds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManufacturerEvolution {
    pub manufacturer: String,
    pub mean_evolution: Seconds,
    pub drivers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageComparison {
    pub from: SessionKey,
    pub to: SessionKey,
    pub rows: Vec<StageRow>,
    pub summary: StageSummary,
    pub by_manufacturer: Vec<ManufacturerEvolution>,
}

/// Best-lap change per driver between two sessions.
///
/// Only drivers with a timed lap in both are compared; team data comes from
/// the earlier session.
pub fn compare_sessions(from: &TimingSession, to: &TimingSession) -> StageComparison {
    let later: HashMap<&str, Seconds> = group_by_driver(&to.records)
        .into_iter()
        .filter_map(|g| Some((g.driver, g.best_lap()?)))
        .collect();

    let mut rows: Vec<StageRow> = group_by_driver(&from.records)
        .into_iter()
        .filter_map(|g| {
            let time_from = g.best_lap()?;
            let time_to = *later.get(g.driver)?;
            let evolution = time_to - time_from;
            let first = g.first();
            Some(StageRow {
                driver: g.driver.to_string(),
                team: first.team.clone(),
                manufacturer: first.manufacturer.clone(),
                time_from,
                time_to,
                evolution,
                percentage: percentage(evolution, time_from, 3),
            })
        })
        .collect();

    rows.sort_by(|a, b| stats::total_cmp(&a.evolution, &b.evolution));

    let evolutions: Vec<Seconds> = rows.iter().map(|r| r.evolution).collect();
    let summary = StageSummary {
        compared: rows.len(),
        improved: evolutions.iter().filter(|e| **e < 0.0).count(),
        best_evolution: stats::min(&evolutions),
        worst_evolution: stats::max(&evolutions),
        mean_evolution: stats::mean(&evolutions),
    };

    let mut makers: Vec<(&str, Vec<Seconds>)> = Vec::new();
    for row in &rows {
        match makers.iter_mut().find(|(m, _)| *m == row.manufacturer) {
            Some((_, values)) => values.push(row.evolution),
            None => makers.push((row.manufacturer.as_str(), vec![row.evolution])),
        }
    }
    let mut by_manufacturer: Vec<ManufacturerEvolution> = makers
        .into_iter()
        .filter_map(|(manufacturer, values)| {
            Some(ManufacturerEvolution {
                manufacturer: manufacturer.to_string(),
                mean_evolution: stats::mean(&values)?,
                drivers: values.len(),
            })
        })
        .collect();
    by_manufacturer.sort_by(|a, b| stats::total_cmp(&a.mean_evolution, &b.mean_evolution));

    StageComparison {
        from: from.key.clone(),
        to: to.key.clone(),
        rows,
        summary,
        by_manufacturer,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::{lap, session_of};
    use timing_core::models::LapRecord;

    fn simple(driver: &str, time: Option<f64>) -> LapRecord {
        lap(driver, "T", "M", time, [None; 3])
    }

    fn reference(best: f64, sectors: [Option<f64>; 3], peak: Option<f64>) -> ReferenceProfile {
        ReferenceProfile::manual("ref", "Coach", Some(best), sectors.to_vec(), peak)
    }

    // ── compare_to_reference ──────────────────────────────────────────────────

    #[test]
    fn test_compare_min_delta_per_driver() {
        let session = session_of(
            "S",
            SessionType::Q2,
            None,
            vec![simple("A", Some(89.8)), simple("A", Some(90.1)), simple("A", Some(89.95))],
        );
        let table = compare_to_reference(
            &session,
            &reference(90.0, [None; 3], None),
            &RecordFilter::all(),
        );
        assert_eq!(table.rows.len(), 1);
        assert!((table.rows[0].lap_delta.unwrap() + 0.2).abs() < 1e-9);
        assert_eq!(table.summary.faster_than_reference, 1);
    }

    #[test]
    fn test_compare_sector_deltas_minimised_independently() {
        let session = session_of(
            "S",
            SessionType::Q2,
            None,
            vec![
                lap("A", "T", "M", Some(90.0), [Some(29.0), Some(31.0), None]),
                lap("A", "T", "M", Some(91.0), [Some(30.0), Some(30.0), None]),
                // Untimed laps never contribute.
                lap("A", "T", "M", None, [Some(20.0), Some(20.0), None]),
            ],
        );
        let table = compare_to_reference(
            &session,
            &reference(90.0, [Some(29.5), Some(30.5), Some(30.0)], None),
            &RecordFilter::all(),
        );
        let deltas = &table.rows[0].sector_deltas;
        assert!((deltas[0].unwrap() + 0.5).abs() < 1e-9);
        assert!((deltas[1].unwrap() + 0.5).abs() < 1e-9);
        assert_eq!(deltas[2], None);
    }

    #[test]
    fn test_compare_sorted_and_summarised() {
        let mut a = simple("A", Some(90.3));
        a.speed_trap = Some(250.0);
        let session = session_of(
            "S",
            SessionType::Q2,
            None,
            vec![a, simple("B", Some(89.9)), simple("C", None), simple("D", Some(90.1))],
        );
        let table = compare_to_reference(
            &session,
            &reference(90.0, [None; 3], Some(248.0)),
            &RecordFilter::all(),
        );
        let order: Vec<&str> = table.rows.iter().map(|r| r.driver.as_str()).collect();
        assert_eq!(order, vec!["B", "D", "A"]);
        assert_eq!(table.rows[2].speed_trap_delta, Some(2.0));
        assert_eq!(table.rows[0].speed_trap_delta, None);

        let summary = &table.summary;
        assert_eq!(summary.compared, 3);
        assert_eq!(summary.faster_than_reference, 1);
        assert!((summary.best_delta.unwrap() + 0.1).abs() < 1e-9);
        assert!((summary.mean_delta.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_compare_with_filter_and_empty_result() {
        let session = session_of("S", SessionType::Q2, None, vec![simple("A", Some(90.0))]);
        let filter = RecordFilter::all().with_drivers(["B"]);
        let table = compare_to_reference(&session, &reference(90.0, [None; 3], None), &filter);
        assert!(table.rows.is_empty());
        assert_eq!(table.summary, ComparisonSummary::default());
    }

    // ── evolution ─────────────────────────────────────────────────────────────

    #[test]
    fn test_evolution_skips_sessions_without_valid_laps() {
        let sessions = vec![
            session_of("R1", SessionType::Q2, Some(1), vec![simple("A", Some(91.0))]),
            session_of("R2", SessionType::Q2, Some(2), vec![simple("A", None)]),
            session_of("R3", SessionType::Q2, Some(3), vec![simple("A", Some(90.4))]),
            session_of("R3", SessionType::Q3, Some(3), vec![simple("A", Some(88.0))]),
        ];
        let series = evolution(&sessions, "A", SessionType::Q2, EvolutionOrder::default());
        let stages: Vec<&str> = series.points.iter().map(|p| p.session.stage.as_str()).collect();
        assert_eq!(stages, vec!["R1", "R3"]);
        assert!((series.first_to_last().unwrap() + 0.6).abs() < 1e-9);
        assert_eq!(series.historical_best().unwrap().session.stage, "R3");
    }

    #[test]
    fn test_evolution_chronological_uses_round() {
        // Inserted out of order; "#10" sorts before "#2" as text.
        let sessions = vec![
            session_of("#10 Interlagos", SessionType::Q2, Some(10), vec![simple("A", Some(90.0))]),
            session_of("Extra", SessionType::Q2, None, vec![simple("A", Some(89.0))]),
            session_of("#2 Velocitta", SessionType::Q2, Some(2), vec![simple("A", Some(91.0))]),
        ];

        let chrono = evolution(&sessions, "A", SessionType::Q2, EvolutionOrder::Chronological);
        let stages: Vec<&str> = chrono.points.iter().map(|p| p.session.stage.as_str()).collect();
        assert_eq!(stages, vec!["#2 Velocitta", "#10 Interlagos", "Extra"]);

        let lexical = evolution(&sessions, "A", SessionType::Q2, EvolutionOrder::KeyLexicographic);
        let stages: Vec<&str> = lexical.points.iter().map(|p| p.session.stage.as_str()).collect();
        assert_eq!(stages, vec!["#10 Interlagos", "#2 Velocitta", "Extra"]);

        let inserted = evolution(&sessions, "A", SessionType::Q2, EvolutionOrder::Insertion);
        assert_eq!(inserted.points[0].session.stage, "#10 Interlagos");
    }

    #[test]
    fn test_evolution_single_point_has_no_delta() {
        let sessions = vec![session_of(
            "R1",
            SessionType::Q2,
            Some(1),
            vec![simple("A", Some(91.0))],
        )];
        let series = evolution(&sessions, "A", SessionType::Q2, EvolutionOrder::default());
        assert_eq!(series.first_to_last(), None);
        assert!(series.historical_best().is_some());

        let none = evolution(&sessions, "Z", SessionType::Q2, EvolutionOrder::default());
        assert!(none.is_empty());
        assert!(none.historical_best().is_none());
    }

    #[test]
    fn test_historical_best_earliest_wins_ties() {
        let sessions = vec![
            session_of("R1", SessionType::Q2, Some(1), vec![simple("A", Some(90.0))]),
            session_of("R2", SessionType::Q2, Some(2), vec![simple("A", Some(90.0))]),
        ];
        let series = evolution(&sessions, "A", SessionType::Q2, EvolutionOrder::default());
        assert_eq!(series.historical_best().unwrap().session.stage, "R1");
    }

    // ── compare_sessions ──────────────────────────────────────────────────────

    #[test]
    fn test_compare_sessions() {
        let from = session_of(
            "R1",
            SessionType::Q2,
            Some(1),
            vec![
                lap("A", "T1", "Chevrolet", Some(90.0), [None; 3]),
                lap("B", "T2", "Toyota", Some(91.0), [None; 3]),
                lap("C", "T3", "Toyota", Some(92.0), [None; 3]),
            ],
        );
        let to = session_of(
            "R2",
            SessionType::Q2,
            Some(2),
            vec![
                lap("A", "T1", "Chevrolet", Some(90.5), [None; 3]),
                lap("B", "T2", "Toyota", Some(90.0), [None; 3]),
                lap("D", "T4", "Mitsubishi", Some(89.0), [None; 3]),
            ],
        );

        let cmp = compare_sessions(&from, &to);
        let order: Vec<&str> = cmp.rows.iter().map(|r| r.driver.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
        assert!((cmp.rows[0].evolution + 1.0).abs() < 1e-9);
        assert!((cmp.rows[0].percentage + 1.099).abs() < 1e-9);

        assert_eq!(cmp.summary.compared, 2);
        assert_eq!(cmp.summary.improved, 1);
        assert!((cmp.summary.mean_evolution.unwrap() + 0.25).abs() < 1e-9);

        assert_eq!(cmp.by_manufacturer.len(), 2);
        assert_eq!(cmp.by_manufacturer[0].manufacturer, "Toyota");
        assert_eq!(cmp.by_manufacturer[1].drivers, 1);
    }
}

use std::path::PathBuf;

use tempfile::TempDir;
use timing_core::catalog::{SessionType, TrackCatalog};
use timing_core::models::{EvolutionOrder, IngestRequest, Roster, RosterEntry, SessionKey};
use timing_core::settings::IngestConfig;
use timing_data::aggregator::RecordFilter;
use timing_runtime::session::AnalysisSession;

const R1_Q2: &str = "\
Time of Day;Lap;Lap Tm;S1 Tm;S2 Tm;S3 Tm;SPT
29 - Ana Lima - Stock Car PRO 2024;;;;;;
10:01:00;1;1:30,000;30,000;30,000;30,000;245,0
10:02:30;2;1:31,200;30,300;30,400;30,500;244,0
12 - Bruno Costa - Stock Car PRO 2024;;;;;;
10:01:10;1;1:29,800;29,900;29,900;30,000;246,5
10:02:40;2;1:30,100;30,000;30,050;30,050;246,0
10:04:10;3;1:29,950;29,950;30,000;30,000;
7 - Caio Reis - Stock Car PRO 2024;;;;;;
10:01:20;1;No Time;;;;
";

const R2_Q2: &str = "\
Time of Day,Lap,Lap Tm,S1 Tm,S2 Tm,S3 Tm
12 - Bruno Costa - Stock Car PRO 2024,,,,,
11:00:00,1,1:30.400,30.100,30.100,30.200
";

const R3_Q2: &str = "\
Time of Day,Lap,Lap Tm,S1 Tm,S2 Tm,S3 Tm
29 - Ana Lima - Stock Car PRO 2024,,,,,
12:00:00,1,1:29.500,29.800,29.800,29.900
12 - Bruno Costa - Stock Car PRO 2024,,,,,
12:01:00,1,1:29.700,29.900,29.900,29.900
";

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn request(stage: &str, round: u32) -> IngestRequest {
    IngestRequest {
        key: SessionKey::new("2024", stage, SessionType::Q2),
        track: "Interlagos".to_string(),
        round: Some(round),
        notes: None,
    }
}

fn started() -> AnalysisSession {
    let mut roster = Roster::new();
    roster.insert(
        "Ana Lima",
        RosterEntry {
            team: "Blue Racing".to_string(),
            manufacturer: "Toyota".to_string(),
            car_number: None,
        },
    );
    roster.insert(
        "Bruno Costa",
        RosterEntry {
            team: "Red Motorsport".to_string(),
            manufacturer: "Chevrolet".to_string(),
            car_number: Some("10".to_string()),
        },
    );
    AnalysisSession::start(IngestConfig::default(), roster, TrackCatalog::official())
}

#[test]
fn test_ingest_rank_compare_evolve() {
    let dir = TempDir::new().unwrap();
    let mut session = started();

    // ── Ingest ────────────────────────────────────────────────────────────

    let meta = session
        .ingest_file(&write(&dir, "r1.csv", R1_Q2), request("R1", 1))
        .unwrap();
    assert_eq!(meta.blocks_found, 3);
    assert_eq!(meta.records, 6);
    assert_eq!(meta.records_without_time, 1);
    assert_eq!(meta.sector_count, 3);

    session
        .ingest_file(&write(&dir, "r2.csv", R2_Q2), request("R2", 2))
        .unwrap();
    session
        .ingest_file(&write(&dir, "r3.csv", R3_Q2), request("R3", 3))
        .unwrap();
    assert_eq!(session.store().len(), 3);

    // ── Ranking ───────────────────────────────────────────────────────────

    let key = request("R1", 1).key;
    let ranking = session.ranking(&key, &RecordFilter::all()).unwrap();
    assert_eq!(ranking.rows.len(), 2, "drivers without a timed lap are not ranked");
    assert_eq!(ranking.rows[0].driver, "Bruno Costa");
    assert_eq!(ranking.rows[0].car_number, "10");
    assert_eq!(ranking.rows[0].gap_display, "Leader");
    assert_eq!(ranking.rows[1].driver, "Ana Lima");
    assert_eq!(ranking.rows[1].car_number, "29");
    assert_eq!(ranking.rows[1].team, "Blue Racing");
    assert!((ranking.rows[1].gap - 0.2).abs() < 1e-9);
    assert_eq!(ranking.rows[1].gap_display, "+0.200s");

    let toyota = session
        .ranking(&key, &RecordFilter::all().with_manufacturers(["Toyota"]))
        .unwrap();
    assert_eq!(toyota.rows.len(), 1);
    assert_eq!(toyota.rows[0].position, 1);

    // ── Reference comparison ──────────────────────────────────────────────

    let reference = session.reference_from_session("ana", &key, "Ana Lima").unwrap();
    assert_eq!(reference.best_lap, Some(90.0));

    let table = session
        .compare(&key, "ana", &RecordFilter::all().with_drivers(["Bruno Costa"]))
        .unwrap();
    assert_eq!(table.rows.len(), 1);
    let delta = table.rows[0].lap_delta.unwrap();
    assert!((delta - -0.2).abs() < 1e-9, "smallest of -0.2, +0.1, -0.05");
    assert_eq!(table.summary.faster_than_reference, 1);

    // ── Evolution ─────────────────────────────────────────────────────────

    let ana = session.evolution("Ana Lima", SessionType::Q2, EvolutionOrder::Chronological);
    let stages: Vec<&str> = ana.points.iter().map(|p| p.session.stage.as_str()).collect();
    assert_eq!(stages, vec!["R1", "R3"], "R2 has no laps for Ana and is skipped");
    assert!((ana.first_to_last().unwrap() - -0.5).abs() < 1e-9);

    let bruno = session.evolution("Bruno Costa", SessionType::Q2, EvolutionOrder::Chronological);
    assert_eq!(bruno.points.len(), 3);
    assert_eq!(bruno.historical_best().unwrap().session.stage, "R3");

    // ── Stages ────────────────────────────────────────────────────────────

    let comparison = session
        .compare_stages(&key, &request("R3", 3).key)
        .unwrap();
    assert_eq!(comparison.summary.compared, 2);
    assert_eq!(comparison.summary.improved, 2);

    session.teardown();
    assert!(session.store().is_empty());
}

#[test]
fn test_reingest_replaces_manual_entry_appends() {
    let dir = TempDir::new().unwrap();
    let mut session = started();
    let key = request("R1", 1).key;

    session
        .ingest_file(&write(&dir, "r1.csv", R1_Q2), request("R1", 1))
        .unwrap();
    assert_eq!(session.store().get(&key).unwrap().records.len(), 6);

    // Same key, different export: the session is replaced wholesale.
    session
        .ingest_file(&write(&dir, "r1b.csv", R3_Q2), request("R1", 1))
        .unwrap();
    assert_eq!(session.store().len(), 1);
    assert_eq!(session.store().get(&key).unwrap().records.len(), 2);

    // A manual lap is appended to the existing session.
    session
        .add_manual_lap(
            request("R1", 1),
            "Caio Reis",
            Some(89.0),
            vec![Some(29.6), Some(29.7), Some(29.7)],
        )
        .unwrap();
    let stored = session.store().get(&key).unwrap();
    assert_eq!(stored.records.len(), 3);
    assert_eq!(stored.records[2].car_number, "99");
    assert_eq!(stored.records[2].team, "Unknown");

    let ranking = session.ranking(&key, &RecordFilter::all()).unwrap();
    assert_eq!(ranking.leader().unwrap().driver, "Caio Reis");
}

#[test]
fn test_failed_ingest_keeps_previous_session() {
    let dir = TempDir::new().unwrap();
    let mut session = started();
    let key = request("R1", 1).key;

    session
        .ingest_file(&write(&dir, "r1.csv", R1_Q2), request("R1", 1))
        .unwrap();

    let broken = write(&dir, "broken.csv", "Time of Day,Lap Tm\n10:00:00,1:30.000\n");
    assert!(session.ingest_file(&broken, request("R1", 1)).is_err());
    assert_eq!(session.store().get(&key).unwrap().records.len(), 6);
}

#[test]
fn test_ingest_directory_one_stage_per_file() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("late")).unwrap();
    write(&dir, "01-Goiania.csv", R1_Q2);
    write(&dir, "late/03-Interlagos.csv", R3_Q2);
    write(&dir, "02-broken.csv", "Time of Day,Lap Tm\n10:00:00,1:30.000\n");
    write(&dir, "notes.txt", "not an export");

    let mut session = started();
    let ingested = session.ingest_directory(dir.path(), "2024", SessionType::Q2, None);

    let stages: Vec<&str> = ingested.iter().map(|(key, _)| key.stage.as_str()).collect();
    assert_eq!(stages, vec!["01-Goiania", "03-Interlagos"], "broken export is skipped");
    assert_eq!(ingested[0].1.records, 6);
    assert_eq!(session.store().len(), 2);

    let stored = session
        .store()
        .get(&SessionKey::new("2024", "03-Interlagos", SessionType::Q2))
        .unwrap();
    assert_eq!(stored.track.name, "03-Interlagos");

    let history = session.driver_history("Ana Lima").unwrap();
    assert_eq!(history.summary.stages, 2);
    assert_eq!(history.summary.total_laps, 3);
    assert_eq!(history.summary.best_lap, Some(89.5));
    assert_eq!(history.summary.best_session.unwrap().stage, "03-Interlagos");
    assert_eq!(history.team, "Blue Racing");
}

#[test]
fn test_ingest_directory_shared_track_and_missing_dir() {
    let dir = TempDir::new().unwrap();
    write(&dir, "r1.csv", R2_Q2);

    let mut session = started();
    let ingested =
        session.ingest_directory(dir.path(), "2024", SessionType::Q2, Some("Interlagos"));
    assert_eq!(ingested.len(), 1);
    assert_eq!(session.store().get(&ingested[0].0).unwrap().track.name, "Interlagos");

    let none = session.ingest_directory(&dir.path().join("absent"), "2024", SessionType::Q2, None);
    assert!(none.is_empty());
}

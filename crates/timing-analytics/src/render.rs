//! Plain-text rendering of the analysis tables.

use timing_core::formatting::{format_delta, format_gap, format_percent, format_speed};
use timing_core::models::{Seconds, SessionKey};
use timing_core::time_literal;
use timing_data::aggregator::{
    ChampionshipRow, DriverHistory, ManufacturerSpeedRow, SectorKing, SpeedReading,
};
use timing_data::analysis::IngestMetadata;
use timing_data::reference::{ComparisonTable, EvolutionSeries, StageComparison};
use timing_runtime::session::SessionAnalysis;

// ── TextTable ─────────────────────────────────────────────────────────────────

/// Column-aligned text table. The first column is left-aligned, the rest
/// are right-aligned.
#[derive(Debug, Default)]
pub struct TextTable {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }
        widths
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let rule_len = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);

        let mut out = String::new();
        out.push_str(&self.title);
        out.push('\n');
        out.push_str(&Self::line(&self.headers, &widths));
        out.push('\n');
        out.push_str(&"─".repeat(rule_len));
        out.push('\n');
        if self.rows.is_empty() {
            out.push_str("(no rows)\n");
        }
        for row in &self.rows {
            out.push_str(&Self::line(row, &widths));
            out.push('\n');
        }
        out
    }
}

fn time(value: Option<Seconds>) -> String {
    time_literal::format(value)
}

fn sector_headers(count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("S{n}")).collect()
}

fn with_sectors(base: &[&str], sectors: usize, tail: &[&str]) -> Vec<String> {
    base.iter()
        .map(|s| s.to_string())
        .chain(sector_headers(sectors))
        .chain(tail.iter().map(|s| s.to_string()))
        .collect()
}

fn table_with(title: String, headers: Vec<String>) -> TextTable {
    TextTable {
        title,
        headers,
        rows: Vec::new(),
    }
}

// ── Session analysis ──────────────────────────────────────────────────────────

pub fn session_analysis(analysis: &SessionAnalysis) -> String {
    let overview = &analysis.overview;
    let mut out = format!(
        "{} at {}: {} drivers, {} laps, fastest {}\n\n",
        overview.session,
        overview.track,
        overview.drivers,
        overview.laps,
        overview.fastest_driver.as_deref().unwrap_or("-"),
    );

    let mut ranking = TextTable::new(
        "Best laps",
        &["Pos", "Driver", "Car", "Team", "Best", "Gap", "Laps", "Top speed", "Pts"],
    );
    for row in &analysis.ranking.rows {
        ranking.push(vec![
            row.position.to_string(),
            row.driver.clone(),
            row.car_number.clone(),
            row.team.clone(),
            time(Some(row.best_lap)),
            format_gap(row.gap, row.position),
            row.valid_laps.to_string(),
            format_speed(row.top_speed),
            row.points.map(|p| p.to_string()).unwrap_or_default(),
        ]);
    }
    out.push_str(&ranking.render());
    out.push('\n');

    let sector_count = overview.sector_stats.len();
    let mut sectors = table_with(
        "Sector bests".to_string(),
        with_sectors(&["Driver", "Best"], sector_count, &["Strong"]),
    );
    for row in &analysis.sectors {
        let mut cells = vec![row.driver.clone(), time(row.best_lap)];
        cells.extend(row.sector_best.iter().map(|s| time(*s)));
        cells.push(row.strong_sector.map(|s| format!("S{}", s + 1)).unwrap_or_default());
        sectors.push(cells);
    }
    out.push_str(&sectors.render());
    out.push('\n');
    out.push_str(&sector_kings(&analysis.sector_kings));
    out.push('\n');

    for (title, rows) in [("Teams", &analysis.teams), ("Manufacturers", &analysis.manufacturers)] {
        let mut table = TextTable::new(title, &["Pos", "Name", "Best", "Gap", "Driver", "Drivers"]);
        for row in rows {
            table.push(vec![
                row.position.to_string(),
                row.group.clone(),
                time(Some(row.best_lap)),
                format_gap(row.gap, row.position),
                row.driver.clone(),
                row.drivers.to_string(),
            ]);
        }
        out.push_str(&table.render());
        out.push('\n');
    }

    let mut consistency =
        TextTable::new("Consistency", &["Pos", "Driver", "Laps", "Best", "Mean", "Std dev"]);
    for row in &analysis.consistency {
        consistency.push(vec![
            row.position.to_string(),
            row.driver.clone(),
            row.valid_laps.to_string(),
            time(Some(row.best_lap)),
            time(Some(row.mean_lap)),
            format!("{:.3}", row.std_dev),
        ]);
    }
    out.push_str(&consistency.render());

    if let Some(traps) = &analysis.speed_trap {
        out.push('\n');
        let mut table = TextTable::new("Speed trap", &["Driver", "Max", "Mean", "Readings"]);
        for row in traps {
            table.push(vec![
                row.driver.clone(),
                format_speed(Some(row.max)),
                format_speed(Some(row.mean)),
                row.readings.to_string(),
            ]);
        }
        out.push_str(&table.render());
        out.push('\n');
        out.push_str(&manufacturer_speed_trap(&analysis.speed_trap_by_manufacturer));
        out.push('\n');
        out.push_str(&top_speed_readings(&analysis.top_speed_readings));
    }

    if let Some(report) = &analysis.driver_report {
        out.push_str(&format!(
            "\n{} #{} ({} / {}): {} laps, {} timed, best {}, mean {}, top speed {}\n",
            report.driver,
            report.car_number,
            report.team,
            report.manufacturer,
            report.total_laps,
            report.valid_laps,
            time(report.lap_stats.best),
            time(report.lap_stats.mean),
            format_speed(report.speed_max),
        ));
    }

    out
}

pub fn sector_kings(kings: &[SectorKing]) -> String {
    let mut table = TextTable::new("Sector kings", &["Sector", "Driver", "Team", "Time"]);
    for king in kings {
        table.push(vec![
            format!("S{}", king.sector + 1),
            king.driver.clone(),
            king.team.clone(),
            time(Some(king.time)),
        ]);
    }
    table.render()
}

pub fn manufacturer_speed_trap(rows: &[ManufacturerSpeedRow]) -> String {
    let mut table = TextTable::new(
        "Speed trap by manufacturer",
        &["Manufacturer", "Max", "Mean", "Std dev", "Readings", "Drivers"],
    );
    for row in rows {
        table.push(vec![
            row.manufacturer.clone(),
            format_speed(Some(row.max)),
            format_speed(Some(row.mean)),
            row.std_dev.map(|s| format!("{s:.2}")).unwrap_or_else(|| "N/A".to_string()),
            row.readings.to_string(),
            row.drivers.to_string(),
        ]);
    }
    table.render()
}

pub fn top_speed_readings(readings: &[SpeedReading]) -> String {
    let mut table =
        TextTable::new("Top speed-trap readings", &["Pos", "Driver", "Team", "Lap", "Speed"]);
    for reading in readings {
        table.push(vec![
            reading.position.to_string(),
            reading.driver.clone(),
            reading.team.clone(),
            reading.lap_number.map(|n| n.to_string()).unwrap_or_default(),
            format_speed(Some(reading.speed_trap)),
        ]);
    }
    table.render()
}

// ── Ingest ────────────────────────────────────────────────────────────────────

pub fn ingest_summary(ingested: &[(SessionKey, IngestMetadata)]) -> String {
    let mut table = TextTable::new(
        format!("Ingested {} exports", ingested.len()),
        &["Session", "Drivers", "Laps", "No time", "Sectors"],
    );
    for (key, metadata) in ingested {
        table.push(vec![
            key.to_string(),
            metadata.drivers.to_string(),
            metadata.records.to_string(),
            metadata.records_without_time.to_string(),
            metadata.sector_count.to_string(),
        ]);
    }
    table.render()
}

// ── Driver history ────────────────────────────────────────────────────────────

pub fn driver_history(history: &DriverHistory) -> String {
    let mut table = TextTable::new(
        format!(
            "{} #{} ({} / {})",
            history.driver, history.car_number, history.team, history.manufacturer
        ),
        &["Session", "Track", "Laps", "Best", "Std dev", "Top speed", "Trap"],
    );
    for stage in &history.stages {
        table.push(vec![
            stage.session.to_string(),
            stage.track.clone(),
            stage.total_laps.to_string(),
            time(stage.best_lap),
            stage.consistency.map(|c| format!("{c:.3}")).unwrap_or_else(|| "N/A".to_string()),
            format_speed(stage.speed_max),
            format_speed(stage.speed_trap_max),
        ]);
    }

    let summary = &history.summary;
    let best_session = summary
        .best_session
        .as_ref()
        .map(|key| format!(" ({key})"))
        .unwrap_or_default();
    format!(
        "{}\n{} sessions, {} laps, best {}{}, top speed {}, trap {}\n",
        table.render(),
        summary.stages,
        summary.total_laps,
        time(summary.best_lap),
        best_session,
        format_speed(summary.speed_max),
        format_speed(summary.speed_trap_max),
    )
}

// ── Reference comparison ──────────────────────────────────────────────────────

pub fn comparison(table: &ComparisonTable) -> String {
    let sectors = table.rows.first().map_or(0, |r| r.sector_deltas.len());
    let mut text = table_with(
        format!("{} vs reference '{}'", table.session, table.reference),
        with_sectors(&["Driver", "Team", "Best", "Delta"], sectors, &["Trap"]),
    );
    for row in &table.rows {
        let mut cells = vec![
            row.driver.clone(),
            row.team.clone(),
            time(row.best_lap),
            format_delta(row.lap_delta),
        ];
        cells.extend(row.sector_deltas.iter().map(|d| format_delta(*d)));
        cells.push(
            row.speed_trap_delta
                .map(|d| format!("{d:+.1}"))
                .unwrap_or_else(|| "N/A".to_string()),
        );
        text.push(cells);
    }

    let summary = &table.summary;
    format!(
        "{}\n{} compared, {} faster than reference, best {}, mean {}\n",
        text.render(),
        summary.compared,
        summary.faster_than_reference,
        format_delta(summary.best_delta),
        format_delta(summary.mean_delta),
    )
}

// ── Evolution ─────────────────────────────────────────────────────────────────

pub fn evolution(series: &EvolutionSeries) -> String {
    let mut table = TextTable::new(
        format!("{} in {} sessions", series.driver, series.session_type.label()),
        &["Session", "Round", "Track", "Best"],
    );
    for point in &series.points {
        table.push(vec![
            point.session.to_string(),
            point.round.map(|r| r.to_string()).unwrap_or_default(),
            point.track.clone(),
            time(Some(point.best_lap)),
        ]);
    }

    let best = series
        .historical_best()
        .map(|p| format!("{} ({})", time(Some(p.best_lap)), p.session))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "{}\nfirst to last {}, historical best {}\n",
        table.render(),
        format_delta(series.first_to_last()),
        best,
    )
}

// ── Stage comparison ──────────────────────────────────────────────────────────

pub fn stages(comparison: &StageComparison) -> String {
    let mut table = TextTable::new(
        format!("{} -> {}", comparison.from, comparison.to),
        &["Driver", "Manufacturer", "From", "To", "Change", "%"],
    );
    for row in &comparison.rows {
        table.push(vec![
            row.driver.clone(),
            row.manufacturer.clone(),
            time(Some(row.time_from)),
            time(Some(row.time_to)),
            format_delta(Some(row.evolution)),
            format_percent(Some(row.percentage)),
        ]);
    }

    let mut makers = TextTable::new("By manufacturer", &["Manufacturer", "Mean change", "Drivers"]);
    for row in &comparison.by_manufacturer {
        makers.push(vec![
            row.manufacturer.clone(),
            format_delta(Some(row.mean_evolution)),
            row.drivers.to_string(),
        ]);
    }

    let summary = &comparison.summary;
    format!(
        "{}\n{}\n{} compared, {} improved, mean {}\n",
        table.render(),
        makers.render(),
        summary.compared,
        summary.improved,
        format_delta(summary.mean_evolution),
    )
}

// ── Championship ──────────────────────────────────────────────────────────────

pub fn championship(rows: &[ChampionshipRow]) -> String {
    let mut table = TextTable::new(
        "Championship",
        &["Pos", "Driver", "Team", "Pts", "Wins", "Podiums", "Events", "Avg"],
    );
    for row in rows {
        table.push(vec![
            row.position.to_string(),
            row.driver.clone(),
            row.team.clone(),
            row.points.to_string(),
            row.wins.to_string(),
            row.podiums.to_string(),
            row.events.to_string(),
            format!("{:.1}", row.average),
        ]);
    }
    table.render()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

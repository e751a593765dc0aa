//! Block segmentation of flat timing exports.
//!
//! An export is one table in which each driver's laps are preceded by a
//! header row of the form `<car> - <driver> - <category>` in the
//! identification column. The parser finds those header rows, cuts the table
//! into one [`SessionBlock`] per header, and then normalises every body row
//! into a [`LapRecord`].

use regex::Regex;
use serde::Serialize;
use timing_core::error::{FormatError, Result};
use timing_core::models::{LapRecord, Roster, SessionSchema, SignalQuality};
use timing_core::settings::{ColumnAliases, IngestConfig};
use timing_core::time_literal;
use tracing::debug;

use crate::reader::RawTable;

/// Upper bound on sector columns scanned per export.
const MAX_SECTORS: usize = 12;

// ── SessionBlock ──────────────────────────────────────────────────────────────

/// One driver's slice of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionBlock {
    pub car_number: String,
    pub driver_name: String,
    pub category: String,
    /// Data-row index of the header within the table.
    pub header_row: usize,
    /// Body rows, cells aligned with the table headers.
    pub rows: Vec<Vec<String>>,
}

// ── ColumnMap ─────────────────────────────────────────────────────────────────

/// Column indices resolved once per export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub lap_number: Option<usize>,
    pub time_of_day: Option<usize>,
    pub lap_time: Option<usize>,
    pub sectors: Vec<usize>,
    pub speed: Option<usize>,
    pub speed_trap: Option<usize>,
    pub hits: Option<usize>,
    pub strength: Option<usize>,
    pub noise: Option<usize>,
}

impl ColumnMap {
    /// Resolve every known field against the table headers. Missing optional
    /// columns stay `None`; sectors stop at the first gap.
    pub fn resolve(table: &RawTable, aliases: &ColumnAliases) -> Self {
        let mut sectors = Vec::new();
        for n in 1..=MAX_SECTORS {
            match table.find_column(&aliases.sector_names(n)) {
                Some(idx) => sectors.push(idx),
                None => break,
            }
        }

        Self {
            lap_number: table.find_column(&aliases.lap_number),
            time_of_day: table.find_column(&aliases.time_of_day),
            lap_time: table.find_column(&aliases.lap_time),
            sectors,
            speed: table.find_column(&aliases.speed),
            speed_trap: table.find_column(&aliases.speed_trap),
            hits: table.find_column(&aliases.hits),
            strength: table.find_column(&aliases.strength),
            noise: table.find_column(&aliases.noise),
        }
    }

    pub fn schema(&self) -> SessionSchema {
        SessionSchema {
            sector_count: self.sectors.len(),
            has_lap_number: self.lap_number.is_some(),
            has_speed: self.speed.is_some(),
            has_speed_trap: self.speed_trap.is_some(),
            has_signal: self.hits.is_some() || self.strength.is_some() || self.noise.is_some(),
        }
    }
}

// ── BlockParser ───────────────────────────────────────────────────────────────

/// Segments a [`RawTable`] into driver blocks and normalises them.
#[derive(Debug, Clone)]
pub struct BlockParser {
    header: Regex,
    id_column: Option<String>,
    sentinel: String,
    aliases: ColumnAliases,
}

impl BlockParser {
    pub fn new(config: &IngestConfig) -> std::result::Result<Self, FormatError> {
        Ok(Self {
            header: config.header_pattern.compile()?,
            id_column: config.id_column.clone(),
            sentinel: config.no_time_sentinel.clone(),
            aliases: config.column_aliases.clone(),
        })
    }

    pub fn aliases(&self) -> &ColumnAliases {
        &self.aliases
    }

    /// Cut `table` into one block per header row, in file order.
    ///
    /// A block's body is every row strictly between its header and the next
    /// header (or the end of the table). Blank rows are dropped and blocks
    /// left with no rows are omitted.
    pub fn parse(&self, table: &RawTable) -> Result<Vec<SessionBlock>> {
        let (id_idx, id_name) = self.id_column_index(table)?;

        let header_rows: Vec<usize> = (0..table.len())
            .filter(|&row| self.header.is_match(table.cell(row, id_idx)))
            .collect();

        if header_rows.is_empty() {
            return Err(FormatError::NoHeaderRows { column: id_name }.into());
        }

        let mut blocks = Vec::with_capacity(header_rows.len());
        for (i, &start) in header_rows.iter().enumerate() {
            let end = header_rows.get(i + 1).copied().unwrap_or(table.len());
            let text = table.cell(start, id_idx);
            let parts: Vec<&str> = text.splitn(3, " - ").map(str::trim).collect();
            let [car_number, driver_name, category] = parts[..] else {
                return Err(FormatError::MalformedHeader {
                    row: start,
                    text: text.to_string(),
                }
                .into());
            };

            let rows: Vec<Vec<String>> = table.rows[start + 1..end]
                .iter()
                .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
                .cloned()
                .collect();

            if rows.is_empty() {
                debug!("Skipping empty block for '{}' at row {}", driver_name, start);
                continue;
            }

            blocks.push(SessionBlock {
                car_number: car_number.to_string(),
                driver_name: driver_name.to_string(),
                category: category.to_string(),
                header_row: start,
                rows,
            });
        }

        debug!(
            "Found {} header rows, kept {} blocks",
            header_rows.len(),
            blocks.len()
        );
        Ok(blocks)
    }

    /// Turn parsed blocks into lap records, applying the time codec per cell
    /// and the roster lookup per driver.
    pub fn normalize(
        &self,
        blocks: &[SessionBlock],
        columns: &ColumnMap,
        roster: &Roster,
    ) -> Vec<LapRecord> {
        let schema = columns.schema();
        let mut records = Vec::new();

        for block in blocks {
            let entry = roster.get(&block.driver_name);
            let car_number = entry
                .and_then(|e| e.car_number.clone())
                .unwrap_or_else(|| block.car_number.clone());
            let team = roster.team_of(&block.driver_name);
            let manufacturer = roster.manufacturer_of(&block.driver_name);

            for row in &block.rows {
                let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(String::as_str);
                let time = |idx: Option<usize>| {
                    cell(idx).and_then(|c| time_literal::parse_with_sentinel(c, &self.sentinel))
                };
                let number = |idx: Option<usize>| cell(idx).and_then(time_literal::parse_decimal);

                let signal = schema.has_signal.then(|| SignalQuality {
                    hits: number(columns.hits),
                    strength: number(columns.strength),
                    noise: number(columns.noise),
                });

                records.push(LapRecord {
                    driver_id: block.driver_name.clone(),
                    car_number: car_number.clone(),
                    category: block.category.clone(),
                    lap_number: number(columns.lap_number)
                        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                        .map(|n| n as u32),
                    time_of_day: cell(columns.time_of_day)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string),
                    lap_time: time(columns.lap_time),
                    sector_times: columns.sectors.iter().map(|&i| time(Some(i))).collect(),
                    speed: number(columns.speed),
                    speed_trap: number(columns.speed_trap),
                    signal,
                    team: team.clone(),
                    manufacturer: manufacturer.clone(),
                });
            }
        }

        records
    }

    fn id_column_index(&self, table: &RawTable) -> Result<(usize, String)> {
        match &self.id_column {
            Some(name) => table
                .column_index(name)
                .map(|idx| (idx, name.clone()))
                .ok_or_else(|| FormatError::MissingIdColumn(name.clone()).into()),
            None => table
                .headers
                .first()
                .map(|name| (0, name.clone()))
                .ok_or_else(|| FormatError::MissingIdColumn("<first column>".to_string()).into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

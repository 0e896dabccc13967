//! In-memory table model shared by raw block-level data and aggregated
//! output.
//!
//! A table carries one or two GEOID key columns (home and/or workplace, at
//! some geography level) plus the fixed job-count columns of its dataset.
//! Key column names follow the upstream conventions, e.g. `w_geoid_B` for a
//! workplace block id or `h_geoid_CT` for a home tract id.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geoid::GeographyLevel;

/// Which endpoint of a commute a key column describes. WAC tables carry
/// only `Work`, RAC only `Home`, OD both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Home,
    Work,
}

impl Role {
    pub fn prefix(self) -> &'static str {
        match self {
            Role::Home => "h",
            Role::Work => "w",
        }
    }
}

/// A GEOID key column: its role and the level its identifiers are at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColumn {
    pub role: Role,
    pub level: GeographyLevel,
}

impl KeyColumn {
    pub fn new(role: Role, level: GeographyLevel) -> Self {
        Self { role, level }
    }

    /// Column name, e.g. `h_geoid_BG`.
    pub fn name(&self) -> String {
        format!("{}_geoid_{}", self.role.prefix(), self.level.code())
    }
}

/// One table row: GEOID keys parallel to the table's key columns, job
/// counts parallel to its count columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LodesRow {
    pub keys: Vec<String>,
    pub counts: Vec<u64>,
}

/// A LODES table, either raw (block-level keys) or aggregated.
#[derive(Debug, Clone)]
pub struct LodesTable {
    pub keys: Vec<KeyColumn>,
    pub count_columns: Vec<String>,
    pub rows: Vec<LodesRow>,
}

impl LodesTable {
    pub fn new(keys: Vec<KeyColumn>, count_columns: Vec<String>) -> Self {
        Self {
            keys,
            count_columns,
            rows: Vec::new(),
        }
    }

    /// Index of the key column with the given role, if the table has one.
    pub fn key_index(&self, role: Role) -> Option<usize> {
        self.keys.iter().position(|k| k.role == role)
    }

    /// Append another table's rows; both must share this table's schema.
    pub fn extend_from(&mut self, other: LodesTable) {
        debug_assert_eq!(self.keys, other.keys);
        debug_assert_eq!(self.count_columns, other.count_columns);
        self.rows.extend(other.rows);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Write the table as CSV: key columns first, then count columns.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let header: Vec<String> = self
            .keys
            .iter()
            .map(|k| k.name())
            .chain(self.count_columns.iter().cloned())
            .collect();
        wtr.write_record(&header)?;
        for row in &self.rows {
            let record: Vec<String> = row
                .keys
                .iter()
                .cloned()
                .chain(row.counts.iter().map(|c| c.to_string()))
                .collect();
            wtr.write_record(&record)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_column_names() {
        assert_eq!(
            KeyColumn::new(Role::Work, GeographyLevel::Block).name(),
            "w_geoid_B"
        );
        assert_eq!(
            KeyColumn::new(Role::Home, GeographyLevel::Tract).name(),
            "h_geoid_CT"
        );
    }

    #[test]
    fn test_write_csv() {
        let mut table = LodesTable::new(
            vec![KeyColumn::new(Role::Work, GeographyLevel::County)],
            vec!["C000".to_string(), "CA01".to_string()],
        );
        table.rows.push(LodesRow {
            keys: vec!["06037".to_string()],
            counts: vec![12, 3],
        });

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "w_geoid_C,C000,CA01\n06037,12,3\n");
    }
}

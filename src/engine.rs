//! The geography filter & aggregation engine.
//!
//! One parameterized implementation serves all three datasets: WAC filters
//! on the workplace block, RAC on the home block, OD on either or both.
//! An area of interest may mix granularities (a whole state alongside a
//! single county); a block matches if its prefix at any of the spec's
//! levels is listed.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::geoid::{infer_level, truncate, GeographyLevel};
use crate::table::{KeyColumn, LodesRow, LodesTable, Role};

/// A caller-supplied area of interest, parsed into one id set per distinct
/// geography level.
#[derive(Debug, Clone)]
pub struct AreaSpec {
    levels: Vec<(GeographyLevel, HashSet<String>)>,
}

impl AreaSpec {
    /// Infer each id's level from its length and group the ids by level.
    /// Ids with an unrecognized length fail with `InvalidGeoId`; place and
    /// county-subdivision ids are recognized but not supported for
    /// filtering, so they fail with `InvalidParameter`.
    pub fn parse<S: AsRef<str>>(ids: &[S]) -> Result<Self> {
        let mut by_level: HashMap<GeographyLevel, HashSet<String>> = HashMap::new();
        for id in ids {
            let id = id.as_ref();
            let level = infer_level(id)?;
            if !level.is_supported() {
                return Err(Error::InvalidParameter {
                    name: "location",
                    value: id.to_string(),
                    expected: "state, county, tract, block group or block GEOIDs",
                });
            }
            by_level.entry(level).or_default().insert(id.to_string());
        }

        let mut levels: Vec<_> = by_level.into_iter().collect();
        levels.sort_by_key(|(level, _)| *level);
        Ok(Self { levels })
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Whether a 15-character block id falls inside this area: union over
    /// the spec's levels of a prefix membership test at each level.
    pub fn matches(&self, block_id: &str) -> bool {
        self.levels
            .iter()
            .any(|(level, ids)| ids.contains(&block_id[..level.prefix_len()]))
    }
}

/// Filter a block-level table by the given home/work area specs, then
/// aggregate to `level`.
///
/// With both specs present, `constrained` selects intersection semantics
/// (both endpoints inside their areas) over the default union (either
/// endpoint inside its area). At `Block` level the filtered rows are
/// returned unmodified; otherwise rows are grouped by their truncated
/// key(s) and every count column is summed. Grouped output is ordered by
/// key, since grouping itself guarantees no order.
pub(crate) fn filter_and_aggregate(
    table: LodesTable,
    home: Option<&AreaSpec>,
    work: Option<&AreaSpec>,
    constrained: bool,
    level: GeographyLevel,
) -> Result<LodesTable> {
    let home_idx = table.key_index(Role::Home);
    let work_idx = table.key_index(Role::Work);

    let rows: Vec<LodesRow> = table
        .rows
        .into_iter()
        .filter(|row| {
            let home_match = match (home, home_idx) {
                (Some(spec), Some(i)) => Some(spec.matches(&row.keys[i])),
                _ => None,
            };
            let work_match = match (work, work_idx) {
                (Some(spec), Some(i)) => Some(spec.matches(&row.keys[i])),
                _ => None,
            };
            match (home_match, work_match) {
                (Some(h), Some(w)) => {
                    if constrained {
                        h && w
                    } else {
                        h || w
                    }
                }
                (Some(h), None) => h,
                (None, Some(w)) => w,
                (None, None) => true,
            }
        })
        .collect();

    if level == GeographyLevel::Block {
        return Ok(LodesTable {
            keys: table.keys,
            count_columns: table.count_columns,
            rows,
        });
    }

    let n_counts = table.count_columns.len();
    let mut groups: BTreeMap<Vec<String>, Vec<u64>> = BTreeMap::new();
    for row in rows {
        let key: Result<Vec<String>> = row
            .keys
            .iter()
            .map(|k| truncate(k, level).map(|p| p.to_string()))
            .collect();
        let sums = groups.entry(key?).or_insert_with(|| vec![0; n_counts]);
        for (sum, count) in sums.iter_mut().zip(row.counts) {
            *sum += count;
        }
    }

    let keys: Vec<KeyColumn> = table
        .keys
        .iter()
        .map(|k| KeyColumn::new(k.role, level))
        .collect();
    let rows = groups
        .into_iter()
        .map(|(keys, counts)| LodesRow { keys, counts })
        .collect();

    Ok(LodesTable {
        keys,
        count_columns: table.count_columns,
        rows,
    })
}

//! Sparse owner × land-unit membership and the jagged output tables built on it.
//!
//! An "owner" is a country (FAO code), a trade region or a model region. Each
//! owner only carries the land units actually observed among its cells, so
//! impossible owner × unit combinations are never materialized. Inner vectors
//! are dense over crops or uses.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::error::Result;

/// Owner → ordered, deduplicated land-unit ids. Built once, then read only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Membership {
    owners: IndexMap<i32, IndexSet<u32>>,
}

impl Membership {
    /// Register `owners` up front (in order) with empty unit sets.
    pub fn with_owners(owners: impl IntoIterator<Item = i32>) -> Self {
        Self {
            owners: owners.into_iter().map(|o| (o, IndexSet::new())).collect(),
        }
    }

    /// Record that `unit` occurs in `owner`. Returns true if it was new.
    pub fn insert(&mut self, owner: i32, unit: u32) -> bool {
        self.owners.entry(owner).or_default().insert(unit)
    }

    pub fn units(&self, owner: i32) -> Option<&IndexSet<u32>> {
        self.owners.get(&owner)
    }

    pub fn contains(&self, owner: i32, unit: u32) -> bool {
        self.owners.get(&owner).is_some_and(|u| u.contains(&unit))
    }

    pub fn owners(&self) -> impl Iterator<Item = i32> + '_ {
        self.owners.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &IndexSet<u32>)> {
        self.owners.iter().map(|(o, u)| (*o, u))
    }

    /// Number of (owner, unit) pairs.
    pub fn pair_count(&self) -> usize {
        self.owners.values().map(IndexSet::len).sum()
    }

    /// Merge owners into groups. `groups` fixes the group order; owners that
    /// map to no group, or to a group outside `groups`, are dropped. Units keep
    /// first-seen order across the merged owners.
    pub fn regroup(
        &self,
        groups: impl IntoIterator<Item = i32>,
        group_of: impl Fn(i32) -> Option<i32>,
    ) -> Membership {
        let mut out = Membership::with_owners(groups);
        for (owner, units) in &self.owners {
            let Some(group) = group_of(*owner) else { continue };
            if let Some(set) = out.owners.get_mut(&group) {
                set.extend(units.iter().copied());
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
struct Block {
    units: IndexSet<u32>,
    /// Row-major `units.len() × width`.
    values: Vec<f64>,
}

/// One value vector per (owner, land unit in that owner).
#[derive(Debug, Clone)]
pub struct AggregateTable {
    width: usize,
    blocks: IndexMap<i32, Block>,
}

impl AggregateTable {
    /// All-zero table shaped by `membership`, `width` values per row.
    pub fn zeros(membership: &Membership, width: usize) -> Self {
        let blocks = membership
            .iter()
            .map(|(owner, units)| {
                let block = Block {
                    units: units.clone(),
                    values: vec![0.0; units.len() * width],
                };
                (owner, block)
            })
            .collect();
        Self { width, blocks }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, owner: i32, unit: u32) -> Option<&[f64]> {
        let block = self.blocks.get(&owner)?;
        let i = block.units.get_index_of(&unit)?;
        Some(&block.values[i * self.width..(i + 1) * self.width])
    }

    pub fn row_mut(&mut self, owner: i32, unit: u32) -> Option<&mut [f64]> {
        let width = self.width;
        let block = self.blocks.get_mut(&owner)?;
        let i = block.units.get_index_of(&unit)?;
        Some(&mut block.values[i * width..(i + 1) * width])
    }

    /// Add `amount` to column `col` of (owner, unit). Returns false when the
    /// pair is not part of the table's membership.
    pub fn add(&mut self, owner: i32, unit: u32, col: usize, amount: f64) -> bool {
        match self.row_mut(owner, unit) {
            Some(row) if col < row.len() => {
                row[col] += amount;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, owner: i32, unit: u32, col: usize) -> Option<f64> {
        self.row(owner, unit)?.get(col).copied()
    }

    /// Sum of column `col` over every land unit of `owner`.
    pub fn owner_total(&self, owner: i32, col: usize) -> f64 {
        self.blocks.get(&owner).map_or(0.0, |b| {
            b.values.chunks(self.width.max(1)).map(|r| r.get(col).copied().unwrap_or(0.0)).sum()
        })
    }

    /// Sum of column `col` over the whole table.
    pub fn column_total(&self, col: usize) -> f64 {
        self.blocks.keys().map(|&o| self.owner_total(o, col)).sum()
    }

    pub fn owners(&self) -> impl Iterator<Item = i32> + '_ {
        self.blocks.keys().copied()
    }

    /// Land units of `owner`, in membership order.
    pub fn units(&self, owner: i32) -> Option<&IndexSet<u32>> {
        self.blocks.get(&owner).map(|b| &b.units)
    }

    /// Every (owner, unit, values) row in deterministic order.
    pub fn rows(&self) -> impl Iterator<Item = (i32, u32, &[f64])> + '_ {
        self.blocks.iter().flat_map(move |(owner, block)| {
            block
                .units
                .iter()
                .enumerate()
                .map(move |(i, unit)| (*owner, *unit, &block.values[i * self.width..(i + 1) * self.width]))
        })
    }

    pub fn row_count(&self) -> usize {
        self.blocks.values().map(|b| b.units.len()).sum()
    }

    /// Sum rows into coarser owners (e.g. countries into model regions).
    pub fn regroup(
        &self,
        groups: impl IntoIterator<Item = i32>,
        group_of: impl Fn(i32) -> Option<i32>,
    ) -> AggregateTable {
        let membership = self.membership().regroup(groups, &group_of);
        let mut out = AggregateTable::zeros(&membership, self.width);
        for (owner, unit, values) in self.rows() {
            let Some(group) = group_of(owner) else { continue };
            if let Some(dst) = out.row_mut(group, unit) {
                for (d, v) in dst.iter_mut().zip(values) {
                    *d += v;
                }
            }
        }
        out
    }

    /// The membership this table is shaped by.
    pub fn membership(&self) -> Membership {
        Membership {
            owners: self.blocks.iter().map(|(o, b)| (*o, b.units.clone())).collect(),
        }
    }
}

/// One line of the country → land unit mapping output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingRow {
    pub country: i32,
    pub iso: String,
    pub land_unit: u32,
    pub land_unit_name: String,
}

/// Description of an emitted aggregate table.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub name: String,
    /// Header label of the owner column ("fao_code", "ctry87", "region").
    pub owner_label: String,
    /// One header label per value column.
    pub columns: Vec<String>,
}

/// The "emit table" capability the pipeline hands its outputs to.
pub trait TableSink {
    fn emit_aggregate(&mut self, meta: &TableMeta, table: &AggregateTable) -> Result<()>;
    fn emit_mapping(&mut self, name: &str, rows: &[MappingRow]) -> Result<()>;
}

/// Keeps emitted tables in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub aggregates: IndexMap<String, (TableMeta, AggregateTable)>,
    pub mappings: IndexMap<String, Vec<MappingRow>>,
}

impl TableSink for MemorySink {
    fn emit_aggregate(&mut self, meta: &TableMeta, table: &AggregateTable) -> Result<()> {
        self.aggregates.insert(meta.name.clone(), (meta.clone(), table.clone()));
        Ok(())
    }

    fn emit_mapping(&mut self, name: &str, rows: &[MappingRow]) -> Result<()> {
        self.mappings.insert(name.to_string(), rows.to_vec());
        Ok(())
    }
}

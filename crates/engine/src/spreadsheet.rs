//! The cell store and its mutation transaction.
//!
//! `Spreadsheet` owns the cells, the dependency graph, and the
//! host-supplied name rules. Every mutation is one atomic transaction:
//! classify the input, rewrite the changed cell's dependee edges, order
//! the affected cells, and either evaluate them all or roll the edges
//! and the cell back to exactly their pre-call state.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellContents, CellValue};
use crate::dep_graph::DependencyGraph;
use crate::formula::parser::{self, Formula, FormulaFormatError};
use crate::recalc::{self, CycleError};

/// Rule applied to every cell and variable name before storage/lookup.
pub type Normalizer = Box<dyn Fn(&str) -> String>;

/// Post-normalization predicate rejecting names the host won't allow
/// (e.g. restricting to an `A1`-style grid address space).
pub type Validator = Box<dyn Fn(&str) -> bool>;

/// Errors raised by spreadsheet operations.
///
/// `FormulaError` values are deliberately absent: those are stored as
/// cell values and never raised.
#[derive(Debug, Clone)]
pub enum SpreadsheetError {
    /// A cell name failed syntax or the host's validity predicate.
    InvalidName(String),

    /// A formula string failed grammar or variable validation. Nothing
    /// was mutated.
    FormulaFormat(FormulaFormatError),

    /// The mutation would have created a circular dependency. It was
    /// rolled back in full before this was raised.
    CircularDependency(CycleError),
}

impl fmt::Display for SpreadsheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpreadsheetError::InvalidName(name) => write!(f, "invalid cell name '{}'", name),
            SpreadsheetError::FormulaFormat(e) => write!(f, "{}", e),
            SpreadsheetError::CircularDependency(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SpreadsheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpreadsheetError::InvalidName(_) => None,
            SpreadsheetError::FormulaFormat(e) => Some(e),
            SpreadsheetError::CircularDependency(e) => Some(e),
        }
    }
}

impl From<FormulaFormatError> for SpreadsheetError {
    fn from(e: FormulaFormatError) -> Self {
        SpreadsheetError::FormulaFormat(e)
    }
}

impl From<CycleError> for SpreadsheetError {
    fn from(e: CycleError) -> Self {
        SpreadsheetError::CircularDependency(e)
    }
}

/// The narrow save/load surface handed to a persistence collaborator:
/// a version tag plus every non-empty cell's raw string contents.
///
/// `BTreeMap` keeps serialized output stable across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    pub version: String,
    pub cells: BTreeMap<String, String>,
}

/// A spreadsheet: named cells, their cached values, and the dependency
/// graph that keeps formula cells consistent under edits.
///
/// Single-threaded and synchronous. A concurrent host must serialize
/// calls into this store itself.
pub struct Spreadsheet {
    cells: FxHashMap<String, Cell>,
    graph: DependencyGraph,
    normalize: Normalizer,
    is_valid: Validator,
}

impl Default for Spreadsheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Spreadsheet {
    /// Spreadsheet with identity normalization and no extra name rules.
    pub fn new() -> Self {
        Self::with_rules(Box::new(|s| s.to_string()), Box::new(|_| true))
    }

    /// Spreadsheet with host-supplied name rules. `normalize` is applied
    /// to every cell and variable name before storage or lookup;
    /// `is_valid` then accepts or rejects the normalized name. Both must
    /// be pure.
    pub fn with_rules(normalize: Normalizer, is_valid: Validator) -> Self {
        Self {
            cells: FxHashMap::default(),
            graph: DependencyGraph::new(),
            normalize,
            is_valid,
        }
    }

    /// Set `name`'s contents from raw text and recalculate everything
    /// affected.
    ///
    /// Classification: text parseable as a double becomes a number, a
    /// leading `=` marks a formula (parsed and validated here, against
    /// the same name rules), anything else is text — including the
    /// empty string, which empties the cell.
    ///
    /// Returns the affected cells in evaluation order, `name` first,
    /// followed by its transitive dependents. On a circular dependency
    /// the edges and the cell are restored exactly and the error is
    /// raised; on a formula format error nothing had been changed yet.
    pub fn set_contents_of_cell(
        &mut self,
        name: &str,
        content: &str,
    ) -> Result<Vec<String>, SpreadsheetError> {
        let name = self.check_name(name)?;

        let contents = if let Ok(number) = content.parse::<f64>() {
            CellContents::Number(number)
        } else if let Some(body) = content.strip_prefix('=') {
            let formula = Formula::parse(body, &self.normalize, &self.is_valid)?;
            CellContents::Formula(formula)
        } else {
            CellContents::Text(content.to_string())
        };

        self.apply(name, contents)
    }

    /// Raw, unevaluated contents. A cell that was never assigned reads
    /// as empty text.
    pub fn get_cell_contents(&self, name: &str) -> Result<CellContents, SpreadsheetError> {
        let name = self.check_name(name)?;
        Ok(self
            .cells
            .get(&name)
            .map(|cell| cell.contents.clone())
            .unwrap_or_else(|| CellContents::Text(String::new())))
    }

    /// Cached value as of the most recent successful mutation touching
    /// this cell. A cell that was never assigned reads as empty text;
    /// reads never mutate or recalculate.
    pub fn get_cell_value(&self, name: &str) -> Result<CellValue, SpreadsheetError> {
        let name = self.check_name(name)?;
        Ok(self
            .cells
            .get(&name)
            .map(|cell| cell.value.clone())
            .unwrap_or_else(|| CellValue::Text(String::new())))
    }

    /// Names of every cell whose contents are non-empty. No ordering
    /// guarantee.
    pub fn names_of_nonempty_cells(&self) -> impl Iterator<Item = &str> + '_ {
        self.cells
            .iter()
            .filter(|(_, cell)| !cell.contents.is_empty())
            .map(|(name, _)| name.as_str())
    }

    /// The dependency graph, for inspection.
    pub fn dep_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Export for the persistence collaborator: a version tag plus each
    /// non-empty cell's raw string form.
    pub fn snapshot(&self, version: impl Into<String>) -> SheetSnapshot {
        let cells = self
            .cells
            .iter()
            .filter(|(_, cell)| !cell.contents.is_empty())
            .map(|(name, cell)| (name.clone(), cell.contents.to_input_string()))
            .collect();
        SheetSnapshot {
            version: version.into(),
            cells,
        }
    }

    /// Rebuild a spreadsheet by replaying a snapshot through
    /// `set_contents_of_cell`. Replay order does not matter: values are
    /// recalculated as each cell lands, and corrupt input surfaces as
    /// the usual format, name, or cycle errors.
    pub fn from_snapshot(
        snapshot: &SheetSnapshot,
        normalize: Normalizer,
        is_valid: Validator,
    ) -> Result<Self, SpreadsheetError> {
        let mut sheet = Self::with_rules(normalize, is_valid);
        for (name, raw) in &snapshot.cells {
            sheet.set_contents_of_cell(name, raw)?;
        }
        Ok(sheet)
    }

    /// Normalize a name and check it against cell-name syntax and the
    /// host's validity predicate.
    fn check_name(&self, name: &str) -> Result<String, SpreadsheetError> {
        let normalized = (self.normalize)(name);
        if !parser::is_legal_name(&normalized) || !(self.is_valid)(&normalized) {
            return Err(SpreadsheetError::InvalidName(normalized));
        }
        Ok(normalized)
    }

    /// The prepare / validate / commit-or-revert transaction behind
    /// every mutation.
    fn apply(
        &mut self,
        name: String,
        contents: CellContents,
    ) -> Result<Vec<String>, SpreadsheetError> {
        // Snapshot for rollback.
        let old_dependees: Vec<String> = self.graph.dependees(&name).map(str::to_string).collect();
        let old_cell = self.cells.get(&name).cloned();

        // Rewrite this cell's dependee edges from its new contents:
        // a formula's variable set, or nothing for numbers and text.
        let new_dependees: Vec<String> = match &contents {
            CellContents::Formula(f) => f.variables().map(str::to_string).collect(),
            CellContents::Number(_) | CellContents::Text(_) => Vec::new(),
        };
        self.graph.replace_dependees(&name, new_dependees);
        self.cells.insert(name.clone(), Cell::new(contents));

        match recalc::recalc_order(&self.graph, &name) {
            Ok(order) => {
                self.evaluate_in_order(&order);
                Ok(order)
            }
            Err(cycle) => {
                // Full rollback: the edges, then the cell itself. A cell
                // created by this very call is removed again.
                self.graph.replace_dependees(&name, old_dependees);
                match old_cell {
                    Some(cell) => {
                        self.cells.insert(name, cell);
                    }
                    None => {
                        self.cells.remove(&name);
                    }
                }
                Err(SpreadsheetError::CircularDependency(cycle))
            }
        }
    }

    /// Re-evaluate every formula cell in `order`, reading dependency
    /// values from cells already updated earlier in the same pass.
    /// Non-formula cells keep their stored value.
    fn evaluate_in_order(&mut self, order: &[String]) {
        for name in order {
            let Some(cell) = self.cells.get(name) else {
                // Referenced-but-never-assigned dependents of the walk
                // cannot occur; dependents always hold formulas. Still,
                // skipping is the safe answer.
                continue;
            };
            let CellContents::Formula(formula) = &cell.contents else {
                continue;
            };

            let value = match formula
                .evaluate(|var| self.cells.get(var).and_then(|c| c.value.as_number()))
            {
                Ok(n) => CellValue::Number(n),
                Err(e) => CellValue::Error(e),
            };

            if let Some(cell) = self.cells.get_mut(name) {
                cell.value = value;
            }
        }
    }
}

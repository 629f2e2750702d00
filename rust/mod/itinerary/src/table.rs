//! Itinerary table: the row-block model.
//!
//! Rows live in one ordered `Vec`, addressed by position or by a stable
//! [`RowId`]. A block is not stored separately: it is the contiguous run of
//! rows sharing one [`BlockId`], produced by expanding one selected sales
//! order into one row per job.
//!
//! ```text
//! pos  block        SO     description  address
//!  0   -            -      -            -          <- placeholder
//!  1   block-PK-1   SO-1   A            1 Pier Rd  <- header
//!  2   block-PK-1          B                       <- member
//!  3   block-PK-1          C                       <- member
//! ```
//!
//! Invariants (checked by [`ItineraryTable::validate`]):
//! - rows of a block are contiguous and a block never has zero rows;
//! - only the first row of a block carries header fields (SO, address,
//!   contact, driver note).

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use itinerary_core::ServiceError;

use crate::model::{HeaderContext, JobDetail, SalesOrderSummary};

/// Text of the SO cell of a row that has no sales order yet.
pub const SELECT_PROMPT: &str = "Click to select";

/// Fixed signature cell carried by block rows.
pub const SIGNATURE_LINE: &str = "_______________________";

/// Number of free-text trailing cells per row.
pub const EXTRA_CELLS: usize = 4;

/// Column headers, in cell order.
pub const COLUMNS: [&str; 11] = [
    "SO No.",
    "Driver's Note",
    "Description",
    "Address",
    "Delivery Date",
    "Contact Person",
    "Time In",
    "Time Out",
    "Received By",
    "Remarks",
    "Signature",
];

/// Stable row identity within one table.
pub type RowId = u64;

// ---------------------------------------------------------------------------
// BlockId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Display cells of one itinerary row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowCells {
    pub so_id: String,
    pub driver_note: String,
    pub description: String,
    pub address: String,
    pub delivery_date: String,
    pub contact_name: String,
    pub extra: [String; EXTRA_CELLS],
    pub signature: String,
}

impl RowCells {
    /// Whether any header-only field is set.
    pub fn has_header_fields(&self) -> bool {
        !(self.so_id.is_empty()
            && self.address.is_empty()
            && self.contact_name.is_empty()
            && self.driver_note.is_empty())
    }

    fn clear_header_fields(&mut self) {
        self.so_id.clear();
        self.address.clear();
        self.contact_name.clear();
        self.driver_note.clear();
    }

    /// Reset every data cell. The signature line is fixed content, not data.
    fn reset(&mut self) {
        let signature = std::mem::take(&mut self.signature);
        *self = RowCells {
            signature,
            ..RowCells::default()
        };
    }

    fn is_blank(&self) -> bool {
        *self
            == RowCells {
                signature: self.signature.clone(),
                ..RowCells::default()
            }
    }

    /// Cell values in [`COLUMNS`] order.
    pub fn values(&self) -> [&str; 11] {
        [
            self.so_id.as_str(),
            self.driver_note.as_str(),
            self.description.as_str(),
            self.address.as_str(),
            self.delivery_date.as_str(),
            self.contact_name.as_str(),
            self.extra[0].as_str(),
            self.extra[1].as_str(),
            self.extra[2].as_str(),
            self.extra[3].as_str(),
            self.signature.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: RowId,
    pub block_id: Option<BlockId>,
    pub cells: RowCells,
}

/// Where a row stands in the block bookkeeping.
///
/// ```text
/// Placeholder ──insert_block──▶ BlockHeader | BlockMember ──delete──▶ (gone)
/// Standalone  ──clear_row────▶ Placeholder content (same identity)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowRole {
    Placeholder,
    Standalone,
    BlockHeader,
    BlockMember,
}

/// Free-text edits a dispatcher may make on a row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPatch {
    #[serde(default)]
    pub driver_note: Option<String>,
    /// Trailing cells, in order; shorter lists leave the rest untouched.
    #[serde(default)]
    pub extra: Option<Vec<String>>,
}

/// A view of one block: its id, starting position and rows.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    pub id: &'a BlockId,
    pub start: usize,
    pub rows: &'a [Row],
}

impl Block<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self) -> &Row {
        &self.rows[0]
    }

    pub fn descriptions(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.cells.description.as_str()).collect()
    }
}

/// Result of [`ItineraryTable::delete_row`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteOutcome {
    /// A row outside any block was removed.
    Removed,
    /// The block lost one row; per-job fields shifted up.
    Shifted { block_id: BlockId, remaining: usize },
    /// The block's only row was removed; the block no longer exists.
    BlockRemoved { block_id: BlockId },
    /// Confirmation was declined; nothing changed.
    Declined,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TableError {
    #[error("row {0} not found")]
    RowNotFound(RowId),

    #[error("position {position} is past the end of a {len}-row table")]
    PositionOutOfRange { position: usize, len: usize },

    #[error("row at position {position} belongs to block {block_id}")]
    TargetInBlock { position: usize, block_id: BlockId },

    #[error("row {0} is not a block header; only headers carry a driver note")]
    HeaderFieldOnMember(RowId),

    #[error("too many trailing cells: {0}, at most {max}", max = EXTRA_CELLS)]
    TooManyCells(usize),

    /// A block invariant no longer holds.
    #[error("inconsistent table: {0}")]
    Inconsistent(String),
}

impl From<TableError> for ServiceError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::RowNotFound(_) => ServiceError::NotFound(err.to_string()),
            TableError::Inconsistent(_) => ServiceError::Internal(err.to_string()),
            _ => ServiceError::Validation(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only copy of the table for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot {
    pub rows: Vec<RowView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub id: RowId,
    pub block_id: Option<BlockId>,
    pub role: RowRole,
    pub cells: RowCells,
}

// ---------------------------------------------------------------------------
// ItineraryTable
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ItineraryTable {
    rows: Vec<Row>,
    next_row_id: RowId,
    next_auto_block: u64,
    /// Every block id handed out, including blocks since deleted.
    issued_blocks: HashSet<BlockId>,
}

impl ItineraryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table of `n` placeholder rows.
    pub fn with_placeholders(n: usize) -> Self {
        let mut table = Self::new();
        for _ in 0..n {
            table.add_row();
        }
        table
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn position(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    /// Role of the row at `position`.
    pub fn role_at(&self, position: usize) -> Option<RowRole> {
        let row = self.rows.get(position)?;
        let role = match &row.block_id {
            None if row.cells.is_blank() => RowRole::Placeholder,
            None => RowRole::Standalone,
            Some(block_id) => {
                let first = position == 0 || self.rows[position - 1].block_id.as_ref() != Some(block_id);
                if first {
                    RowRole::BlockHeader
                } else {
                    RowRole::BlockMember
                }
            }
        };
        Some(role)
    }

    /// Append a placeholder row.
    pub fn add_row(&mut self) -> RowId {
        let id = self.allocate_row_id();
        self.rows.push(Row {
            id,
            block_id: None,
            cells: RowCells::default(),
        });
        id
    }

    /// Apply free-text edits. A driver note may only go on a block header or
    /// a row outside any block.
    pub fn edit_row(&mut self, id: RowId, patch: &RowPatch) -> Result<(), TableError> {
        let pos = self.position(id).ok_or(TableError::RowNotFound(id))?;

        if let Some(extra) = &patch.extra {
            if extra.len() > EXTRA_CELLS {
                return Err(TableError::TooManyCells(extra.len()));
            }
        }
        if patch.driver_note.is_some() && self.role_at(pos) == Some(RowRole::BlockMember) {
            return Err(TableError::HeaderFieldOnMember(id));
        }

        let cells = &mut self.rows[pos].cells;
        if let Some(note) = &patch.driver_note {
            cells.driver_note = note.clone();
        }
        if let Some(extra) = &patch.extra {
            for (slot, value) in cells.extra.iter_mut().zip(extra) {
                *slot = value.clone();
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    fn block_range(&self, block_id: &BlockId) -> Option<Range<usize>> {
        let start = self
            .rows
            .iter()
            .position(|r| r.block_id.as_ref() == Some(block_id))?;
        let len = self.rows[start..]
            .iter()
            .take_while(|r| r.block_id.as_ref() == Some(block_id))
            .count();
        Some(start..start + len)
    }

    pub fn block(&self, block_id: &BlockId) -> Option<Block<'_>> {
        let range = self.block_range(block_id)?;
        let rows = &self.rows[range.clone()];
        Some(Block {
            id: rows[0].block_id.as_ref()?,
            start: range.start,
            rows,
        })
    }

    /// All blocks, in table order.
    pub fn blocks(&self) -> Vec<Block<'_>> {
        let mut blocks = Vec::new();
        let mut pos = 0;
        while pos < self.rows.len() {
            let Some(block_id) = &self.rows[pos].block_id else {
                pos += 1;
                continue;
            };
            let len = self.rows[pos..]
                .iter()
                .take_while(|r| r.block_id.as_ref() == Some(block_id))
                .count();
            blocks.push(Block {
                id: block_id,
                start: pos,
                rows: &self.rows[pos..pos + len],
            });
            pos += len;
        }
        blocks
    }

    /// Expand one sales order into a block of `max(1, jobs.len())` rows.
    ///
    /// The row at `position` (a placeholder or standalone row) is replaced;
    /// `position == len()` appends instead. Row 0 of the block carries the
    /// header fields and the first job; later rows carry only their job's
    /// description and delivery date.
    pub fn insert_block(
        &mut self,
        position: usize,
        order: &SalesOrderSummary,
        header: &HeaderContext,
        jobs: &[JobDetail],
    ) -> Result<BlockId, TableError> {
        if position > self.rows.len() {
            return Err(TableError::PositionOutOfRange {
                position,
                len: self.rows.len(),
            });
        }
        if let Some(block_id) = self.rows.get(position).and_then(|r| r.block_id.clone()) {
            return Err(TableError::TargetInBlock { position, block_id });
        }

        let block_id = self.allocate_block_id(order);
        let n = jobs.len().max(1);

        let mut block = Vec::with_capacity(n);
        for i in 0..n {
            let job = jobs.get(i);
            let mut cells = RowCells {
                description: job.map(|j| j.description.clone()).unwrap_or_default(),
                delivery_date: job.map(|j| j.delivery_date.clone()).unwrap_or_default(),
                signature: SIGNATURE_LINE.to_string(),
                ..RowCells::default()
            };
            if i == 0 {
                cells.so_id = order.order_key.clone();
                cells.address = header.address.clone();
                cells.contact_name = header.contact_name.clone();
            }
            block.push(Row {
                id: self.allocate_row_id(),
                block_id: Some(block_id.clone()),
                cells,
            });
        }

        let replaced = if position < self.rows.len() { 1 } else { 0 };
        self.rows.splice(position..position + replaced, block);

        debug_assert!(self.validate().is_ok(), "{:?}", self.validate());
        Ok(block_id)
    }

    /// [`insert_block`](Self::insert_block) addressed by row id. Returns
    /// `Ok(None)` when the target row no longer exists: a selection that
    /// resolves after its row was deleted is dropped.
    pub fn insert_block_at_row(
        &mut self,
        target: RowId,
        order: &SalesOrderSummary,
        header: &HeaderContext,
        jobs: &[JobDetail],
    ) -> Result<Option<BlockId>, TableError> {
        let Some(position) = self.position(target) else {
            return Ok(None);
        };
        self.insert_block(position, order, header, jobs).map(Some)
    }

    /// Remove one row.
    ///
    /// - Outside a block: removed unconditionally.
    /// - Only row of its block: removed if `confirm` agrees, else no-op.
    /// - Otherwise the description and delivery date of every row from the
    ///   deleted one to the block's end move up one slot and the block's last
    ///   row is dropped. Deleting the header clears its header fields instead
    ///   of handing them to the next row.
    pub fn delete_row<F>(&mut self, id: RowId, confirm: F) -> Result<DeleteOutcome, TableError>
    where
        F: FnOnce(&Row) -> bool,
    {
        let pos = self.position(id).ok_or(TableError::RowNotFound(id))?;
        let Some(block_id) = self.rows[pos].block_id.clone() else {
            self.rows.remove(pos);
            return Ok(DeleteOutcome::Removed);
        };
        let range = self
            .block_range(&block_id)
            .ok_or(TableError::RowNotFound(id))?;

        if range.len() == 1 {
            if !confirm(&self.rows[pos]) {
                return Ok(DeleteOutcome::Declined);
            }
            self.rows.remove(pos);
            return Ok(DeleteOutcome::BlockRemoved { block_id });
        }

        for i in pos..range.end - 1 {
            let next = &mut self.rows[i + 1].cells;
            let description = std::mem::take(&mut next.description);
            let delivery_date = std::mem::take(&mut next.delivery_date);
            let cells = &mut self.rows[i].cells;
            cells.description = description;
            cells.delivery_date = delivery_date;
        }
        if pos == range.start {
            self.rows[pos].cells.clear_header_fields();
        }
        self.rows.remove(range.end - 1);

        debug_assert!(self.validate().is_ok(), "{:?}", self.validate());
        Ok(DeleteOutcome::Shifted {
            block_id,
            remaining: range.len() - 1,
        })
    }

    /// Remove every row of the block `id` belongs to, in one step. A row
    /// outside any block is removed alone. Returns the removed rows.
    pub fn delete_block(&mut self, id: RowId) -> Result<Vec<Row>, TableError> {
        let pos = self.position(id).ok_or(TableError::RowNotFound(id))?;
        let Some(block_id) = self.rows[pos].block_id.clone() else {
            return Ok(vec![self.rows.remove(pos)]);
        };
        let range = self
            .block_range(&block_id)
            .ok_or(TableError::RowNotFound(id))?;
        Ok(self.rows.drain(range).collect())
    }

    /// Reset a row's data cells. Block membership and sibling rows are untouched.
    pub fn clear_row(&mut self, id: RowId) -> Result<(), TableError> {
        let pos = self.position(id).ok_or(TableError::RowNotFound(id))?;
        self.rows[pos].cells.reset();
        Ok(())
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(pos, row)| RowView {
                id: row.id,
                block_id: row.block_id.clone(),
                role: self.role_at(pos).unwrap_or(RowRole::Standalone),
                cells: row.cells.clone(),
            })
            .collect();
        TableSnapshot { rows }
    }

    /// Distinct non-empty SO identifiers, in table order.
    pub fn order_keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .map(|r| r.cells.so_id.trim())
            .filter(|k| !k.is_empty() && seen.insert(k.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Check the block invariants.
    pub fn validate(&self) -> Result<(), TableError> {
        let mut closed: HashSet<&BlockId> = HashSet::new();
        let mut ids = HashSet::new();
        let mut current: Option<&BlockId> = None;

        for (pos, row) in self.rows.iter().enumerate() {
            if !ids.insert(row.id) {
                return Err(TableError::Inconsistent(format!("duplicate row id {}", row.id)));
            }
            let block_id = row.block_id.as_ref();
            if block_id != current {
                if let Some(prev) = current {
                    closed.insert(prev);
                }
                if let Some(b) = block_id {
                    if closed.contains(b) {
                        return Err(TableError::Inconsistent(format!(
                            "block {} is not contiguous (position {})",
                            b, pos
                        )));
                    }
                }
                current = block_id;
            } else if block_id.is_some() && row.cells.has_header_fields() {
                return Err(TableError::Inconsistent(format!(
                    "non-header row at position {} carries header fields",
                    pos
                )));
            }
        }
        Ok(())
    }

    fn allocate_row_id(&mut self) -> RowId {
        self.next_row_id += 1;
        self.next_row_id
    }

    /// `block-{primaryKey}`, or `block-auto-{n}` without a key; suffixed
    /// with `-{n}` when that id was already issued by this table.
    fn allocate_block_id(&mut self, order: &SalesOrderSummary) -> BlockId {
        let base = match order.detail_key() {
            Some(pk) => format!("block-{}", pk),
            None => {
                self.next_auto_block += 1;
                format!("block-auto-{}", self.next_auto_block)
            }
        };

        let mut candidate = BlockId(base.clone());
        let mut n = 2;
        while self.issued_blocks.contains(&candidate) {
            candidate = BlockId(format!("{}-{}", base, n));
            n += 1;
        }
        self.issued_blocks.insert(candidate.clone());
        candidate
    }
}

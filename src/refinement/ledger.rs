// Iteration ledger: append-only history of refinement rounds

use super::types::IterationRecord;

/// Append-only record of each round, capped at the iteration budget.
#[derive(Debug, Clone)]
pub struct IterationLedger {
    records: Vec<IterationRecord>,
    capacity: usize,
}

impl IterationLedger {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a finished record.
    ///
    /// Returns the record back if the ledger is already full.
    pub fn append(&mut self, record: IterationRecord) -> Result<(), IterationRecord> {
        if self.records.len() >= self.capacity {
            return Err(record);
        }
        self.records.push(record);
        Ok(())
    }

    /// Score of the most recent round, or 0 when nothing has run yet
    pub fn last_score(&self) -> u8 {
        self.records.last().map(|r| r.score).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn into_records(self) -> Vec<IterationRecord> {
        self.records
    }
}

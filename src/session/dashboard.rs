//! Manager dashboard view-model.
//!
//! Holds the last successfully ranked fetch. Each fetch gets a generation
//! number; a result that comes back after a newer fetch started is dropped,
//! and a failed fetch leaves the previous rows in place.

use tracing::{debug, error};

use crate::calculate;
use crate::error::KpiError;
use crate::models::{DateRange, EnrichedRecord, ManagerIdentity, RankedResult, RawRecord};
use crate::storage::StoreError;

/// Handed out when a fetch starts and returned with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    range: DateRange,
}

impl FetchTicket {
    pub fn range(&self) -> &DateRange {
        &self.range
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer fetch started meanwhile; this one was ignored.
    Superseded,
}

#[derive(Debug, Clone)]
pub struct DashboardView {
    manager: ManagerIdentity,
    latest_generation: u64,
    current: RankedResult,
    range: DateRange,
}

impl DashboardView {
    pub fn new(manager: ManagerIdentity) -> Self {
        Self {
            manager,
            latest_generation: 0,
            current: RankedResult::default(),
            range: DateRange::unbounded(),
        }
    }

    pub fn manager(&self) -> &ManagerIdentity {
        &self.manager
    }

    /// Ranked rows currently on screen.
    pub fn current(&self) -> &RankedResult {
        &self.current
    }

    pub fn rows(&self) -> &[EnrichedRecord] {
        &self.current.rows
    }

    /// Range of the rows currently on screen.
    pub fn range(&self) -> &DateRange {
        &self.range
    }

    pub fn begin_fetch(&mut self, range: DateRange) -> FetchTicket {
        self.latest_generation += 1;
        FetchTicket {
            generation: self.latest_generation,
            range,
        }
    }

    /// Rank and apply a fetch result if it is still the newest one.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<Vec<RawRecord>, StoreError>,
    ) -> Result<FetchOutcome, KpiError> {
        if ticket.generation != self.latest_generation {
            debug!(
                "Dropping dashboard fetch {} (latest is {})",
                ticket.generation, self.latest_generation
            );
            return Ok(FetchOutcome::Superseded);
        }

        let records = outcome.map_err(|e| {
            error!("Dashboard fetch for {} failed: {}", self.manager.name, e);
            KpiError::Fetch(e)
        })?;

        self.current = calculate::rank_in(&records, &ticket.range);
        self.range = ticket.range;
        debug!(
            "Dashboard for {} now shows {} rows",
            self.manager.name,
            self.current.rows.len()
        );
        Ok(FetchOutcome::Applied)
    }
}

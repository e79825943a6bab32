use crate::error::{DataSourceError, Error, LedgerError};
use crate::ledger::{Ledger, Purchase};
use crate::price_table::PriceTable;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// State of one user session: the current price table and the ledger.
///
/// Nothing else in the program holds mutable trading state.
#[derive(Debug)]
pub struct Session {
    source: PathBuf,
    table: PriceTable,
    ledger: Ledger,
}

/// What changed in the group set after a reload.
#[derive(Debug, Default, PartialEq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub dropped: Vec<(String, u64)>,
}

impl Session {
    pub fn open(source: impl Into<PathBuf>, starting_balance: f64) -> Result<Session, Error> {
        let source = source.into();
        let table = PriceTable::from_file(&source)?;
        Self::from_table(source, table, starting_balance).map_err(Error::from)
    }

    pub fn from_table(
        source: impl Into<PathBuf>,
        table: PriceTable,
        starting_balance: f64,
    ) -> Result<Session, LedgerError> {
        let ledger = Ledger::new(starting_balance, table.groups())?;
        Ok(Session {
            source: source.into(),
            table,
            ledger,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn balance(&self) -> f64 {
        self.ledger.balance()
    }

    pub fn current_price(&self, group: &str) -> Result<f64, LedgerError> {
        self.table
            .latest_price(group)
            .ok_or_else(|| LedgerError::UnknownGroup(group.to_string()))
    }

    pub fn execute_purchase(&mut self, group: &str, quantity: u64) -> Result<Purchase, LedgerError> {
        let price = self.current_price(group)?;
        self.ledger.execute_purchase(group, quantity, price)
    }

    /// Non-zero holdings in column order.
    pub fn non_zero_holdings(&self) -> Vec<(&str, u64)> {
        self.table
            .groups()
            .iter()
            .map(|g| (g.as_str(), self.ledger.holding(g)))
            .filter(|(_, quantity)| *quantity > 0)
            .collect()
    }

    /// Market value of all holdings at latest prices.
    pub fn holdings_value(&self) -> f64 {
        self.ledger
            .holdings()
            .iter()
            .map(|(group, quantity)| {
                *quantity as f64 * self.table.latest_price(group).unwrap_or(0.0)
            })
            .sum()
    }

    pub fn net_worth(&self) -> f64 {
        self.balance() + self.holdings_value()
    }

    /// Re-reads the source file.
    ///
    /// On failure the current table stays in place. The balance is never
    /// touched.
    pub fn reload(&mut self) -> Result<ReloadSummary, DataSourceError> {
        let table = PriceTable::from_file(&self.source)?;
        Ok(self.replace_table(table))
    }

    pub fn replace_table(&mut self, table: PriceTable) -> ReloadSummary {
        let added: Vec<String> = table
            .groups()
            .iter()
            .filter(|g| !self.table.has_group(g))
            .cloned()
            .collect();
        let dropped = self.ledger.sync_groups(table.groups());
        for (group, quantity) in &dropped {
            warn!(group = %group, quantity, "group no longer in price table, holding dropped");
        }
        self.table = table;
        info!(added = ?added, "price table replaced");
        ReloadSummary { added, dropped }
    }
}

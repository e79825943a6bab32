use crate::error::DataSourceError;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, info};

/// Price history loaded from a CSV file.
///
/// Column 0 holds the period labels, every other column is a group. Prices are
/// stored row-major in file order. A loaded table always has at least one
/// period and one group.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    period_column: String,
    periods: Vec<String>,
    groups: Vec<String>,
    prices: Vec<Vec<f64>>,
}

impl PriceTable {
    pub fn from_file(path: impl AsRef<Path>) -> Result<PriceTable, DataSourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DataSourceError::NotFound {
                path: path.to_path_buf(),
            },
            _ => DataSourceError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let table = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            periods = table.periods.len(),
            groups = table.groups.len(),
            "loaded price table"
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<PriceTable, DataSourceError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut header_iter = headers.iter();
        let period_column = match header_iter.next() {
            Some(h) => h.to_string(),
            None => return Err(DataSourceError::MissingHeader),
        };

        let mut groups = Vec::new();
        let mut seen_groups = HashSet::new();
        for (i, name) in header_iter.enumerate() {
            if name.is_empty() {
                return Err(DataSourceError::EmptyGroupName { column: i + 1 });
            }
            if !seen_groups.insert(name) {
                return Err(DataSourceError::DuplicateGroup(name.to_string()));
            }
            groups.push(name.to_string());
        }
        if groups.is_empty() {
            return Err(DataSourceError::NoGroups);
        }

        let expected = groups.len() + 1;
        let mut periods = Vec::new();
        let mut prices = Vec::new();
        let mut seen_periods = HashSet::new();

        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            if record.len() != expected {
                return Err(DataSourceError::RowLength {
                    line,
                    expected,
                    found: record.len(),
                });
            }

            let period = record.get(0).unwrap_or_default();
            if period.is_empty() {
                return Err(DataSourceError::EmptyPeriod { line });
            }
            if !seen_periods.insert(period.to_string()) {
                return Err(DataSourceError::DuplicatePeriod(period.to_string()));
            }

            let mut row = Vec::with_capacity(groups.len());
            for (group, cell) in groups.iter().zip(record.iter().skip(1)) {
                row.push(parse_price(cell, line, group)?);
            }

            periods.push(period.to_string());
            prices.push(row);
        }

        if periods.is_empty() {
            return Err(DataSourceError::NoPeriods);
        }

        debug!(?groups, "parsed price table header");

        Ok(PriceTable {
            period_column,
            periods,
            groups,
            prices,
        })
    }

    /// Header text of the period column, e.g. "Week".
    pub fn period_column(&self) -> &str {
        &self.period_column
    }

    pub fn periods(&self) -> &[String] {
        &self.periods
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.group_index(group).is_some()
    }

    fn group_index(&self, group: &str) -> Option<usize> {
        self.groups.iter().position(|g| g == group)
    }

    /// Price of `group` in the period at `period_index`.
    pub fn price(&self, period_index: usize, group: &str) -> Option<f64> {
        let column = self.group_index(group)?;
        self.prices.get(period_index).map(|row| row[column])
    }

    pub fn latest_price(&self, group: &str) -> Option<f64> {
        self.price(self.periods.len() - 1, group)
    }

    /// Price in the period before the last one, if there is one.
    pub fn previous_price(&self, group: &str) -> Option<f64> {
        let last = self.periods.len() - 1;
        if last == 0 {
            return None;
        }
        self.price(last - 1, group)
    }

    /// All prices of `group` in period order.
    pub fn series(&self, group: &str) -> Option<Vec<f64>> {
        let column = self.group_index(group)?;
        Some(self.prices.iter().map(|row| row[column]).collect())
    }

    /// Prices of the last period in column order.
    pub fn latest_row(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        let last = &self.prices[self.prices.len() - 1];
        self.groups
            .iter()
            .map(String::as_str)
            .zip(last.iter().copied())
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.periods
            .iter()
            .map(String::as_str)
            .zip(self.prices.iter().map(Vec::as_slice))
    }
}

fn parse_price(cell: &str, line: u64, group: &str) -> Result<f64, DataSourceError> {
    let price: f64 = cell.parse().map_err(|_| DataSourceError::InvalidPrice {
        line,
        group: group.to_string(),
        value: cell.to_string(),
    })?;
    if !price.is_finite() {
        return Err(DataSourceError::InvalidPrice {
            line,
            group: group.to_string(),
            value: cell.to_string(),
        });
    }
    if price < 0.0 {
        return Err(DataSourceError::NegativePrice {
            line,
            group: group.to_string(),
            price,
        });
    }
    Ok(price)
}

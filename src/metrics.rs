//! Derived metrics over a [`PriceTable`]. Everything here is a pure function.

use crate::price_table::PriceTable;
use serde::Serialize;

/// One row of the long ("melted") format.
///
/// `order` is the index of the period in the source file and is the only
/// valid sort key for periods: labels like "Week 10" sort before "Week 2".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub order: usize,
    pub period: String,
    pub group: String,
    pub price: f64,
}

/// Latest price of a group together with its change since the previous period.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupQuote {
    pub group: String,
    pub price: f64,
    pub delta: f64,
    pub percent_change: Option<f64>,
}

/// Prices of the last period, highest first. Ties keep column order.
pub fn latest_prices(table: &PriceTable) -> Vec<(String, f64)> {
    let mut latest: Vec<(String, f64)> = table
        .latest_row()
        .map(|(group, price)| (group.to_string(), price))
        .collect();
    latest.sort_by(|a, b| b.1.total_cmp(&a.1));
    latest
}

/// Change of the latest price against the previous period.
///
/// Returns `Some(0.0)` for a table with a single period and `None` for an
/// unknown group.
pub fn price_delta(table: &PriceTable, group: &str) -> Option<f64> {
    let latest = table.latest_price(group)?;
    match table.previous_price(group) {
        Some(previous) => Some(latest - previous),
        None => Some(0.0),
    }
}

fn percent_change(table: &PriceTable, group: &str) -> Option<f64> {
    let latest = table.latest_price(group)?;
    let previous = table.previous_price(group)?;
    if previous > 0.0 {
        Some((latest - previous) / previous * 100.0)
    } else {
        None
    }
}

/// Flattens the table into `(period, group, price)` rows, one block per group
/// with periods in file order.
pub fn long_format(table: &PriceTable) -> Vec<PricePoint> {
    let mut points = Vec::with_capacity(table.period_count() * table.groups().len());
    for (column, group) in table.groups().iter().enumerate() {
        for (order, (period, prices)) in table.rows().enumerate() {
            points.push(PricePoint {
                order,
                period: period.to_string(),
                group: group.clone(),
                price: prices[column],
            });
        }
    }
    points
}

/// Summary grid rows, in the same order as [`latest_prices`].
pub fn market_summary(table: &PriceTable) -> Vec<GroupQuote> {
    latest_prices(table)
        .into_iter()
        .map(|(group, price)| {
            let delta = price_delta(table, &group).unwrap_or(0.0);
            let percent_change = percent_change(table, &group);
            GroupQuote {
                group,
                price,
                delta,
                percent_change,
            }
        })
        .collect()
}

/// Lowest and highest price over the whole table.
pub fn price_bounds(table: &PriceTable) -> (f64, f64) {
    table
        .rows()
        .flat_map(|(_, prices)| prices.iter().copied())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p), hi.max(p))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(data: &str) -> PriceTable {
        PriceTable::from_reader(data.as_bytes()).unwrap()
    }

    #[test]
    fn test_latest_prices_sorted_descending() {
        let t = PriceTable::from_file("market_data.csv").unwrap();
        let latest = latest_prices(&t);
        let groups: Vec<&str> = latest.iter().map(|(g, _)| g.as_str()).collect();
        assert_eq!(groups, ["Ravens", "Eagles", "Falcons", "Hawks"]);
        assert!(latest.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_latest_prices_ties_keep_column_order() {
        let t = table("Week,B,A,C\nW1,5,5,7\n");
        let latest = latest_prices(&t);
        assert_eq!(
            latest,
            vec![
                ("C".to_string(), 7.0),
                ("B".to_string(), 5.0),
                ("A".to_string(), 5.0)
            ]
        );
    }

    #[test]
    fn test_price_delta() {
        let t = table("Week,A\nW1,10\nW2,12\n");
        assert_eq!(price_delta(&t, "A"), Some(2.0));
        assert_eq!(price_delta(&t, "B"), None);
    }

    #[test]
    fn test_price_delta_single_period() {
        let t = table("Week,A\nW1,10\n");
        assert_eq!(price_delta(&t, "A"), Some(0.0));
    }

    #[test]
    fn test_market_summary() {
        let t = table("Week,A,B\nW1,10,4\nW2,8,5\n");
        let summary = market_summary(&t);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].group, "A");
        assert_eq!(summary[0].delta, -2.0);
        assert_eq!(summary[0].percent_change, Some(-20.0));
        assert_eq!(summary[1].group, "B");
        assert_eq!(summary[1].delta, 1.0);
    }

    #[test]
    fn test_percent_change_needs_positive_previous_price() {
        let t = table("Week,A\nW1,0\nW2,3\n");
        let summary = market_summary(&t);
        assert_eq!(summary[0].delta, 3.0);
        assert_eq!(summary[0].percent_change, None);
    }

    #[test]
    fn test_long_format_keeps_file_order() {
        let t = table("Week,A,B\nWeek 2,1,2\nWeek 10,3,4\n");
        let points = long_format(&t);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].period, "Week 2");
        assert_eq!(points[0].order, 0);
        assert_eq!(points[1].period, "Week 10");
        assert_eq!(points[1].order, 1);
        assert_eq!(points[2].group, "B");
        assert_eq!(points[3].price, 4.0);

        let mut sorted = points.clone();
        sorted.sort_by_key(|p| p.order);
        assert_eq!(sorted[0].period, "Week 2");
    }

    #[test]
    fn test_price_bounds() {
        let t = table("Week,A,B\nW1,10,4\nW2,8,15\n");
        assert_eq!(price_bounds(&t), (4.0, 15.0));
    }
}

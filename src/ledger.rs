use crate::error::{LedgerError, ValidationError};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

pub const STARTING_BALANCE: f64 = 1000.0;

/// Cash balance and share holdings of one session.
///
/// Every key in `holdings` is a group of the session's current price table.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    balance: f64,
    holdings: BTreeMap<String, u64>,
}

/// Outcome of a successful purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub group: String,
    pub quantity: u64,
    pub price: f64,
    pub cost: f64,
    pub balance: f64,
    pub holding: u64,
}

impl Ledger {
    pub fn new<S: AsRef<str>>(starting_balance: f64, groups: &[S]) -> Result<Ledger, LedgerError> {
        if !starting_balance.is_finite() || starting_balance < 0.0 {
            return Err(LedgerError::InvalidBalance(starting_balance));
        }
        let holdings = groups
            .iter()
            .map(|g| (g.as_ref().to_string(), 0))
            .collect();
        Ok(Ledger {
            balance: starting_balance,
            holdings,
        })
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn holdings(&self) -> &BTreeMap<String, u64> {
        &self.holdings
    }

    pub fn holding(&self, group: &str) -> u64 {
        self.holdings.get(group).copied().unwrap_or(0)
    }

    /// Buys `quantity` shares of `group` at `price`.
    ///
    /// All checks run before anything is changed, so a failed purchase leaves
    /// the ledger exactly as it was. `price` must be finite and non-negative.
    pub fn execute_purchase(
        &mut self,
        group: &str,
        quantity: u64,
        price: f64,
    ) -> Result<Purchase, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::NonPositiveQuantity);
        }
        if !price.is_finite() || price < 0.0 {
            return Err(LedgerError::InvalidPrice(price));
        }
        let Some(held) = self.holdings.get(group).copied() else {
            return Err(LedgerError::UnknownGroup(group.to_string()));
        };

        let cost = quantity as f64 * price;
        if cost > self.balance {
            debug!(group, quantity, cost, balance = self.balance, "purchase rejected");
            return Err(LedgerError::InsufficientFunds {
                cost,
                balance: self.balance,
            });
        }
        let holding = held
            .checked_add(quantity)
            .ok_or_else(|| LedgerError::HoldingOverflow {
                group: group.to_string(),
            })?;

        self.balance -= cost;
        self.holdings.insert(group.to_string(), holding);

        info!(group, quantity, price, cost, balance = self.balance, "purchase executed");

        Ok(Purchase {
            group: group.to_string(),
            quantity,
            price,
            cost,
            balance: self.balance,
            holding,
        })
    }

    /// Aligns the holdings with a new group set.
    ///
    /// Surviving groups keep their quantity, new groups start at zero and
    /// groups that disappeared are removed. Returns the removed non-zero
    /// holdings.
    pub fn sync_groups<S: AsRef<str>>(&mut self, groups: &[S]) -> Vec<(String, u64)> {
        let mut dropped = Vec::new();
        self.holdings.retain(|group, quantity| {
            let keep = groups.iter().any(|g| g.as_ref() == group);
            if !keep && *quantity > 0 {
                dropped.push((group.clone(), *quantity));
            }
            keep
        });
        for group in groups {
            self.holdings.entry(group.as_ref().to_string()).or_insert(0);
        }
        dropped
    }
}

/// A `GROUP:QUANTITY` purchase request from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub group: String,
    pub quantity: u64,
}

impl FromStr for Order {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (group, quantity) = s
            .rsplit_once(':')
            .ok_or_else(|| ValidationError::InvalidOrder(s.to_string()))?;
        let group = group.trim();
        if group.is_empty() {
            return Err(ValidationError::InvalidOrder(s.to_string()));
        }
        let quantity = parse_quantity(quantity)?;
        Ok(Order {
            group: group.to_string(),
            quantity,
        })
    }
}

/// Parses a share quantity typed by the user.
pub fn parse_quantity(input: &str) -> Result<u64, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::QuantityRequired);
    }
    let quantity: u64 = input
        .parse()
        .map_err(|_| ValidationError::InvalidQuantity(input.to_string()))?;
    if quantity == 0 {
        return Err(ValidationError::NonPositiveQuantity(quantity));
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        Ledger::new(STARTING_BALANCE, &["A", "B"]).unwrap()
    }

    #[test]
    fn test_new_ledger_starts_empty() {
        let l = ledger();
        assert_eq!(l.balance(), 1000.0);
        assert_eq!(l.holding("A"), 0);
        assert_eq!(l.holding("B"), 0);
        assert_eq!(l.holdings().len(), 2);
    }

    #[test]
    fn test_invalid_starting_balance() {
        assert_eq!(
            Ledger::new(-1.0, &["A"]),
            Err(LedgerError::InvalidBalance(-1.0))
        );
        assert!(Ledger::new(f64::NAN, &["A"]).is_err());
    }

    #[test]
    fn test_purchase_updates_balance_and_holding() {
        let mut l = ledger();
        let p = l.execute_purchase("A", 5, 12.0).unwrap();
        assert_eq!(p.cost, 60.0);
        assert_eq!(p.balance, 940.0);
        assert_eq!(p.holding, 5);
        assert_eq!(l.balance(), 940.0);
        assert_eq!(l.holding("A"), 5);

        let p = l.execute_purchase("A", 2, 12.0).unwrap();
        assert_eq!(p.holding, 7);
        assert_eq!(l.balance(), 916.0);
        assert_eq!(l.holding("B"), 0);
    }

    #[test]
    fn test_purchase_exact_balance() {
        let mut l = Ledger::new(60.0, &["A"]).unwrap();
        let p = l.execute_purchase("A", 5, 12.0).unwrap();
        assert_eq!(p.balance, 0.0);
    }

    #[test]
    fn test_insufficient_funds_leaves_state_unchanged() {
        let mut l = Ledger::new(50.0, &["A"]).unwrap();
        let before = l.clone();
        assert_eq!(
            l.execute_purchase("A", 5, 12.0),
            Err(LedgerError::InsufficientFunds {
                cost: 60.0,
                balance: 50.0
            })
        );
        assert_eq!(l, before);
        assert!(l.execute_purchase("A", 5, 12.0).is_err());
        assert_eq!(l, before);
    }

    #[test]
    fn test_rejects_unknown_group_and_zero_quantity() {
        let mut l = ledger();
        let before = l.clone();
        assert_eq!(
            l.execute_purchase("C", 1, 1.0),
            Err(LedgerError::UnknownGroup("C".to_string()))
        );
        assert_eq!(
            l.execute_purchase("A", 0, 1.0),
            Err(LedgerError::NonPositiveQuantity)
        );
        assert_eq!(l, before);
    }

    #[test]
    fn test_free_group_holding_cannot_overflow() {
        let mut l = Ledger::new(STARTING_BALANCE, &["Free"]).unwrap();
        let p = l.execute_purchase("Free", u64::MAX, 0.0).unwrap();
        assert_eq!(p.holding, u64::MAX);
        assert_eq!(p.cost, 0.0);

        let before = l.clone();
        assert_eq!(
            l.execute_purchase("Free", 1, 0.0),
            Err(LedgerError::HoldingOverflow {
                group: "Free".to_string()
            })
        );
        assert_eq!(l, before);
        assert_eq!(l.holding("Free"), u64::MAX);
        assert_eq!(l.balance(), STARTING_BALANCE);
    }

    #[test]
    fn test_rejects_invalid_price() {
        let mut l = ledger();
        let before = l.clone();
        assert_eq!(
            l.execute_purchase("A", 1, -1.0),
            Err(LedgerError::InvalidPrice(-1.0))
        );
        assert!(matches!(
            l.execute_purchase("A", 1, f64::NAN),
            Err(LedgerError::InvalidPrice(p)) if p.is_nan()
        ));
        assert!(l.execute_purchase("A", 1, f64::INFINITY).is_err());
        assert_eq!(l, before);
        assert_eq!(l.balance(), STARTING_BALANCE);
    }

    #[test]
    fn test_sync_groups() {
        let mut l = ledger();
        l.execute_purchase("A", 3, 10.0).unwrap();
        l.execute_purchase("B", 1, 10.0).unwrap();

        let dropped = l.sync_groups(&["A", "C"]);
        assert_eq!(dropped, vec![("B".to_string(), 1)]);
        assert_eq!(l.holding("A"), 3);
        assert_eq!(l.holding("C"), 0);
        assert!(!l.holdings().contains_key("B"));
        assert_eq!(l.balance(), 960.0);
    }

    #[test]
    fn test_parse_order() {
        assert_eq!(
            "Falcons:5".parse::<Order>(),
            Ok(Order {
                group: "Falcons".to_string(),
                quantity: 5
            })
        );
        assert_eq!(
            "Team: A:2".parse::<Order>().map(|o| o.group),
            Ok("Team: A".to_string())
        );
        assert_eq!(
            "Falcons".parse::<Order>(),
            Err(ValidationError::InvalidOrder("Falcons".to_string()))
        );
        assert_eq!(
            ":3".parse::<Order>(),
            Err(ValidationError::InvalidOrder(":3".to_string()))
        );
        assert_eq!(
            "A:0".parse::<Order>(),
            Err(ValidationError::NonPositiveQuantity(0))
        );
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(" 12 "), Ok(12));
        assert_eq!(parse_quantity(""), Err(ValidationError::QuantityRequired));
        assert_eq!(
            parse_quantity("1.5"),
            Err(ValidationError::InvalidQuantity("1.5".to_string()))
        );
        assert_eq!(
            parse_quantity("-2"),
            Err(ValidationError::InvalidQuantity("-2".to_string()))
        );
    }
}

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const ACCOUNT_NOT_FOUND_RESPONSE: &str = "error: account number not found";
pub const AMBIGUOUS_ACCOUNT_RESPONSE: &str =
    "error: multiple accounts matched this account number";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountNumber(pub String);

impl AccountNumber {
    pub fn parse(raw: Option<&str>) -> Result<Self, DomainError> {
        let value = raw.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(DomainError::MissingField("account_number"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub account_number: AccountNumber,
    pub balance: Decimal,
}

/// Result of resolving an account number against the account store.
///
/// Duplicate rows for one account number are a data anomaly and resolve to
/// [`BalanceLookup::Ambiguous`] instead of silently picking one of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BalanceLookup {
    Found(Decimal),
    NotFound,
    Ambiguous { matches: usize },
}

impl BalanceLookup {
    pub fn from_records(records: &[BalanceRecord]) -> Self {
        match records {
            [] => Self::NotFound,
            [record] => Self::Found(record.balance),
            many => Self::Ambiguous { matches: many.len() },
        }
    }

    pub fn response_text(&self) -> String {
        match self {
            Self::Found(balance) => {
                // `{:.2}` truncates; round to cents first.
                let cents =
                    balance.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                format!("Your current balance is ${cents:.2}.")
            }
            Self::NotFound => ACCOUNT_NOT_FOUND_RESPONSE.to_string(),
            Self::Ambiguous { .. } => AMBIGUOUS_ACCOUNT_RESPONSE.to_string(),
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NotFound => "not_found",
            Self::Ambiguous { .. } => "ambiguous",
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{AccountNumber, BalanceLookup, BalanceRecord};
    use crate::errors::DomainError;

    fn record(account: &str, balance: Decimal) -> BalanceRecord {
        BalanceRecord { account_number: AccountNumber(account.to_string()), balance }
    }

    #[test]
    fn single_record_renders_balance_with_two_decimals() {
        let lookup = BalanceLookup::from_records(&[record("1001", Decimal::new(425, 1))]);

        assert_eq!(lookup, BalanceLookup::Found(Decimal::new(425, 1)));
        assert_eq!(lookup.response_text(), "Your current balance is $42.50.");
    }

    #[test]
    fn zero_and_whole_balances_keep_cents() {
        assert_eq!(
            BalanceLookup::Found(Decimal::ZERO).response_text(),
            "Your current balance is $0.00."
        );
        assert_eq!(
            BalanceLookup::Found(Decimal::new(128, 0)).response_text(),
            "Your current balance is $128.00."
        );
    }

    #[test]
    fn sub_cent_balances_round_to_nearest_cent() {
        assert_eq!(
            BalanceLookup::Found(Decimal::new(99999, 3)).response_text(),
            "Your current balance is $100.00."
        );
        assert_eq!(
            BalanceLookup::Found(Decimal::new(42499, 3)).response_text(),
            "Your current balance is $42.50."
        );
        assert_eq!(
            BalanceLookup::Found(Decimal::new(42494, 3)).response_text(),
            "Your current balance is $42.49."
        );
        assert_eq!(
            BalanceLookup::Found(Decimal::new(10005, 3)).response_text(),
            "Your current balance is $10.01."
        );
    }

    #[test]
    fn no_records_is_a_soft_not_found() {
        let lookup = BalanceLookup::from_records(&[]);
        assert_eq!(lookup, BalanceLookup::NotFound);
        assert_eq!(lookup.response_text(), "error: account number not found");
    }

    #[test]
    fn duplicate_records_are_reported_as_ambiguous() {
        let lookup = BalanceLookup::from_records(&[
            record("1001", Decimal::new(4250, 2)),
            record("1001", Decimal::new(1000, 2)),
        ]);

        assert_eq!(lookup, BalanceLookup::Ambiguous { matches: 2 });
        assert_eq!(lookup.response_text(), "error: multiple accounts matched this account number");
        assert_eq!(lookup.outcome_label(), "ambiguous");
    }

    #[test]
    fn account_number_must_be_present() {
        assert_eq!(AccountNumber::parse(Some(" 1001 ")), Ok(AccountNumber("1001".to_string())));
        assert_eq!(AccountNumber::parse(Some("")), Err(DomainError::MissingField("account_number")));
        assert_eq!(AccountNumber::parse(None), Err(DomainError::MissingField("account_number")));
    }
}

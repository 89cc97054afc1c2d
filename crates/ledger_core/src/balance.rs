use std::collections::BTreeSet;

use crate::row::{parse_amount, Row};

pub const BALANCE_TOLERANCE: f64 = 0.01;

/// Row ids whose balance disagrees with the running ledger.
///
/// Each row is checked against its predecessor: `expected = prev.balance -
/// debit + credit`. A pair is skipped when either balance is unreadable or the
/// row carries neither a debit nor a credit.
pub fn balance_mismatches(rows: &[Row]) -> BTreeSet<String> {
    let mut flagged = BTreeSet::new();
    for pair in rows.windows(2) {
        let (prev, row) = (&pair[0], &pair[1]);
        let (Some(prev_balance), Some(balance)) =
            (parse_amount(&prev.balance), parse_amount(&row.balance))
        else {
            continue;
        };
        let debit = parse_amount(&row.debit);
        let credit = parse_amount(&row.credit);
        if debit.is_none() && credit.is_none() {
            continue;
        }
        let expected = prev_balance - debit.unwrap_or(0.0) + credit.unwrap_or(0.0);
        if (balance - expected).abs() > BALANCE_TOLERANCE {
            flagged.insert(row.row_id.clone());
        }
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, debit: &str, credit: &str, balance: &str) -> Row {
        Row {
            row_id: id.to_string(),
            debit: debit.to_string(),
            credit: credit.to_string(),
            balance: balance.to_string(),
            ..Row::default()
        }
    }

    #[test]
    fn consistent_ledger_has_no_mismatches() {
        let rows = vec![
            row("001", "", "", "100.00"),
            row("002", "20.00", "", "80.00"),
            row("003", "", "5.00", "85.00"),
        ];
        assert!(balance_mismatches(&rows).is_empty());
    }

    #[test]
    fn wrong_balance_is_flagged() {
        let rows = vec![
            row("001", "", "", "100.00"),
            row("002", "20.00", "", "80.00"),
            row("003", "", "5.00", "90.00"),
        ];
        assert_eq!(
            balance_mismatches(&rows),
            BTreeSet::from(["003".to_string()])
        );
    }

    #[test]
    fn rounding_within_a_cent_is_accepted() {
        let rows = vec![
            row("001", "", "", "10.00"),
            row("002", "0.333", "", "9.67"),
        ];
        assert!(balance_mismatches(&rows).is_empty());
    }

    #[test]
    fn unreadable_or_empty_rows_are_skipped() {
        let rows = vec![
            row("001", "", "", "100.00"),
            row("002", "", "", "55.00"),
            row("003", "5.00", "", "n/a"),
            row("004", "1.00", "", "3.00"),
        ];
        assert!(balance_mismatches(&rows).is_empty());
    }
}

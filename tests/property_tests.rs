//! Property tests for balance arithmetic and reversal mirroring

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use proptest::prelude::*;

use posting_core::utils::validation::validate_batch;
use posting_core::{BatchStatus, JournalEntry, JournalLine, PostingBatch, PostingError};

/// Money amounts from 0.01 to 1,000,000.00, generated in cents
fn money() -> impl Strategy<Value = BigDecimal> {
    (1i64..=100_000_000).prop_map(|cents| BigDecimal::new(cents.into(), 2))
}

fn entry_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

/// Every amount contributes one debit and one matching credit, so the
/// entry balances by construction.
fn balanced_entry(amounts: &[BigDecimal]) -> JournalEntry {
    let mut entry = JournalEntry::new(
        entry_date(),
        "PROP-1".to_string(),
        "Generated entry".to_string(),
    );
    for (i, amount) in amounts.iter().enumerate() {
        entry
            .add_line(JournalLine::debit(format!("1{i:03}"), amount.clone(), None).unwrap())
            .unwrap();
        entry
            .add_line(JournalLine::credit(format!("2{i:03}"), amount.clone(), None).unwrap())
            .unwrap();
    }
    entry
}

fn balanced_batch(entry_amounts: &[Vec<BigDecimal>]) -> PostingBatch {
    let mut batch = PostingBatch::new("PROP-BATCH".to_string(), entry_date());
    for amounts in entry_amounts {
        batch.add_entry(balanced_entry(amounts)).unwrap();
    }
    batch
}

proptest! {
    /// Batches assembled from debit/credit pairs always pass validation.
    #[test]
    fn prop_constructed_batches_always_balance(
        amounts in prop::collection::vec(prop::collection::vec(money(), 1..4), 1..4),
    ) {
        let batch = balanced_batch(&amounts);
        prop_assert!(validate_batch(&batch).is_ok());
        prop_assert_eq!(batch.total_debit(), batch.total_credit());
    }

    /// Skewing one side of a balanced entry breaks validation.
    #[test]
    fn prop_skewed_entry_rejected(amount in money(), skew in money()) {
        let mut entry = JournalEntry::new(
            entry_date(),
            "PROP-2".to_string(),
            "Skewed entry".to_string(),
        );
        entry
            .add_line(
                JournalLine::debit("1000".to_string(), amount.clone() + skew, None).unwrap(),
            )
            .unwrap();
        entry
            .add_line(JournalLine::credit("2000".to_string(), amount, None).unwrap())
            .unwrap();

        prop_assert!(
            matches!(
                entry.validate(),
                Err(PostingError::UnbalancedEntry { .. })
            ),
            "expected UnbalancedEntry error"
        );
    }

    /// A line is accepted exactly when one side is positive and the other zero.
    #[test]
    fn prop_line_shape_rule(debit in 0i64..=1_000, credit in 0i64..=1_000) {
        let result = JournalLine::new(
            "1000".to_string(),
            BigDecimal::from(debit),
            BigDecimal::from(credit),
            None,
        );
        let one_sided = (debit > 0) ^ (credit > 0);
        prop_assert_eq!(result.is_ok(), one_sided);
    }

    /// Reversing an entry swaps the sides line for line and in total.
    #[test]
    fn prop_reversed_entry_mirrors_exactly(amounts in prop::collection::vec(money(), 1..5)) {
        let entry = balanced_entry(&amounts);
        let mirror = entry.reversed(entry_date());

        prop_assert_eq!(mirror.lines.len(), entry.lines.len());
        for (line, mirrored) in entry.lines.iter().zip(&mirror.lines) {
            prop_assert_eq!(&line.account_id, &mirrored.account_id);
            prop_assert_eq!(&line.debit, &mirrored.credit);
            prop_assert_eq!(&line.credit, &mirrored.debit);
        }
        prop_assert_eq!(mirror.total_debit(), entry.total_credit());
        prop_assert_eq!(mirror.total_credit(), entry.total_debit());
        prop_assert!(mirror.is_balanced());
    }

    /// A posted batch's mirror moves the same money, side-swapped.
    #[test]
    fn prop_reversal_batch_preserves_totals(
        amounts in prop::collection::vec(prop::collection::vec(money(), 1..3), 1..3),
    ) {
        let mut batch = balanced_batch(&amounts);
        batch.status = BatchStatus::Posted;

        let reversal = batch
            .build_reversal("REV-PROP-BATCH".to_string(), entry_date(), "generated")
            .unwrap();
        prop_assert_eq!(reversal.total_debit(), batch.total_credit());
        prop_assert_eq!(reversal.total_credit(), batch.total_debit());
        prop_assert_eq!(reversal.entries.len(), batch.entries.len());
        prop_assert!(reversal.is_balanced());
    }
}

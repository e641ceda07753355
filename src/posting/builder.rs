//! Fluent construction of journal entries

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::*;
use crate::utils::validation::{validate_description, validate_reference};

/// Builder for journal entries. Line-shape failures are latched and
/// surfaced at `build()`, so chains stay fluent.
#[derive(Debug)]
pub struct EntryBuilder {
    entry: JournalEntry,
    failed: Option<PostingError>,
}

impl EntryBuilder {
    /// Start an entry for a business date, reference, and description
    pub fn new(entry_date: NaiveDate, reference: String, description: String) -> Self {
        Self {
            entry: JournalEntry::new(entry_date, reference, description),
            failed: None,
        }
    }

    /// Record where the entry came from (subledger module and document id)
    pub fn source(mut self, module: String, id: String) -> Self {
        self.entry.source_module = Some(module);
        self.entry.source_id = Some(id);
        self
    }

    /// Flag the entry as a year-end adjusting entry
    pub fn adjusting(mut self) -> Self {
        self.entry.is_adjusting = true;
        self
    }

    /// Add a debit line
    pub fn debit(mut self, account_id: String, amount: BigDecimal, memo: Option<String>) -> Self {
        if self.failed.is_none() {
            match JournalLine::debit(account_id, amount, memo) {
                Ok(line) => self.entry.lines.push(line),
                Err(error) => self.failed = Some(error),
            }
        }
        self
    }

    /// Add a credit line
    pub fn credit(mut self, account_id: String, amount: BigDecimal, memo: Option<String>) -> Self {
        if self.failed.is_none() {
            match JournalLine::credit(account_id, amount, memo) {
                Ok(line) => self.entry.lines.push(line),
                Err(error) => self.failed = Some(error),
            }
        }
        self
    }

    /// Add a pre-built line
    pub fn line(mut self, line: JournalLine) -> Self {
        if self.failed.is_none() {
            self.entry.lines.push(line);
        }
        self
    }

    /// Validate and return the finished entry
    pub fn build(self) -> PostingResult<JournalEntry> {
        if let Some(error) = self.failed {
            return Err(error);
        }
        validate_reference(&self.entry.reference)?;
        validate_description(&self.entry.description)?;
        self.entry.validate()?;
        Ok(self.entry)
    }
}

/// Common journal entry shapes
pub mod patterns {
    use super::*;

    /// Pay an expense from cash (debit expense, credit cash)
    pub fn expense_payment(
        entry_date: NaiveDate,
        reference: String,
        description: String,
        expense_account_id: String,
        cash_account_id: String,
        amount: BigDecimal,
    ) -> PostingResult<JournalEntry> {
        EntryBuilder::new(entry_date, reference, description)
            .debit(expense_account_id, amount.clone(), None)
            .credit(cash_account_id, amount, None)
            .build()
    }

    /// Receive cash against income (debit cash, credit income)
    pub fn cash_receipt(
        entry_date: NaiveDate,
        reference: String,
        description: String,
        cash_account_id: String,
        income_account_id: String,
        amount: BigDecimal,
    ) -> PostingResult<JournalEntry> {
        EntryBuilder::new(entry_date, reference, description)
            .debit(cash_account_id, amount.clone(), None)
            .credit(income_account_id, amount, None)
            .build()
    }

    /// Move funds between two balance-sheet accounts
    pub fn account_transfer(
        entry_date: NaiveDate,
        reference: String,
        description: String,
        to_account_id: String,
        from_account_id: String,
        amount: BigDecimal,
    ) -> PostingResult<JournalEntry> {
        EntryBuilder::new(entry_date, reference, description)
            .debit(to_account_id, amount.clone(), Some("Transfer in".to_string()))
            .credit(from_account_id, amount, Some("Transfer out".to_string()))
            .build()
    }

    /// Year-end accrual, flagged as adjusting (debit expense, credit accrual)
    pub fn year_end_accrual(
        entry_date: NaiveDate,
        reference: String,
        description: String,
        expense_account_id: String,
        accrual_account_id: String,
        amount: BigDecimal,
    ) -> PostingResult<JournalEntry> {
        EntryBuilder::new(entry_date, reference, description)
            .adjusting()
            .debit(expense_account_id, amount.clone(), None)
            .credit(accrual_account_id, amount, None)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn test_builder_produces_balanced_entry() {
        let entry = EntryBuilder::new(
            sample_date(),
            "INV-42".to_string(),
            "Consulting revenue".to_string(),
        )
        .debit("1200".to_string(), BigDecimal::from(900), None)
        .credit("4000".to_string(), BigDecimal::from(900), None)
        .build()
        .unwrap();

        assert_eq!(entry.lines.len(), 2);
        assert!(entry.is_balanced());
        assert!(!entry.is_adjusting);
    }

    #[test]
    fn test_builder_latches_line_errors() {
        let result = EntryBuilder::new(
            sample_date(),
            "INV-43".to_string(),
            "Broken entry".to_string(),
        )
        .debit("1200".to_string(), BigDecimal::from(-5), None)
        .credit("4000".to_string(), BigDecimal::from(5), None)
        .build();

        assert!(matches!(result, Err(PostingError::InvalidLine { .. })));
    }

    #[test]
    fn test_builder_rejects_unbalanced() {
        let result = EntryBuilder::new(
            sample_date(),
            "INV-44".to_string(),
            "Unbalanced".to_string(),
        )
        .debit("1200".to_string(), BigDecimal::from(100), None)
        .credit("4000".to_string(), BigDecimal::from(90), None)
        .build();

        assert!(matches!(result, Err(PostingError::UnbalancedEntry { .. })));
    }

    #[test]
    fn test_single_line_rejected() {
        let result = EntryBuilder::new(
            sample_date(),
            "INV-45".to_string(),
            "Half an entry".to_string(),
        )
        .debit("1200".to_string(), BigDecimal::from(100), None)
        .build();

        assert!(matches!(
            result,
            Err(PostingError::InsufficientLines { count: 1, .. })
        ));
    }

    #[test]
    fn test_year_end_accrual_is_adjusting() {
        let entry = patterns::year_end_accrual(
            sample_date(),
            "ACC-1".to_string(),
            "Accrued audit fees".to_string(),
            "6900".to_string(),
            "2300".to_string(),
            BigDecimal::from(12_000),
        )
        .unwrap();

        assert!(entry.is_adjusting);
        assert_eq!(entry.total_debit(), BigDecimal::from(12_000));
    }
}

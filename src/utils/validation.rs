//! Pure validation routines for batches, entries, and periods
//!
//! Everything here is synchronous and idempotent. The posting service runs
//! these checks at submit time and again at post time.

use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate a batch number: non-blank, bounded, printable
pub fn validate_batch_number(batch_number: &str) -> PostingResult<()> {
    if batch_number.trim().is_empty() {
        return Err(PostingError::Validation(
            "batch number cannot be empty".to_string(),
        ));
    }

    if batch_number.len() > 50 {
        return Err(PostingError::Validation(
            "batch number cannot exceed 50 characters".to_string(),
        ));
    }

    // Alphanumeric plus the separators batch numbering schemes use
    if !batch_number
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '/')
    {
        return Err(PostingError::Validation(
            "batch number can only contain alphanumeric characters, dashes, underscores, and slashes"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate an entry's document reference
pub fn validate_reference(reference: &str) -> PostingResult<()> {
    if reference.trim().is_empty() {
        return Err(PostingError::Validation(
            "reference cannot be empty".to_string(),
        ));
    }

    if reference.len() > 100 {
        return Err(PostingError::Validation(
            "reference cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a description field
pub fn validate_description(description: &str) -> PostingResult<()> {
    if description.trim().is_empty() {
        return Err(PostingError::Validation(
            "description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(PostingError::Validation(
            "description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a whole batch: it must contain entries, every entry must pass
/// its own shape checks, and the batch-level totals must balance.
///
/// Entry-level failures surface before the batch-level re-sum.
pub fn validate_batch(batch: &PostingBatch) -> PostingResult<()> {
    if batch.entries.is_empty() {
        return Err(PostingError::Validation(format!(
            "batch {} has no journal entries",
            batch.batch_number
        )));
    }

    for entry in &batch.entries {
        entry.validate()?;
        validate_reference(&entry.reference)?;
    }

    let total_debit = batch.total_debit();
    let total_credit = batch.total_credit();
    if total_debit != total_credit || total_debit == BigDecimal::from(0) {
        return Err(PostingError::UnbalancedBatch {
            batch_id: batch.id,
            total_debit,
            total_credit,
        });
    }

    Ok(())
}

/// Apply the period policy to a batch.
///
/// Closed periods block outright. Adjustment periods accept the batch but
/// raise a warning when any entry is not flagged as adjusting. The warning
/// never blocks; callers surface it and carry on.
pub fn validate_period(
    batch: &PostingBatch,
    period: Option<&PeriodRef>,
) -> PostingResult<Option<PeriodWarning>> {
    let period = period.ok_or(PostingError::PeriodNotFound {
        date: batch.batch_date,
    })?;

    match period.status {
        PeriodStatus::Open => Ok(None),
        PeriodStatus::Closed => Err(PostingError::PeriodClosed {
            period_id: period.period_id,
            date: batch.batch_date,
        }),
        PeriodStatus::Adjustment => {
            let non_adjusting = batch.entries.iter().filter(|e| !e.is_adjusting).count();
            if non_adjusting > 0 {
                Ok(Some(PeriodWarning {
                    period_id: period.period_id,
                    message: format!(
                        "{non_adjusting} entr{} in batch {} not flagged as adjusting in an adjustment period",
                        if non_adjusting == 1 { "y" } else { "ies" },
                        batch.batch_number
                    ),
                }))
            } else {
                Ok(None)
            }
        }
    }
}

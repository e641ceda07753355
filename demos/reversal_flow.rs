//! Reversal walkthrough: post a batch, then offset it with a mirror batch

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use posting_core::utils::{
    MemoryAccountDirectory, MemoryPeriodCalendar, MemoryPublisher, MemoryStorage,
};
use posting_core::{patterns, AccountType, NewBatch, PeriodStatus, PostingService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Posting Core - Reversal Example\n");

    let directory = MemoryAccountDirectory::new();
    directory.add_account("1000", AccountType::Asset, true); // Cash
    directory.add_account("4000", AccountType::Income, true); // Sales

    let calendar = MemoryPeriodCalendar::new();
    calendar.add_period(
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        PeriodStatus::Open,
    );

    // No workflows registered: the default policy self-approves on submit
    let service = PostingService::new(
        MemoryStorage::new(),
        directory,
        calendar,
        MemoryPublisher::new(),
    );

    // 1. Post a sale
    println!("📋 Posting batch JB-2024-077...");
    let batch = service
        .create_batch(NewBatch {
            batch_number: "JB-2024-077".to_string(),
            batch_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            description: Some("Walk-in sales".to_string()),
            notes: None,
            branch_id: None,
        })
        .await?;

    let sale = patterns::cash_receipt(
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        "RCPT-311".to_string(),
        "Cash sale".to_string(),
        "1000".to_string(),
        "4000".to_string(),
        BigDecimal::from(2_500),
    )?;
    service.add_entry(batch.id, sale).await?;

    let submitted = service.submit(batch.id, "clerk").await?;
    println!("  Submitted; no workflow matched, so: {}", submitted.batch.status);
    let posted = service.post(batch.id, "clerk").await?;
    println!("  Posted: {}\n", posted.batch.batch_number);

    // 2. The sale turns out to be wrong; reverse it
    println!("↩️  Reversing...");
    let outcome = service
        .reverse(
            batch.id,
            NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            "Rung up twice at the till",
            "clerk",
        )
        .await?;

    println!(
        "  Mirror batch {} created and posted in the same call",
        outcome.reversal.batch_number
    );
    println!("  Original status: {}", outcome.original.status);
    println!("  Mirror status:   {}\n", outcome.reversal.status);

    println!("  Lines, side by side:");
    for (entry, mirror) in outcome.original.entries.iter().zip(&outcome.reversal.entries) {
        for (line, mirrored) in entry.lines.iter().zip(&mirror.lines) {
            println!(
                "    {}  {:>8} D / {:>8} C   becomes   {:>8} D / {:>8} C",
                line.account_id, line.debit, line.credit, mirrored.debit, mirrored.credit
            );
        }
    }

    // 3. A batch can only be reversed once
    println!("\n🚫 Trying to reverse it again...");
    match service
        .reverse(
            batch.id,
            NaiveDate::from_ymd_opt(2024, 3, 13).unwrap(),
            "Second thoughts",
            "clerk",
        )
        .await
    {
        Err(error) => println!("  ✗ Refused: {error}"),
        Ok(_) => println!("  ⚠ This should not have succeeded"),
    }

    println!("\n🎉 Example completed successfully!");
    Ok(())
}

//! Batch posting walkthrough: draft, multi-level approval, post

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use posting_core::utils::{
    MemoryAccountDirectory, MemoryPeriodCalendar, MemoryPublisher, MemoryStorage,
};
use posting_core::{
    patterns, AccountType, ApprovalWorkflow, EntryBuilder, NewBatch, PeriodStatus, PostingService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Posting Core - Approval Workflow Example\n");

    // Wire the service against in-memory collaborators
    let directory = MemoryAccountDirectory::new();
    directory.add_account("1000", AccountType::Asset, true); // Cash
    directory.add_account("5000", AccountType::Expense, true); // Rent
    directory.add_account("6100", AccountType::Expense, true); // Supplies

    let calendar = MemoryPeriodCalendar::new();
    calendar.add_period(
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        PeriodStatus::Open,
    );

    let publisher = MemoryPublisher::new();
    let service = PostingService::new(
        MemoryStorage::new(),
        directory,
        calendar,
        publisher.clone(),
    );

    // 1. Register approval workflows
    println!("⚙️  Registering approval workflows...");
    let small = ApprovalWorkflow::new("JRNL-SMALL", "Small journals", "PostingBatch", 1)?
        .with_amount_range(None, Some(BigDecimal::from(9_999)));
    let large = ApprovalWorkflow::new("JRNL-LARGE", "Large journals", "PostingBatch", 2)?
        .with_amount_range(Some(BigDecimal::from(10_000)), None)
        .with_priority(200)
        .with_level_name(1, "Supervisor")
        .with_level_name(2, "Financial Controller");

    let small = service.approvals().register_workflow(small).await?;
    let large = service.approvals().register_workflow(large).await?;
    println!(
        "  ✓ {} - up to ₹9,999 ({} level)",
        small.code, small.number_of_levels
    );
    println!(
        "  ✓ {} - ₹10,000 and above ({} levels)\n",
        large.code, large.number_of_levels
    );

    // 2. Assemble a batch in draft
    println!("📋 Building batch JB-2024-042...");
    let batch = service
        .create_batch(NewBatch {
            batch_number: "JB-2024-042".to_string(),
            batch_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            description: Some("March office costs".to_string()),
            notes: None,
            branch_id: None,
        })
        .await?;

    let rent = patterns::expense_payment(
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        "INV-881".to_string(),
        "Monthly rent payment".to_string(),
        "5000".to_string(),
        "1000".to_string(),
        BigDecimal::from(12_000),
    )?;
    service.add_entry(batch.id, rent).await?;
    println!("  ✓ Added: rent payment of ₹12,000");

    let supplies = EntryBuilder::new(
        NaiveDate::from_ymd_opt(2024, 3, 16).unwrap(),
        "INV-902".to_string(),
        "Stationery restock".to_string(),
    )
    .debit(
        "6100".to_string(),
        BigDecimal::from(500),
        Some("Printer paper".to_string()),
    )
    .credit("1000".to_string(), BigDecimal::from(500), None)
    .build()?;
    let batch = service.add_entry(batch.id, supplies).await?;
    println!("  ✓ Added: stationery purchase of ₹500");
    println!(
        "  Batch total: ₹{} debit / ₹{} credit\n",
        batch.total_debit(),
        batch.total_credit()
    );

    // 3. Submit: the total lands in the large-journal band
    println!("📨 Submitting for approval...");
    let submitted = service.submit(batch.id, "clerk").await?;
    println!("  Batch status: {}", submitted.batch.status);
    if let Some(request) = &submitted.request {
        println!(
            "  Routed to a {}-level approval, waiting at level {}\n",
            request.total_levels, request.current_level
        );
    }

    // 4. Walk the approval levels
    println!("✅ Approving...");
    let first = service
        .approve_level(batch.id, "supervisor", Some("Amounts verified".to_string()))
        .await?;
    println!(
        "  Level 1 cleared by supervisor; request now at level {}",
        first.request.current_level
    );

    let second = service
        .approve_level(batch.id, "controller", None)
        .await?;
    println!(
        "  Level 2 cleared by controller; batch status: {}\n",
        second.batch.status
    );

    // 5. Post to the ledger
    println!("📮 Posting...");
    let posted = service.post(batch.id, "controller").await?;
    println!(
        "  Batch {} posted by {} at {}",
        posted.batch.batch_number,
        posted.batch.posted_by.as_deref().unwrap_or("?"),
        posted
            .batch
            .posted_at
            .map(|t| t.to_string())
            .unwrap_or_default()
    );

    // 6. Everything that happened, as events
    println!("\n📡 Events published:");
    for event in publisher.published() {
        println!("  - {}", event.name());
    }

    println!("\n🎉 Example completed successfully!");
    Ok(())
}

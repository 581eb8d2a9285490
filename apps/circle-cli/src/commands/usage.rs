use chrono::{Local, NaiveDate};

use super::format_seconds;
use crate::context::Context;

pub async fn cmd_usage_add(
    ctx: &Context,
    seconds: u64,
    date: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let record = ctx.ledger.accumulate(date, seconds).await?;

    println!(
        "Recorded {} on {date} (total {})",
        format_seconds(seconds),
        format_seconds(record.total_seconds)
    );
    Ok(())
}

pub async fn cmd_usage_today(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let today = Local::now().date_naive();
    match ctx.ledger.get(today).await? {
        Some(record) => {
            println!("Today: {}", format_seconds(record.total_seconds));
            match record.last_synced_at {
                Some(at) if !record.is_pending() => {
                    println!("  Synced at {}", at.with_timezone(&Local).format("%H:%M"))
                }
                Some(_) | None => println!(
                    "  {} not synced yet",
                    format_seconds(record.total_seconds.saturating_sub(record.synced_seconds))
                ),
            }
        }
        None => println!("Today: no activity recorded"),
    }
    Ok(())
}

pub async fn cmd_usage_week(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let summary = ctx
        .ledger
        .weekly_summary(Local::now().date_naive())
        .await?;

    println!("Last 7 days:");
    for day in &summary.days {
        println!(
            "  {} {:>10}",
            day.date.format("%a %Y-%m-%d"),
            format_seconds(day.seconds)
        );
    }
    println!("Total:   {}", format_seconds(summary.total_seconds));
    println!("Average: {}", format_seconds(summary.average_seconds));
    Ok(())
}

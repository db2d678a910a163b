//! Operator commands for the dead-letter queue.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tabled::{Table, Tabled};

use crate::error::Result;
use crate::recovery::DeadLetterService;

/// Entries shown per `list` page.
pub const PAGE_LIMIT: i64 = 20;

/// Stack traces are cut to this many characters unless full detail is
/// requested.
const STACK_TRACE_PREVIEW_CHARS: usize = 100;

#[derive(Parser)]
#[command(name = "redrive")]
#[command(version = "0.1.0")]
#[command(about = "Document store and dead-letter recovery over PostgreSQL", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory path
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run pending database migrations
    Migrate,
    /// Inspect and replay dead-lettered messages
    #[command(subcommand)]
    DeadLetter(DeadLetterCommands),
}

#[derive(Subcommand)]
pub enum DeadLetterCommands {
    /// List dead-lettered messages, 20 per page
    List {
        /// Page number, starting at 0
        #[arg(short, long, default_value = "0")]
        page: i64,
    },
    /// Show full detail for one message
    Show {
        /// Message id
        message_id: String,
        /// Print the complete stack trace
        #[arg(long)]
        full: bool,
    },
    /// Replay one message onto its originating channel
    Reply {
        /// Message id
        message_id: String,
    },
    /// Replay every stored message
    ReplyAll,
    /// Delete one message without replaying it
    Delete {
        /// Message id
        message_id: String,
    },
}

#[derive(Tabled)]
struct DeadLetterRow {
    #[tabled(rename = "Message Id")]
    message_id: String,
    #[tabled(rename = "Failed At")]
    failed_at: String,
    #[tabled(rename = "Stacktrace")]
    stack_trace: String,
}

pub async fn list(service: &DeadLetterService, page: i64) -> Result<()> {
    let entries = service.list(PAGE_LIMIT, page * PAGE_LIMIT).await?;

    if entries.is_empty() {
        println!("(no dead letters on page {page})");
        return Ok(());
    }

    let rows: Vec<DeadLetterRow> = entries
        .iter()
        .map(|e| DeadLetterRow {
            message_id: e.message_id.clone(),
            failed_at: format_timestamp(e.failed_at),
            stack_trace: readable_stack_trace(&e.stack_trace, false),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

#[derive(Tabled)]
struct DetailRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

pub async fn show(service: &DeadLetterService, message_id: &str, full: bool) -> Result<()> {
    let entry = service.show(message_id).await?;

    let rows = vec![
        DetailRow {
            field: "Message Id",
            value: entry.message_id.clone(),
        },
        DetailRow {
            field: "Failed At",
            value: format_timestamp(entry.failed_at),
        },
        DetailRow {
            field: "Channel Name",
            value: entry.channel.clone(),
        },
        DetailRow {
            field: "Type",
            value: entry
                .payload_type
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
        },
        DetailRow {
            field: "Stacktrace",
            value: readable_stack_trace(&entry.stack_trace, full),
        },
    ];

    println!("{}", Table::new(rows));
    Ok(())
}

pub async fn reply(service: &DeadLetterService, message_id: &str) -> Result<()> {
    service.reply(message_id).await?;
    println!("Replayed {message_id}");
    Ok(())
}

pub async fn reply_all(service: &DeadLetterService) -> Result<()> {
    let report = service.reply_all().await?;
    println!(
        "Replayed {} dead letters, {} failed",
        report.replayed, report.failed
    );
    Ok(())
}

pub async fn delete(service: &DeadLetterService, message_id: &str) -> Result<()> {
    service.delete(message_id).await?;
    println!("Deleted {message_id}");
    Ok(())
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Cut a stack trace to a preview length, counting characters so multibyte
/// frames survive.
fn readable_stack_trace(stack_trace: &str, full: bool) -> String {
    if full || stack_trace.chars().count() <= STACK_TRACE_PREVIEW_CHARS {
        return stack_trace.to_string();
    }

    let preview: String = stack_trace.chars().take(STACK_TRACE_PREVIEW_CHARS).collect();
    format!("{preview}...")
}

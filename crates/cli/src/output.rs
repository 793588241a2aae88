use clap::ValueEnum;
use service_registry::ServiceRecord;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

pub fn write_json<T: serde::Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_record(out: &mut dyn Write, record: &ServiceRecord, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, record),
        OutputFormat::Text => {
            writeln!(out, "Service ID: {}", record.service_id)?;
            writeln!(out, "Host: {}", record.host)?;
            writeln!(out, "Port: {}", record.port)?;
            writeln!(out, "Type: {}", record.service_type)?;
            writeln!(out, "Status: {}", record.status)?;
            writeln!(out, "Last Seen: {}", record.last_seen)?;
            if !record.metadata.is_empty() {
                writeln!(out, "Metadata: {}", serde_json::to_string_pretty(&record.metadata)?)?;
            }
            Ok(())
        }
    }
}

/// Fixed-width table; the status column is left out for live-only listings.
pub fn write_table(out: &mut dyn Write, records: &[ServiceRecord], with_status: bool) -> io::Result<()> {
    if with_status {
        writeln!(
            out,
            "{:<20} {:<15} {:<6} {:<12} {:<10}",
            "Service ID", "Host", "Port", "Type", "Status"
        )?;
        writeln!(out, "{}", "-".repeat(75))?;
    } else {
        writeln!(out, "{:<20} {:<15} {:<6} {:<12}", "Service ID", "Host", "Port", "Type")?;
        writeln!(out, "{}", "-".repeat(60))?;
    }

    for record in records {
        if with_status {
            writeln!(
                out,
                "{:<20} {:<15} {:<6} {:<12} {:<10}",
                record.service_id,
                record.host,
                record.port,
                record.service_type,
                record.status.as_str()
            )?;
        } else {
            writeln!(
                out,
                "{:<20} {:<15} {:<6} {:<12}",
                record.service_id, record.host, record.port, record.service_type
            )?;
        }
    }
    Ok(())
}

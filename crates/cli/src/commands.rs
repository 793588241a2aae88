use crate::output::{self, OutputFormat};
use crate::Command;
use anyhow::Context;
use service_registry::{parse_metadata, Metadata, ServiceRecord, ServiceRegistry, ServiceStatus, Store};
use std::io::{BufRead, Write};
use std::time::Duration;

/// Run one subcommand against `registry`, writing human output to `out`.
///
/// `input` is only read by `clear`, for its confirmation prompt.
pub async fn execute<S: Store>(
    registry: &ServiceRegistry<S>,
    command: Command,
    out: &mut dyn Write,
    input: &mut dyn BufRead,
) -> anyhow::Result<()> {
    match command {
        Command::Register {
            service_id,
            host,
            port,
            service_type,
            status,
            metadata,
        } => {
            let metadata = metadata_arg(metadata.as_deref())?.unwrap_or_default();
            let mut service = ServiceRecord::new(service_id.as_str(), host, port, service_type)
                .with_status(status.into());
            service.metadata = metadata;

            registry
                .register(&service)
                .await
                .with_context(|| format!("Failed to register service: {}", service_id))?;
            writeln!(out, "Successfully registered service: {}", service_id)?;
        }
        Command::Deregister { service_id } => {
            registry
                .deregister(&service_id)
                .await
                .with_context(|| format!("Failed to deregister service: {}", service_id))?;
            writeln!(out, "Successfully deregistered service: {}", service_id)?;
        }
        Command::UpdateHealth {
            service_id,
            status,
            metadata,
        } => {
            let metadata = metadata_arg(metadata.as_deref())?;
            registry
                .update_health(&service_id, status.into(), metadata)
                .await
                .with_context(|| format!("Failed to update health for service: {}", service_id))?;
            writeln!(out, "Successfully updated health for service: {}", service_id)?;
        }
        Command::Heartbeat { service_id, quiet } => {
            registry
                .heartbeat(&service_id)
                .await
                .with_context(|| format!("Failed to record heartbeat for service: {}", service_id))?;
            if !quiet {
                writeln!(out, "Heartbeat recorded for service: {}", service_id)?;
            }
        }
        Command::Get { service_id, format } => {
            let service = registry.get(&service_id).await.map_err(|e| {
                if e.is_not_found() {
                    anyhow::anyhow!("Service not found: {}", service_id)
                } else {
                    anyhow::Error::new(e).context(format!("Failed to get service: {}", service_id))
                }
            })?;
            output::write_record(out, &service, format)?;
        }
        Command::List {
            service_type,
            status,
            format,
        } => {
            let status: Option<ServiceStatus> = status.map(Into::into);
            let services = registry.list(service_type.as_deref(), status).await?;
            write_listing(out, &services, format, true)?;
        }
        Command::ListHealthy {
            service_type,
            timeout,
            format,
        } => {
            let services = registry
                .list_healthy(service_type.as_deref(), Duration::from_secs(timeout))
                .await?;
            write_listing(out, &services, format, false)?;
        }
        Command::Cleanup { timeout } => {
            let removed = registry.cleanup_stale(Duration::from_secs(timeout)).await?;
            writeln!(out, "Removed {} stale service(s)", removed)?;
        }
        Command::Count { service_type } => {
            let count = registry.count(service_type.as_deref()).await?;
            writeln!(out, "{}", count)?;
        }
        Command::Types { format } => {
            let types = registry.types().await?;
            match format {
                OutputFormat::Json => output::write_json(out, &types)?,
                OutputFormat::Text => {
                    for service_type in types {
                        writeln!(out, "{}", service_type)?;
                    }
                }
            }
        }
        Command::Clear { yes } => {
            if !yes && !confirm(out, input)? {
                writeln!(out, "Aborted")?;
                return Ok(());
            }
            registry
                .clear_all()
                .await
                .context("Failed to clear service registry data")?;
            writeln!(out, "Successfully cleared all service registry data")?;
        }
    }
    Ok(())
}

fn metadata_arg(raw: Option<&str>) -> anyhow::Result<Option<Metadata>> {
    raw.map(|raw| parse_metadata(raw).context("metadata must be a valid JSON object"))
        .transpose()
}

fn write_listing(
    out: &mut dyn Write,
    services: &[ServiceRecord],
    format: OutputFormat,
    with_status: bool,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => output::write_json(out, services),
        OutputFormat::Text if services.is_empty() => {
            let message = if with_status {
                "No services found"
            } else {
                "No healthy services found"
            };
            writeln!(out, "{}", message)?;
            Ok(())
        }
        OutputFormat::Text => Ok(output::write_table(out, services, with_status)?),
    }
}

fn confirm(out: &mut dyn Write, input: &mut dyn BufRead) -> anyhow::Result<bool> {
    write!(
        out,
        "Are you sure you want to clear all service registry data? (yes/no): "
    )?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

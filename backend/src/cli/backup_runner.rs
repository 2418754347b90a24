//! Execution logic for backup CLI commands.

use serde_json::json;

use crate::cli::backup::{error, output, table_row, BackupCli, BackupCommand, OutputFormat};
use crate::error::{AppError, Result};
use crate::services::backup_service::BackupService;

/// Run a backup CLI command against `service`.
pub async fn run(cli: BackupCli, service: &BackupService) -> Result<()> {
    let format = cli.format;
    let result = match &cli.command {
        BackupCommand::Create { .. } => run_create(format, service, &cli.command).await,
        BackupCommand::List => run_list(format, service).await,
        BackupCommand::Restore { path } => run_restore(format, service, path).await,
        BackupCommand::Delete { file_name } => run_delete(format, service, file_name).await,
    };
    if let Err(e) = &result {
        error(format, &e.to_string());
    }
    result
}

async fn run_create(
    format: OutputFormat,
    service: &BackupService,
    command: &BackupCommand,
) -> Result<()> {
    let result = service.create_backup(command.options(), None).await?;
    output(
        format,
        &format!(
            "Backup {} written to {} ({} bytes, tables: {})",
            result.backup_id,
            result.file_path.display(),
            result.size_bytes,
            result.tables.join(", ")
        ),
        &result,
    );
    Ok(())
}

async fn run_list(format: OutputFormat, service: &BackupService) -> Result<()> {
    let backups = service.list_backups().await?;
    if format == OutputFormat::Json {
        output(format, "", &backups);
        return Ok(());
    }

    if backups.is_empty() {
        println!("No backups in {}", service.backup_dir().display());
        return Ok(());
    }
    table_row(&["FILE", "BACKUP ID", "SIZE", "CREATED"]);
    for backup in &backups {
        table_row(&[
            &backup.file_name,
            &backup.backup_id,
            &backup.size_bytes.to_string(),
            &backup.created_at.to_rfc3339(),
        ]);
    }
    Ok(())
}

async fn run_restore(
    format: OutputFormat,
    service: &BackupService,
    path: &std::path::Path,
) -> Result<()> {
    let result = service.restore_backup(path, None).await?;
    let counts: Vec<String> = result
        .records
        .iter()
        .map(|(table, n)| format!("{}={}", table, n))
        .collect();
    output(
        format,
        &format!(
            "Restored backup {} ({})",
            result.backup_id,
            counts.join(", ")
        ),
        &result,
    );
    Ok(())
}

async fn run_delete(format: OutputFormat, service: &BackupService, file_name: &str) -> Result<()> {
    if !service.delete_backup(file_name, None).await {
        return Err(AppError::NotFound(format!("Backup {}", file_name)));
    }
    output(
        format,
        &format!("Deleted {}", file_name),
        &json!({ "deleted": file_name }),
    );
    Ok(())
}

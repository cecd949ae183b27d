//! Dossier CLI: view and edit a personal or company profile record.
//!
//! Reads DOSSIER_API_URL, DOSSIER_TOKEN and DOSSIER_USER_ID (a `.env` file works too).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dossier_cli::{
    group_selections, init_tracing, parse_assignment, parse_file_selection, parse_removal,
    payload_json, record_json, Removal,
};
use dossier_client::ApiClient;
use dossier_core::{
    ClientConfig, FormError, LoadOutcome, RecordFormController, RecordKind, SubmitOutcome,
    ValidationErrors,
};
use serde_json::json;

#[derive(Parser)]
#[command(name = "dossier", about = "Profile record CLI")]
struct Cli {
    /// Record kind: personal or company
    #[arg(long, global = true, default_value = "personal")]
    kind: RecordKind,

    /// User whose record is edited (overrides DOSSIER_USER_ID)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Server base URL (overrides DOSSIER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the stored record
    Show,
    /// Edit fields and attachments, then save
    Submit {
        /// Field value, NAME=VALUE (repeatable)
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
        /// File to attach, SLOT=PATH (repeatable; repeat a multi-file slot to add several)
        #[arg(long = "file", value_parser = parse_file_selection)]
        files: Vec<(String, PathBuf)>,
        /// Stored file to drop, SLOT or SLOT:INDEX (index into the current list)
        #[arg(long = "remove", value_parser = parse_removal)]
        remove: Vec<Removal>,
        /// Print what would be sent instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Download a stored file
    Download {
        /// Slot name, e.g. resume or payslips
        slot: String,
        /// Position within a multi-file slot
        #[arg(long)]
        index: Option<usize>,
        /// Destination path; defaults to the file's name in the current directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn report_invalid(errors: &ValidationErrors) -> anyhow::Error {
    for error in errors {
        eprintln!("  - {}", error);
    }
    anyhow::anyhow!("{} validation error(s); nothing was sent", errors.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Failed to load client configuration")?;
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
        config.validate()?;
    }
    if let Some(user) = cli.user {
        config.user_id = Some(user);
    }

    let client = Arc::new(ApiClient::from_config(&config).context(
        "Failed to create API client. Set DOSSIER_API_URL, DOSSIER_TOKEN and DOSSIER_USER_ID",
    )?);
    let controller = RecordFormController::new(cli.kind.schema(), client.clone());

    let loaded = controller
        .load_current(client.identity().as_ref())
        .await
        .context("Failed to load record")?;

    match cli.command {
        Commands::Show => {
            if loaded == LoadOutcome::Empty {
                eprintln!("No {} details saved yet", cli.kind);
            }
            let record = controller.snapshot().context("Record not loaded")?;
            print_json(&record_json(controller.schema(), &record))?;
        }
        Commands::Submit {
            set,
            files,
            remove,
            dry_run,
        } => {
            for (name, value) in set {
                controller.update_field(&name, value)?;
            }
            for removal in remove {
                let removed = controller.remove_existing(&removal.slot, removal.index)?;
                tracing::info!(slot = %removal.slot, file = %removed.display_name, "Marked for removal");
            }
            for (slot, pending) in group_selections(files) {
                controller.select_files(&slot, pending)?;
            }

            if dry_run {
                let preview = match controller.preview() {
                    Ok(preview) => preview,
                    Err(FormError::Invalid(errors)) => return Err(report_invalid(&errors)),
                    Err(e) => return Err(e.into()),
                };
                print_json(&payload_json(&preview.payload))?;
                return Ok(());
            }

            match controller.submit().await {
                Ok(SubmitOutcome::Saved { action, message }) => {
                    print_json(&json!({ "success": true, "action": action, "message": message }))?;
                }
                Ok(SubmitOutcome::Invalid(errors)) => return Err(report_invalid(&errors)),
                Ok(SubmitOutcome::AlreadySubmitting) => bail!("A submission is already in progress"),
                Err(FormError::Submission(e)) => bail!("{}", e.user_message()),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Download {
            slot,
            index,
            output,
        } => {
            let (file, bytes) = controller.download_existing(&slot, index).await?;
            let destination = output.unwrap_or_else(|| PathBuf::from(&file.display_name));
            tokio::fs::write(&destination, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", destination.display()))?;
            print_json(&json!({
                "name": file.display_name,
                "path": file.path,
                "savedTo": destination.display().to_string(),
                "size": bytes.len(),
            }))?;
        }
    }

    Ok(())
}

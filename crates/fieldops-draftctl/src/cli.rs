//! draftctl commands
//!
//! Each command opens a draft session against the configured API, applies the
//! requested edits and closes the session through `dispose()`, so nothing
//! typed on the command line is left unsaved.

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use fieldops_drafts::{
    AttachmentSlot, DraftGateway, DraftSession, LifecycleEvent, NewAttachment, DESCRIPTION,
    FIELD_ADRESSE, FIELD_DESCRIPTION, FIELD_NOM, FIELD_OBSERVATIONS, FIELD_PRENOM, GENERAL_INFO,
    OBSERVATIONS, PROFILE_SLOT_ID,
};
use fieldops_gateway::{DraftId, GatewayClient, StaticCredentials};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;

/// draftctl commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List drafts of the signed-in user
    List,

    /// Print a stored draft as JSON
    Show {
        /// Draft id
        id: String,
    },

    /// Start a new report
    New {
        #[command(flatten)]
        edits: EditArgs,

        /// Create the draft even if identity fields are missing
        #[arg(long)]
        force: bool,

        /// Submit the report once saved
        #[arg(long)]
        finalize: bool,
    },

    /// Edit an existing draft
    Edit {
        /// Draft id
        id: String,

        #[command(flatten)]
        edits: EditArgs,

        /// Submit the report once saved
        #[arg(long)]
        finalize: bool,
    },

    /// Submit a draft
    Finalize {
        /// Draft id
        id: String,
    },

    /// Delete a draft
    Discard {
        /// Draft id
        id: String,
    },
}

/// Field and photo edits shared by `new` and `edit`
#[derive(Debug, Default, Args)]
pub struct EditArgs {
    /// Last name
    #[arg(long)]
    pub nom: Option<String>,

    /// First name
    #[arg(long)]
    pub prenom: Option<String>,

    /// Site address
    #[arg(long)]
    pub adresse: Option<String>,

    /// Description text
    #[arg(long)]
    pub description: Option<String>,

    /// Observations text
    #[arg(long)]
    pub observations: Option<String>,

    /// Photo to attach, as SECTION=PATH (repeatable)
    #[arg(long = "photo", value_parser = parse_assignment::<PathBuf>)]
    pub photos: Vec<(String, PathBuf)>,

    /// Profile photo
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Uploaded photo to delete, as SECTION=FILENAME (repeatable)
    #[arg(long = "delete-photo", value_parser = parse_assignment::<String>)]
    pub delete_photos: Vec<(String, String)>,
}

/// Parse `KEY=VALUE`
pub fn parse_assignment<T: From<String>>(raw: &str) -> Result<(String, T), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), T::from(value.to_string())))
        }
        _ => Err(format!("expected SECTION=VALUE, got '{raw}'")),
    }
}

/// Execute a command, returning what to print
pub async fn execute(config: &Config, command: Commands) -> anyhow::Result<String> {
    let gateway = connect(config)?;

    match command {
        Commands::List => {
            let drafts = gateway.list_drafts().await?;
            if drafts.is_empty() {
                return Ok("No drafts".to_string());
            }
            let lines: Vec<String> = drafts
                .iter()
                .map(|d| {
                    format!(
                        "{}\t{} {}\t{}\t{}",
                        d.id,
                        d.nom.as_deref().unwrap_or("-"),
                        d.prenom.as_deref().unwrap_or("-"),
                        d.location.as_deref().unwrap_or("-"),
                        d.updated_at.as_deref().unwrap_or("-"),
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }

        Commands::Show { id } => {
            let record = gateway.get_draft(&DraftId::from(id)).await?;
            Ok(serde_json::to_string_pretty(&record)?)
        }

        Commands::New { edits, force, finalize } => {
            let session = DraftSession::new(gateway, config.autosave.clone());
            let mut events = session.subscribe();

            apply_edits(&session, edits).await?;
            if force && !session.save_now().await {
                bail!(save_failure(&session));
            }
            close(session, &mut events, finalize).await
        }

        Commands::Edit { id, edits, finalize } => {
            let session =
                DraftSession::resume(gateway, config.autosave.clone(), &DraftId::from(id)).await?;
            let mut events = session.subscribe();

            apply_edits(&session, edits).await?;
            close(session, &mut events, finalize).await
        }

        Commands::Finalize { id } => {
            let session =
                DraftSession::resume(gateway, config.autosave.clone(), &DraftId::from(id)).await?;
            let mut events = session.subscribe();
            close(session, &mut events, true).await
        }

        Commands::Discard { id } => {
            let session =
                DraftSession::resume(gateway, config.autosave.clone(), &DraftId::from(id)).await?;
            let mut events = session.subscribe();

            session.discard().await?;
            session.dispose().await;
            Ok(render_events(&mut events))
        }
    }
}

fn connect(config: &Config) -> anyhow::Result<Arc<dyn DraftGateway>> {
    if config.auth.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
        bail!("No bearer token: set FIELDOPS_TOKEN or [auth] token in the config file");
    }

    let credentials = Arc::new(StaticCredentials::new(config.auth.token.clone()));
    let client = GatewayClient::new(config.gateway.clone(), credentials)?;
    info!(base_url = %config.gateway.base_url, "Connected to drafts API");
    Ok(Arc::new(client))
}

async fn apply_edits(session: &DraftSession, edits: EditArgs) -> anyhow::Result<()> {
    let fields = [
        (GENERAL_INFO, FIELD_NOM, edits.nom),
        (GENERAL_INFO, FIELD_PRENOM, edits.prenom),
        (GENERAL_INFO, FIELD_ADRESSE, edits.adresse),
        (DESCRIPTION, FIELD_DESCRIPTION, edits.description),
        (OBSERVATIONS, FIELD_OBSERVATIONS, edits.observations),
    ];
    for (section, field, value) in fields {
        if let Some(value) = value {
            session.update_field(section, field, value)?;
        }
    }

    for (section, filename) in edits.delete_photos {
        session.delete_attachment(&slot(&section), &filename).await?;
    }

    // One entry per section, in first-seen order, so each section uploads as one batch
    let mut batches: Vec<(String, Vec<NewAttachment>)> = Vec::new();
    for (section, path) in edits.photos {
        let file = read_photo(&path).await?;
        match batches.iter_mut().find(|(s, _)| *s == section) {
            Some((_, files)) => files.push(file),
            None => batches.push((section, vec![file])),
        }
    }
    for (section, files) in batches {
        session.add_attachments(&section, files)?;
    }

    if let Some(path) = edits.profile {
        session.set_profile_photo(read_photo(&path).await?)?;
    }
    Ok(())
}

async fn close(
    session: DraftSession,
    events: &mut broadcast::Receiver<LifecycleEvent>,
    finalize: bool,
) -> anyhow::Result<String> {
    if finalize {
        let id = session.finalize().await?;
        session.dispose().await;
        return Ok(format!("{}Finalized {id}", render_events(events)));
    }

    session.flush().await;
    let draft_id = session.draft_id();
    let pending = session.has_pending_changes();
    let failure = save_failure(&session);
    session.dispose().await;

    let mut output = render_events(events);
    match draft_id {
        Some(id) if !pending => output.push_str(&format!("Saved {id}")),
        Some(id) => output.push_str(&format!("Draft {id} has unsaved changes: {failure}")),
        None => output.push_str(&failure),
    }
    Ok(output)
}

fn save_failure(session: &DraftSession) -> String {
    match session.autosave_state().error {
        Some(error) => error,
        None => {
            let snapshot = session.snapshot();
            let missing: Vec<&str> = snapshot
                .section(GENERAL_INFO)
                .map(|s| {
                    s.fields
                        .iter()
                        .filter(|f| f.required && !f.is_filled())
                        .map(|f| f.id.as_str())
                        .collect()
                })
                .unwrap_or_default();
            format!("Not saved, required fields missing: {}", missing.join(", "))
        }
    }
}

/// One JSON line per lifecycle event
fn render_events(events: &mut broadcast::Receiver<LifecycleEvent>) -> String {
    let mut out = String::new();
    while let Ok(event) = events.try_recv() {
        if let Ok(line) = serde_json::to_string(&event) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

fn slot(section: &str) -> AttachmentSlot {
    if section == PROFILE_SLOT_ID {
        AttachmentSlot::Profile
    } else {
        AttachmentSlot::Section(section.to_string())
    }
}

async fn read_photo(path: &Path) -> anyhow::Result<NewAttachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());
    Ok(NewAttachment::new(file_name, content_type_for(path), bytes))
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

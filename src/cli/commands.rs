//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

// Allow certain patterns that improve readability in CLI output formatting
#![allow(clippy::uninlined_format_args)]

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::{
    Coordinator, MultiOutcome, Orchestrator, PipelineConfig, PromptSet, RunMode, create_provider,
};
use crate::cli::output::{OutputFormat, format_digest, format_multi_outcome};
use crate::cli::parser::{Cli, Commands};
use crate::core::{DocumentId, Transcript, TranscriptEntry, TranscriptResponse};
use crate::error::{CommandError, Result};
use crate::retrieval::{MemoryIndex, RetrievalGateway};

/// Parameters for the ask command.
#[derive(Debug, Clone)]
pub struct AskParams<'a> {
    /// Question to answer.
    pub query: &'a str,
    /// Documents to load.
    pub docs: &'a [PathBuf],
    /// Multi-document mode.
    pub mode: RunMode,
    /// Passages retrieved per run.
    pub top_k: Option<usize>,
    /// Per-call timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Retries per gateway call.
    pub retries: Option<u32>,
    /// Disables the retrieval fallback.
    pub no_fallback: bool,
    /// Transcript export path.
    pub export: Option<&'a Path>,
    /// Prompt template directory.
    pub prompt_dir: Option<&'a Path>,
    /// Include run traces in text output.
    pub verbose: bool,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let prompt_dir = cli.prompt_dir.as_deref();

    match &cli.command {
        Commands::Ask {
            query,
            docs,
            mode,
            top_k,
            timeout,
            retries,
            no_fallback,
            export,
        } => {
            let params = AskParams {
                query,
                docs,
                mode: (*mode).into(),
                top_k: *top_k,
                timeout_secs: *timeout,
                retries: *retries,
                no_fallback: *no_fallback,
                export: export.as_deref(),
                prompt_dir,
                verbose: cli.verbose,
            };
            cmd_ask(&params, format)
        }
        Commands::Digest { file } => cmd_digest(file, prompt_dir, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Reads and indexes plain-text documents.
///
/// Documents are keyed by file name; a repeated file name falls back to
/// the full path so every document keeps its own id.
fn load_documents(paths: &[PathBuf]) -> Result<(MemoryIndex, Vec<DocumentId>)> {
    let mut index = MemoryIndex::new();
    let mut ids: Vec<DocumentId> = Vec::with_capacity(paths.len());

    for path in paths {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to read {}: {e}", path.display()))
        })?;

        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let mut id = DocumentId::new(name);
        if ids.contains(&id) {
            id = DocumentId::new(path.display().to_string());
        }
        if ids.contains(&id) {
            debug!(document = %id, "document listed twice, skipping");
            continue;
        }

        let passages = index.add_document(id.clone(), &text);
        if passages == 0 {
            warn!(document = %id, "document has no text");
        }
        ids.push(id);
    }

    Ok((index, ids))
}

fn build_orchestrator(config: PipelineConfig, index: MemoryIndex) -> Result<Orchestrator> {
    let provider = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let retrieval: Arc<dyn RetrievalGateway> = Arc::new(index);
    Ok(Orchestrator::new(Arc::from(provider), retrieval, config))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Cancels `cancel` on Ctrl-C. Must be called inside the runtime.
fn cancel_on_interrupt(cancel: &CancellationToken) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight runs");
            token.cancel();
        }
    });
}

fn cmd_ask(params: &AskParams<'_>, format: OutputFormat) -> Result<String> {
    let (index, documents) = load_documents(params.docs)?;

    let mut builder = PipelineConfig::builder().from_env();
    if let Some(k) = params.top_k {
        builder = builder.top_k(k);
    }
    if let Some(secs) = params.timeout_secs {
        builder = builder.stage_timeout(std::time::Duration::from_secs(secs));
    }
    if let Some(n) = params.retries {
        builder = builder.max_retries(n);
    }
    if params.no_fallback {
        builder = builder.fallback_enabled(false);
    }
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    let config = builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Configuration error: {e}"))
    })?;

    let mut transcript = params.export.map(existing_transcript).transpose()?;
    let coordinator = Coordinator::new(Arc::new(build_orchestrator(config, index)?));
    let rt = runtime()?;
    let cancel = CancellationToken::new();

    let multi = rt.block_on(async {
        cancel_on_interrupt(&cancel);
        coordinator
            .run_many(params.query, &documents, params.mode, &[], &cancel)
            .await
    });

    if let (Some(path), Some(transcript)) = (params.export, transcript.as_mut()) {
        transcript.push(transcript_entry(params.query, &multi, &documents));
        export_transcript(transcript, path)?;
    }

    let output = match format {
        OutputFormat::Text => format_multi_outcome(&multi, params.verbose),
        OutputFormat::Json => format.to_json(&multi),
    };

    if multi.completed_count() == 0 {
        return Err(CommandError::ExecutionFailed(output).into());
    }
    Ok(output)
}

/// Records one multi-document exchange.
fn transcript_entry(query: &str, multi: &MultiOutcome, documents: &[DocumentId]) -> TranscriptEntry {
    let response = match multi.results.as_slice() {
        [only] => TranscriptResponse::Single(only.outcome.display_text()),
        results => TranscriptResponse::PerDocument(
            results
                .iter()
                .map(|r| (r.scope.to_string(), r.outcome.display_text()))
                .collect(),
        ),
    };
    let status = if multi.all_completed() {
        "completed"
    } else if multi.completed_count() == 0 {
        "failed"
    } else {
        "partial"
    };

    TranscriptEntry {
        query: query.to_string(),
        response,
        documents: documents.iter().map(ToString::to_string).collect(),
        timestamp: Utc::now(),
        status: status.to_string(),
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
}

/// Entries already exported to a JSON transcript at `path`.
///
/// Markdown exports are not read back and start empty.
fn existing_transcript(path: &Path) -> Result<Transcript> {
    if is_markdown(path) || !path.exists() {
        return Ok(Transcript::new());
    }
    let text = std::fs::read_to_string(path).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to read transcript {}: {e}", path.display()))
    })?;
    if text.trim().is_empty() {
        return Ok(Transcript::new());
    }
    Transcript::from_json(&text).map_err(|e| {
        CommandError::ExecutionFailed(format!(
            "Refusing to overwrite {}: not a transcript export ({e})",
            path.display()
        ))
        .into()
    })
}

/// Writes `transcript` as Markdown for `.md` paths and as JSON otherwise.
fn export_transcript(transcript: &Transcript, path: &Path) -> Result<()> {
    let now = Utc::now();
    let is_markdown = is_markdown(path);

    let body = if is_markdown {
        transcript.to_markdown(now)
    } else {
        transcript
            .to_json(now)
            .map_err(|e| CommandError::OutputFormat(e.to_string()))?
    };
    std::fs::write(path, body).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to export transcript to {}: {e}", path.display()))
    })?;
    debug!(path = %path.display(), entries = transcript.entries().len(), "transcript exported");
    Ok(())
}

fn cmd_digest(file: &Path, prompt_dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let (index, documents) = load_documents(&[file.to_path_buf()])?;
    let Some(document) = documents.into_iter().next() else {
        return Err(CommandError::ExecutionFailed(format!(
            "No document loaded from {}",
            file.display()
        ))
        .into());
    };

    let mut builder = PipelineConfig::builder().from_env();
    if let Some(dir) = prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    let config = builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Configuration error: {e}"))
    })?;

    let orchestrator = build_orchestrator(config, index)?;
    let rt = runtime()?;
    let cancel = CancellationToken::new();

    let digest = rt.block_on(async {
        cancel_on_interrupt(&cancel);
        orchestrator.digest(&document, &cancel).await
    })?;

    match format {
        OutputFormat::Text => Ok(format_digest(&digest)),
        OutputFormat::Json => Ok(format.to_json(&digest)),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let _ = writeln!(
                    output,
                    "  {}",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                );
            }
            output.push_str("\nEdit these files to customize stage system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

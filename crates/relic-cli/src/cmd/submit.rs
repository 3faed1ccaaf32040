use anyhow::{Context as _, Result};
use clap::Args;
use relic_core::ingest::{IngestError, IngestOutcome, IngestRequest, Ingestor};
use relic_core::upsert::UpsertOutcome;
use serde::Serialize;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Project;
use crate::output::{OutputMode, coded_failure, kv, render};

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// File holding the identify text; reads stdin when omitted.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Username of the poster.
    #[arg(long)]
    pub submitter: Option<String>,

    /// Where the item was found.
    #[arg(long)]
    pub origin: Option<String>,

    /// Withhold the item from listings for the configured delay window.
    #[arg(long)]
    pub delayed: bool,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum SubmitResult {
    Created {
        submission_id: i64,
        slug: String,
        cache_warning: Option<String>,
    },
    Updated {
        submission_id: i64,
        slug: String,
        cache_warning: Option<String>,
    },
    Skipped {
        submission_id: i64,
        reason: String,
        cache_warning: Option<String>,
    },
    Duplicate {
        submission_id: i64,
        slug: Option<String>,
    },
}

/// Execute `relic submit`.
///
/// # Errors
///
/// Coded failures for empty text or an unextractable item name; store and
/// io failures otherwise.
pub fn run_submit(args: &SubmitArgs, root: &Path, mode: OutputMode) -> Result<()> {
    let project = Project::open(root)?;
    let text = read_text(args.file.as_deref())?;

    let ingestor = Ingestor::new(
        project.store.clone(),
        project.dedup(),
        Arc::clone(&project.engine),
    );

    let outcome = ingestor
        .ingest(&IngestRequest {
            text: &text,
            submitter: args.submitter.as_deref(),
            origin: args.origin.as_deref(),
            delayed: args.delayed,
        })
        .map_err(|e: IngestError| coded_failure(e.code(), &e))?;

    let result = match outcome {
        IngestOutcome::Ingested {
            submission_id,
            upsert,
            cache_warning,
        } => match upsert {
            UpsertOutcome::Created(slug) => SubmitResult::Created {
                submission_id,
                slug: slug.to_string(),
                cache_warning,
            },
            UpsertOutcome::Updated(slug) => SubmitResult::Updated {
                submission_id,
                slug: slug.to_string(),
                cache_warning,
            },
            UpsertOutcome::Skipped(reason) => SubmitResult::Skipped {
                submission_id,
                reason: reason.as_str().to_string(),
                cache_warning,
            },
        },
        IngestOutcome::Duplicate(hit) => SubmitResult::Duplicate {
            submission_id: hit.submission_id,
            slug: hit.slug.map(|s| s.to_string()),
        },
    };

    render(mode, &result, |r, w| match r {
        SubmitResult::Created {
            slug,
            submission_id,
            cache_warning,
        } => {
            writeln!(w, "Created item '{slug}' from submission {submission_id}.")?;
            warn_line(w, cache_warning.as_deref())
        }
        SubmitResult::Updated {
            slug,
            submission_id,
            cache_warning,
        } => {
            writeln!(w, "Merged submission {submission_id} into item '{slug}'.")?;
            warn_line(w, cache_warning.as_deref())
        }
        SubmitResult::Skipped {
            reason,
            submission_id,
            cache_warning,
        } => {
            writeln!(w, "Recorded submission {submission_id}; skipped ({reason}).")?;
            warn_line(w, cache_warning.as_deref())
        }
        SubmitResult::Duplicate {
            submission_id,
            slug,
        } => {
            kv(w, "duplicate of", format!("submission {submission_id}"))?;
            if let Some(slug) = slug {
                kv(w, "item", slug)?;
            }
            Ok(())
        }
    })
}

fn warn_line(w: &mut dyn std::io::Write, warning: Option<&str>) -> std::io::Result<()> {
    if let Some(warning) = warning {
        writeln!(w, "warning: {warning}")?;
    }
    Ok(())
}

fn read_text(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read submission file {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("read submission from stdin")?;
            Ok(text)
        }
    }
}

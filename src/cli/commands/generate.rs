//! Generate Command
//!
//! Fill in every missing chapter outline and section of a stored book.
//! Each snapshot is written back to the store, so an interrupted run resumes
//! where it stopped when the command is repeated.
//!
//! Usage:
//!   bookforge generate <book-id> [--research]

use std::sync::Arc;

use crate::ai::{CancellationToken, PerplexityResearch, TimeoutConfig};
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, cancel_on_ctrl_c, runtime};
use crate::pipeline::GenerationPipeline;
use crate::types::{ForgeError, Result};

pub fn run(id: &str, research: bool, quiet: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();
    let mut book = ctx.store.load(id)?;

    if book.is_complete() {
        output.success(&format!("\"{}\" is already complete", book.title));
        return Ok(());
    }

    let mut pipeline = GenerationPipeline::new(ctx.router(), ctx.pipeline_config());
    if research {
        let credentials = ctx.credentials.research.as_ref().ok_or_else(|| {
            ForgeError::Config(
                "Research requires BOOKFORGE_RESEARCH_API_KEY or PERPLEXITY_API_KEY".to_string(),
            )
        })?;
        let timeout = TimeoutConfig::from(&ctx.config).http_request;
        let client = PerplexityResearch::new(credentials, &ctx.config.research, timeout)?;
        pipeline = pipeline.with_research(Arc::new(client));
    }

    let before = book.progress();
    output.header(&format!("Generating \"{}\"", book.title));
    if before.completed_sections > 0 {
        output.info(&format!(
            "Resuming: {}/{} sections already written",
            before.completed_sections, before.total_sections
        ));
    }

    let cancel = CancellationToken::new();
    let mut on_progress = ctx.persist_snapshots(quiet);
    let rt = runtime()?;
    let result = rt.block_on(async {
        let guard = cancel_on_ctrl_c(&cancel);
        let result = if research {
            pipeline
                .generate_all_with_research(
                    &mut book,
                    &ctx.credentials,
                    &ctx.environment,
                    &mut on_progress,
                    &cancel,
                )
                .await
        } else {
            pipeline
                .generate_all(
                    &mut book,
                    &ctx.credentials,
                    &ctx.environment,
                    &mut on_progress,
                    &cancel,
                )
                .await
        };
        guard.abort();
        result
    });

    // The last snapshot reflects the final in-memory state either way
    ctx.store.save(&book)?;

    match result {
        Ok(()) => {
            output.success(&format!("Finished \"{}\"", book.title));
            Ok(())
        }
        Err(ForgeError::Cancelled) => {
            let progress = book.progress();
            output.warning(&format!(
                "Stopped at {}/{} sections. Run 'bookforge generate {}' to resume.",
                progress.completed_sections, progress.total_sections, book.id
            ));
            Ok(())
        }
        Err(e) => {
            output.error(&format!(
                "Generation stopped; progress is saved. Re-run 'bookforge generate {}' to resume.",
                book.id
            ));
            Err(e)
        }
    }
}

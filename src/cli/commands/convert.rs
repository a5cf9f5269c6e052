//! Convert Command
//!
//! Derive a copy of a stored book at a different heat level. The derived
//! book is stored under its own id from the first snapshot on, so a stopped
//! conversion can be finished with `--resume`.
//!
//! Usage:
//!   bookforge convert <book-id> --heat <level>
//!   bookforge convert <derived-id> --resume

use crate::ai::CancellationToken;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, cancel_on_ctrl_c, runtime};
use crate::pipeline::HeatLevelConverter;
use crate::types::{Book, ForgeError, HeatLevel, Result};

pub fn run(id: &str, heat: Option<HeatLevel>, resume: bool, quiet: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();
    let converter = HeatLevelConverter::new(ctx.router(), ctx.pipeline_config());
    let cancel = CancellationToken::new();
    let rt = runtime()?;

    let mut derived_id: Option<String> = None;
    let mut persist = ctx.persist_snapshots(quiet);
    let mut on_progress = |book: &Book| {
        derived_id.get_or_insert_with(|| book.id.clone());
        persist(book);
    };

    let result = if resume {
        let mut derived = ctx.store.load(id)?;
        let level = derived.heat_level.ok_or_else(|| {
            ForgeError::InvalidInput(format!("Book {} is not a heat-level conversion", id))
        })?;
        output.header(&format!("Resuming \"{}\" at {}", derived.title, level.label()));

        let result = rt.block_on(async {
            let guard = cancel_on_ctrl_c(&cancel);
            let result = converter
                .resume(
                    &mut derived,
                    &ctx.credentials,
                    &ctx.environment,
                    &mut on_progress,
                    &cancel,
                )
                .await;
            guard.abort();
            result
        });
        ctx.store.save(&derived)?;
        result.map(|()| derived)
    } else {
        let level = heat.ok_or_else(|| {
            ForgeError::InvalidInput("--heat is required unless --resume is given".to_string())
        })?;
        let original = ctx.store.load(id)?;
        if !original.is_romance() {
            output.warning(&format!(
                "\"{}\" is {}, heat levels are written for romance",
                original.title, original.genre
            ));
        }
        output.header(&format!("Converting \"{}\" to {}", original.title, level.label()));

        rt.block_on(async {
            let guard = cancel_on_ctrl_c(&cancel);
            let result = converter
                .convert(
                    &original,
                    level,
                    &ctx.credentials,
                    &ctx.environment,
                    &mut on_progress,
                    &cancel,
                )
                .await;
            guard.abort();
            result
        })
    };

    match result {
        Ok(book) => {
            ctx.store.save(&book)?;
            output.success(&format!("Finished \"{}\"", book.title));
            println!("  Book id: {}", book.id);
            Ok(())
        }
        Err(ForgeError::Cancelled) => {
            match derived_id {
                Some(derived) => output.warning(&format!(
                    "Stopped. Run 'bookforge convert {} --resume' to finish.",
                    derived
                )),
                None => output.warning("Stopped before anything was generated."),
            }
            Ok(())
        }
        Err(e) => {
            if let Some(derived) = derived_id {
                output.error(&format!(
                    "Conversion stopped; progress is saved. Run 'bookforge convert {} --resume' to continue.",
                    derived
                ));
            }
            Err(e)
        }
    }
}

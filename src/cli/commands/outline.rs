//! Outline Command
//!
//! Generate a book outline from a premise and store it as a draft.
//!
//! Usage:
//!   bookforge outline --prompt "..." [--genre romance] [--heat steamy] [--chapters 12]

use tracing::info;

use crate::ai::{CancellationToken, OutlineRequest, ProviderKind, Routed};
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, cancel_on_ctrl_c, runtime};
use crate::types::Result;

pub fn run(request: OutlineRequest) -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();
    let router = ctx.router();
    let cancel = CancellationToken::new();

    output.info(&format!("Generating outline for a {} book...", request.genre));

    let rt = runtime()?;
    let routed = rt.block_on(async {
        let guard = cancel_on_ctrl_c(&cancel);
        let result = router
            .generate_outline(&request, &ctx.credentials, &ctx.environment, &cancel)
            .await;
        guard.abort();
        result
    })?;

    let Routed {
        value: book,
        provider,
        attempted,
    } = routed;
    ctx.store.save(&book)?;
    info!(book = %book.id, provider = %provider, "Stored outline");

    if let Some(note) = fallback_note(provider, &attempted) {
        output.warning(&note);
    }
    output.success(&format!("Outlined \"{}\" ({} chapters)", book.title, book.chapters.len()));
    output.book_tree(&book);
    println!();
    println!("  Book id: {}", book.id);
    println!("  Next:    bookforge generate {}", book.id);
    Ok(())
}

/// Warning line when the outline came from a fallback provider
fn fallback_note(provider: ProviderKind, attempted: &[ProviderKind]) -> Option<String> {
    if attempted.len() < 2 {
        return None;
    }
    let tried = attempted
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("Served by {} after trying {}", provider, tried))
}

//! Status Command
//!
//! Show generation progress for one stored book, or list all of them.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

pub fn run(id: Option<&str>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let json_output = format == "json";
    let output = Output::new();

    let Some(id) = id else {
        let books = ctx.store.list()?;
        if json_output {
            println!("{}", serde_json::to_string_pretty(&books)?);
        } else if books.is_empty() {
            println!("No books yet. Run 'bookforge outline --prompt \"...\"' to start one.");
        } else {
            output.header(&format!("Books in {}", ctx.store.dir().display()));
            output.book_list(&books);
        }
        return Ok(());
    };

    let book = ctx.store.load(id)?;
    let progress = book.progress();

    if json_output {
        let status = serde_json::json!({
            "id": book.id,
            "title": book.title,
            "status": book.status,
            "heatLevel": book.heat_level,
            "progress": progress,
            "updatedAt": book.updated_at,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    output.header(&book.title);
    println!("  Id:       {}", book.id);
    println!("  Genre:    {}", book.genre);
    if let Some(level) = book.heat_level {
        println!("  Heat:     {}", level.label());
    }
    println!("  Status:   {}", book.status);
    println!(
        "  Progress: {}/{} sections ({:.0}%)",
        progress.completed_sections,
        progress.total_sections,
        progress.percent()
    );
    println!(
        "  Updated:  {}",
        book.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    output.section("Chapters");
    output.book_tree(&book);
    Ok(())
}

use console::style;

use crate::storage::BookSummary;
use crate::types::{Book, BookStatus, NodeStatus};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// One-line progress update printed after each pipeline snapshot
    pub fn progress(&self, book: &Book) {
        let progress = book.progress();
        println!(
            "  {} {}/{} sections ({:.0}%), {}/{} chapters outlined",
            style("→").dim(),
            progress.completed_sections,
            progress.total_sections,
            progress.percent(),
            progress.chapters_with_outline,
            progress.chapters,
        );
    }

    /// Chapter tree with per-node status markers
    pub fn book_tree(&self, book: &Book) {
        for (i, chapter) in book.chapters.iter().enumerate() {
            println!(
                "{} {}. {}",
                node_marker(chapter.status),
                i + 1,
                style(&chapter.title).bold()
            );
            match &chapter.sub_chapters {
                Some(sections) => {
                    for section in sections {
                        println!("    {} {}", node_marker(section.status), section.title);
                    }
                }
                None => println!("    {}", style("(no outline yet)").dim()),
            }
        }
    }

    pub fn book_list(&self, books: &[BookSummary]) {
        for book in books {
            println!(
                "{} {}  {} [{}] {:.0}%",
                book_marker(book.status),
                style(&book.id).dim(),
                book.title,
                book.status,
                book.progress.percent(),
            );
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

fn node_marker(status: NodeStatus) -> console::StyledObject<&'static str> {
    match status {
        NodeStatus::Completed => style("✓").green(),
        NodeStatus::Generating => style("…").yellow(),
        NodeStatus::Pending => style("·").dim(),
    }
}

fn book_marker(status: BookStatus) -> console::StyledObject<&'static str> {
    match status {
        BookStatus::Completed => style("✓").green(),
        BookStatus::Generating => style("…").yellow(),
        BookStatus::Draft => style("·").dim(),
    }
}

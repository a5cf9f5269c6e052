//! Heat-Level Conversion
//!
//! Derives a new book from an existing one at a different heat level. The
//! derived book keeps the original's structure and metadata, but every node
//! gets a fresh identity and all prose is regenerated with the
//! intensity-aware content operation.

use std::sync::Arc;

use tracing::{info, instrument};

use super::{ContentMode, PipelineConfig, Traversal};
use crate::ai::cancel::CancellationToken;
use crate::ai::router::ServiceRouter;
use crate::config::{Credentials, RuntimeEnvironment};
use crate::types::{Book, Chapter, ForgeError, HeatLevel, Result, SubChapter};

pub struct HeatLevelConverter {
    router: Arc<ServiceRouter>,
    config: PipelineConfig,
}

impl HeatLevelConverter {
    pub fn new(router: Arc<ServiceRouter>, config: PipelineConfig) -> Self {
        Self { router, config }
    }

    /// Build and fully generate a copy of `original` at `level`
    ///
    /// The derived book is only returned on success; callers that need the
    /// partial result after a cancellation keep the last `on_progress` snapshot.
    #[instrument(skip_all, fields(book = %original.id, level = %level))]
    pub async fn convert(
        &self,
        original: &Book,
        level: HeatLevel,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        on_progress: &mut impl FnMut(&Book),
        cancel: &CancellationToken,
    ) -> Result<Book> {
        if original.chapters.is_empty() {
            return Err(ForgeError::InvalidInput(
                "cannot convert a book without chapters".to_string(),
            ));
        }

        let mut derived = derive_skeleton(original, level);
        info!(derived = %derived.id, "Converting book to new heat level");
        self.resume(&mut derived, credentials, environment, on_progress, cancel)
            .await?;
        Ok(derived)
    }

    /// Continue generating a derived book left incomplete by a stopped conversion
    pub async fn resume(
        &self,
        derived: &mut Book,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        on_progress: &mut impl FnMut(&Book),
        cancel: &CancellationToken,
    ) -> Result<()> {
        let level = derived.heat_level.ok_or_else(|| {
            ForgeError::InvalidInput(format!("book {} has no heat level", derived.id))
        })?;

        Traversal {
            router: &self.router,
            credentials,
            environment,
            cancel,
            pacing: self.config.pacing,
            mode: ContentMode::Intensity {
                level,
                perspective: derived.perspective,
            },
        }
        .run(derived, on_progress)
        .await
    }
}

/// Fresh-identity copy of `original` at `level` with all prose cleared
pub fn derive_skeleton(original: &Book, level: HeatLevel) -> Book {
    let mut derived = Book::new(
        format!("{} ({})", base_title(&original.title), level.label()),
        original.genre.clone(),
    );
    derived.author = original.author.clone();
    derived.description = original.description.clone();
    derived.sub_genre = original.sub_genre.clone();
    derived.perspective = original.perspective;
    derived.tone = original.tone.clone();
    derived.target_audience = original.target_audience.clone();
    derived.heat_level = Some(level);
    derived.chapters = original
        .chapters
        .iter()
        .map(|chapter| {
            let mut copy = Chapter::new(chapter.title.clone(), chapter.description.clone());
            copy.sub_chapters = chapter
                .sub_chapters
                .as_ref()
                .filter(|sections| !sections.is_empty())
                .map(|sections| {
                    sections
                        .iter()
                        .map(|s| SubChapter::new(s.title.clone(), s.description.clone()))
                        .collect()
                });
            copy
        })
        .collect();
    derived
}

/// Drop a previous conversion's " (Label)" suffix so titles don't stack
fn base_title(title: &str) -> &str {
    HeatLevel::ALL
        .iter()
        .find_map(|level| {
            title
                .strip_suffix(')')
                .and_then(|t| t.strip_suffix(level.label()))
                .and_then(|t| t.strip_suffix(" ("))
        })
        .unwrap_or(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::router::testing::{MockFactory, MockProbe, both_clouds, router};
    use crate::types::{BookStatus, NodeStatus, Perspective};
    use std::collections::HashSet;

    fn finished_book() -> Book {
        let mut book = Book::new("Tides", "Romance");
        book.author = "A. Writer".to_string();
        book.heat_level = Some(HeatLevel::Sweet);
        book.perspective = Some(Perspective::ThirdLimited);
        book.tone = Some("wistful".to_string());
        book.status = BookStatus::Completed;

        let mut first = Chapter::new("Arrival", "She arrives");
        first.status = NodeStatus::Completed;
        first.sub_chapters = Some(
            ["Harbor", "Docks"]
                .iter()
                .map(|title| {
                    let mut s = SubChapter::new(*title, format!("At the {}", title));
                    s.status = NodeStatus::Completed;
                    s.content = Some("Old prose".to_string());
                    s.image_url = Some("https://img/1.png".to_string());
                    s
                })
                .collect(),
        );
        book.chapters = vec![first, Chapter::new("Storm", "The storm hits")];
        book
    }

    fn ids(book: &Book) -> HashSet<String> {
        let mut ids = HashSet::from([book.id.clone()]);
        for chapter in &book.chapters {
            ids.insert(chapter.id.clone());
            for section in chapter.sub_chapters.iter().flatten() {
                ids.insert(section.id.clone());
            }
        }
        ids
    }

    #[test]
    fn test_skeleton_has_fresh_identity_and_cleared_content() {
        let original = finished_book();
        let derived = derive_skeleton(&original, HeatLevel::Spicy);

        assert_eq!(derived.title, "Tides (Spicy)");
        assert_eq!(derived.heat_level, Some(HeatLevel::Spicy));
        assert_eq!(derived.perspective, original.perspective);
        assert_eq!(derived.author, original.author);
        assert_eq!(derived.tone, original.tone);
        assert_eq!(derived.status, BookStatus::Draft);
        assert!(ids(&derived).is_disjoint(&ids(&original)));

        assert_eq!(derived.chapters.len(), 2);
        let sections = derived.chapters[0].sub_chapters.as_ref().unwrap();
        assert_eq!(sections.len(), 2);
        assert!(sections.iter().all(|s| s.content.is_none() && s.image_url.is_none()));
        assert!(sections.iter().all(|s| s.status == NodeStatus::Pending));
        assert!(derived.chapters[1].sub_chapters.is_none());
    }

    #[test]
    fn test_title_suffix_does_not_stack() {
        let mut original = finished_book();
        original.title = "Tides (Sweet)".to_string();
        assert_eq!(derive_skeleton(&original, HeatLevel::Explicit).title, "Tides (Explicit)");

        original.title = "Notes (draft)".to_string();
        assert_eq!(derive_skeleton(&original, HeatLevel::Clean).title, "Notes (draft) (Clean)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_convert_generates_with_new_level() {
        let (router, factory, _) = router(MockFactory::well_behaved(), MockProbe::new(false, false));
        let converter = HeatLevelConverter::new(Arc::new(router), PipelineConfig::default());
        let original = finished_book();
        let snapshot = original.clone();
        let mut first_emitted: Option<Book> = None;

        let derived = converter
            .convert(
                &original,
                HeatLevel::Steamy,
                &both_clouds(),
                &RuntimeEnvironment::cloud_only(),
                &mut |b: &Book| {
                    first_emitted.get_or_insert_with(|| b.clone());
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(original, snapshot);
        assert_eq!(derived.status, BookStatus::Completed);
        assert!(derived.is_complete());
        assert_ne!(derived.id, original.id);

        let skeleton = first_emitted.unwrap();
        assert_eq!(skeleton.id, derived.id);
        assert_eq!(skeleton.status, BookStatus::Generating);
        assert_eq!(skeleton.progress().completed_sections, 0);

        // 2 sections + outline of chapter two + 3 sections
        assert_eq!(factory.primary.call_count(), 6);
        let prompts = factory.primary.prompts.lock().unwrap();
        let content_prompts: Vec<_> = prompts
            .iter()
            .filter(|p| p.contains("<TASK>section-content</TASK>"))
            .collect();
        assert_eq!(content_prompts.len(), 5);
        assert!(content_prompts.iter().all(|p| p.contains("Steamy")));
        assert!(content_prompts.iter().all(|p| p.contains("third person limited")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_convert_cancelled_then_resumed() {
        let (router, _, _) = router(MockFactory::well_behaved(), MockProbe::new(false, false));
        let converter = HeatLevelConverter::new(Arc::new(router), PipelineConfig::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut last: Option<Book> = None;

        let err = converter
            .convert(
                &finished_book(),
                HeatLevel::Clean,
                &both_clouds(),
                &RuntimeEnvironment::cloud_only(),
                &mut |b: &Book| {
                    if b.progress().completed_sections == 1 {
                        trigger.cancel();
                    }
                    last = Some(b.clone());
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(err.is_cancelled());

        let mut partial = last.unwrap();
        assert_eq!(partial.progress().completed_sections, 1);

        cancel.reset();
        converter
            .resume(
                &mut partial,
                &both_clouds(),
                &RuntimeEnvironment::cloud_only(),
                &mut |_: &Book| {},
                &cancel,
            )
            .await
            .unwrap();
        assert!(partial.is_complete());
        assert_eq!(partial.heat_level, Some(HeatLevel::Clean));
    }

    #[tokio::test]
    async fn test_convert_rejects_empty_book() {
        let (router, _, _) = router(MockFactory::well_behaved(), MockProbe::new(false, false));
        let converter = HeatLevelConverter::new(Arc::new(router), PipelineConfig::default());

        let err = converter
            .convert(
                &Book::new("Empty", "Romance"),
                HeatLevel::Sweet,
                &both_clouds(),
                &RuntimeEnvironment::cloud_only(),
                &mut |_: &Book| {},
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidInput(_)));
    }
}

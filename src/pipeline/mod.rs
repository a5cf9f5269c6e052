//! Generation Pipeline
//!
//! Walks a book's chapter/section tree and fills it in, one provider call
//! at a time:
//!
//! ```text
//! book → generating
//!   chapter without sections → chapter outline
//!     section (skip if done) → generating → content → completed → pacing
//!   chapter → completed
//! book → completed
//! ```
//!
//! The book is mutated in place and handed to `on_progress` after every
//! single-node transition, so the caller always holds the last consistent
//! snapshot. A stopped or failed run is resumed by calling again with the
//! same book: completed sections are skipped and a section left in
//! `generating` is generated again.

pub mod heat;

pub use heat::HeatLevelConverter;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::ai::cancel::CancellationToken;
use crate::ai::research::{ResearchClient, enrich_description};
use crate::ai::router::ServiceRouter;
use crate::config::{Credentials, PipelineSettings, RuntimeEnvironment};
use crate::constants::pipeline as pipeline_constants;
use crate::types::{Book, BookStatus, ForgeError, HeatLevel, NodeStatus, Perspective, Result};

/// Pacing between sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Pause after each generated section
    pub pacing: Duration,
    /// Pause after each researched section
    pub research_pacing: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(pipeline_constants::PACING_MS),
            research_pacing: Duration::from_millis(pipeline_constants::RESEARCH_PACING_MS),
        }
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            pacing: Duration::from_millis(settings.pacing_ms),
            research_pacing: Duration::from_millis(settings.research_pacing_ms),
        }
    }
}

/// How each section's prose is produced
#[derive(Clone, Copy)]
pub(crate) enum ContentMode<'a> {
    Plain,
    Research(&'a dyn ResearchClient),
    Intensity {
        level: HeatLevel,
        perspective: Option<Perspective>,
    },
}

pub struct GenerationPipeline {
    router: Arc<ServiceRouter>,
    config: PipelineConfig,
    research: Option<Arc<dyn ResearchClient>>,
}

impl GenerationPipeline {
    pub fn new(router: Arc<ServiceRouter>, config: PipelineConfig) -> Self {
        Self {
            router,
            config,
            research: None,
        }
    }

    pub fn with_research(mut self, client: Arc<dyn ResearchClient>) -> Self {
        self.research = Some(client);
        self
    }

    pub fn router(&self) -> &Arc<ServiceRouter> {
        &self.router
    }

    /// Generate every missing outline and section of `book`
    #[instrument(skip_all, fields(book = %book.id))]
    pub async fn generate_all(
        &self,
        book: &mut Book,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        on_progress: &mut impl FnMut(&Book),
        cancel: &CancellationToken,
    ) -> Result<()> {
        Traversal {
            router: &self.router,
            credentials,
            environment,
            cancel,
            pacing: self.config.pacing,
            mode: ContentMode::Plain,
        }
        .run(book, on_progress)
        .await
    }

    /// Like [`generate_all`](Self::generate_all), researching each section first
    #[instrument(skip_all, fields(book = %book.id))]
    pub async fn generate_all_with_research(
        &self,
        book: &mut Book,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        on_progress: &mut impl FnMut(&Book),
        cancel: &CancellationToken,
    ) -> Result<()> {
        let research = self
            .research
            .as_deref()
            .ok_or_else(|| ForgeError::Config("No research client configured".to_string()))?;

        Traversal {
            router: &self.router,
            credentials,
            environment,
            cancel,
            pacing: self.config.research_pacing,
            mode: ContentMode::Research(research),
        }
        .run(book, on_progress)
        .await
    }
}

/// One sequential walk over a book
pub(crate) struct Traversal<'a> {
    pub router: &'a ServiceRouter,
    pub credentials: &'a Credentials,
    pub environment: &'a RuntimeEnvironment,
    pub cancel: &'a CancellationToken,
    pub pacing: Duration,
    pub mode: ContentMode<'a>,
}

impl Traversal<'_> {
    pub(crate) async fn run(&self, book: &mut Book, on_progress: &mut impl FnMut(&Book)) -> Result<()> {
        let progress = book.progress();
        info!(
            chapters = progress.chapters,
            completed = progress.completed_sections,
            total = progress.total_sections,
            "Starting generation"
        );

        book.status = BookStatus::Generating;
        emit(book, on_progress);

        for ci in 0..book.chapters.len() {
            self.chapter(book, ci, on_progress).await?;
        }

        book.status = BookStatus::Completed;
        emit(book, on_progress);
        info!("Book generation completed");
        Ok(())
    }

    async fn chapter(&self, book: &mut Book, ci: usize, on_progress: &mut impl FnMut(&Book)) -> Result<()> {
        let chapter = &book.chapters[ci];
        let finished = chapter.status == NodeStatus::Completed
            && chapter.has_outline()
            && chapter.sub_chapters.iter().flatten().all(|s| s.is_done());
        if finished {
            debug!(chapter = %chapter.title, "Chapter already complete");
            return Ok(());
        }

        self.cancel.check()?;
        if !chapter.has_outline() {
            let (title, description) = (chapter.title.clone(), chapter.description.clone());
            debug!(chapter = %title, "Generating chapter outline");
            let routed = self
                .router
                .generate_chapter_outline(&title, &description, self.credentials, self.environment, self.cancel)
                .await?;

            let chapter = &mut book.chapters[ci];
            chapter.sub_chapters = Some(routed.value);
            chapter.status = NodeStatus::Generating;
            emit(book, on_progress);
        } else if book.chapters[ci].status != NodeStatus::Generating {
            book.chapters[ci].status = NodeStatus::Generating;
            emit(book, on_progress);
        }

        let count = book.chapters[ci].sub_chapters.as_ref().map_or(0, Vec::len);
        for si in 0..count {
            self.section(book, ci, si, on_progress).await?;
        }

        book.chapters[ci].status = NodeStatus::Completed;
        emit(book, on_progress);
        info!(chapter = %book.chapters[ci].title, "Chapter completed");
        Ok(())
    }

    async fn section(
        &self,
        book: &mut Book,
        ci: usize,
        si: usize,
        on_progress: &mut impl FnMut(&Book),
    ) -> Result<()> {
        let Some(section) = section_mut(book, ci, si) else {
            return Ok(());
        };
        if section.is_done() {
            return Ok(());
        }

        self.cancel.check()?;
        section.status = NodeStatus::Generating;
        let (title, description) = (section.title.clone(), section.description.clone());
        emit(book, on_progress);

        debug!(section = %title, "Generating section content");
        let content = self.content(&title, &description).await?;

        if let Some(section) = section_mut(book, ci, si) {
            section.content = Some(content);
            section.status = NodeStatus::Completed;
        }
        emit(book, on_progress);

        tokio::time::sleep(self.pacing).await;
        Ok(())
    }

    async fn content(&self, title: &str, description: &str) -> Result<String> {
        let (credentials, environment, cancel) = (self.credentials, self.environment, self.cancel);
        let routed = match self.mode {
            ContentMode::Plain => {
                self.router
                    .generate_content(title, description, credentials, environment, cancel)
                    .await?
            }
            ContentMode::Research(research) => {
                let findings = research.research(title, description).await?;
                cancel.check()?;
                let enriched = enrich_description(description, &findings);
                self.router
                    .generate_content(title, &enriched, credentials, environment, cancel)
                    .await?
            }
            ContentMode::Intensity { level, perspective } => {
                self.router
                    .generate_content_with_intensity(
                        title,
                        description,
                        level,
                        perspective,
                        credentials,
                        environment,
                        cancel,
                    )
                    .await?
            }
        };
        Ok(routed.value)
    }
}

fn section_mut(book: &mut Book, ci: usize, si: usize) -> Option<&mut crate::types::SubChapter> {
    book.chapters
        .get_mut(ci)
        .and_then(|c| c.sub_chapters.as_mut())
        .and_then(|s| s.get_mut(si))
}

fn emit(book: &mut Book, on_progress: &mut impl FnMut(&Book)) {
    book.touch();
    on_progress(book);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::ProviderKind;
    use crate::ai::provider::testing::MockBackend;
    use crate::ai::router::testing::{MockFactory, MockProbe, both_clouds, router};
    use crate::types::{Chapter, SubChapter};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn pipeline(factory: MockFactory) -> (GenerationPipeline, Arc<MockFactory>) {
        let (router, factory, _) = router(factory, MockProbe::new(false, false));
        (GenerationPipeline::new(Arc::new(router), PipelineConfig::default()), factory)
    }

    fn two_chapter_book() -> Book {
        let mut book = Book::new("Tides", "Romance");
        book.chapters = vec![
            Chapter::new("Arrival", "She arrives"),
            Chapter::new("Storm", "The storm hits"),
        ];
        book
    }

    fn generating_sections(book: &Book) -> usize {
        book.chapters
            .iter()
            .flat_map(|c| c.sub_chapters.iter().flatten())
            .filter(|s| s.status == NodeStatus::Generating)
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_chapter_book_end_to_end() {
        let (pipeline, factory) = pipeline(MockFactory::well_behaved());
        let mut book = two_chapter_book();
        let mut snapshots: Vec<Book> = Vec::new();
        let start = tokio::time::Instant::now();

        pipeline
            .generate_all(
                &mut book,
                &both_clouds(),
                &RuntimeEnvironment::cloud_only(),
                &mut |b: &Book| snapshots.push(b.clone()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(book.status, BookStatus::Completed);
        assert!(book.is_complete());
        for chapter in &book.chapters {
            assert_eq!(chapter.status, NodeStatus::Completed);
            let sections = chapter.sub_chapters.as_ref().unwrap();
            assert_eq!(sections.len(), 3);
            for section in sections {
                assert_eq!(section.content.as_deref(), Some(format!("Prose for {}", section.title).as_str()));
            }
        }

        // 2 outline calls + 6 content calls, all on primary
        assert_eq!(factory.primary.call_count(), 8);
        assert_eq!(factory.secondary.call_count(), 0);

        // start + per chapter (outline + 3 * 2 + done) + end
        assert_eq!(snapshots.len(), 18);
        assert_eq!(snapshots[0].status, BookStatus::Generating);
        assert_eq!(snapshots.last().unwrap().status, BookStatus::Completed);
        assert!(snapshots.iter().all(|b| generating_sections(b) <= 1));
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    /// Status changes between two snapshots of the same book, matched by node id
    fn transitions(before: &Book, after: &Book) -> usize {
        let mut changed = usize::from(before.status != after.status);
        for (old, new) in before.chapters.iter().zip(&after.chapters) {
            changed += usize::from(old.status != new.status);
            for old_section in old.sub_chapters.iter().flatten() {
                let new_section = new
                    .sub_chapters
                    .iter()
                    .flatten()
                    .find(|s| s.id == old_section.id);
                if let Some(new_section) = new_section {
                    changed += usize::from(old_section.status != new_section.status);
                }
            }
        }
        changed
    }

    #[tokio::test(start_paused = true)]
    async fn test_outlined_and_bare_chapters_one_transition_per_snapshot() {
        let (pipeline, factory) = pipeline(MockFactory::well_behaved());
        let mut book = Book::new("Tides", "Romance");
        let mut outlined = Chapter::new("Arrival", "She arrives");
        outlined.sub_chapters = Some(vec![
            SubChapter::new("Harbor", "At the harbor"),
            SubChapter::new("Docks", "At the docks"),
        ]);
        book.chapters = vec![outlined, Chapter::new("Storm", "The storm hits")];
        let initial = book.clone();
        let mut snapshots: Vec<Book> = Vec::new();

        pipeline
            .generate_all(
                &mut book,
                &both_clouds(),
                &RuntimeEnvironment::cloud_only(),
                &mut |b: &Book| snapshots.push(b.clone()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(book.status, BookStatus::Completed);
        assert_eq!(book.chapters[0].sub_chapters.as_ref().unwrap().len(), 2);
        assert_eq!(book.chapters[1].sub_chapters.as_ref().unwrap().len(), 3);
        for chapter in &book.chapters {
            assert_eq!(chapter.status, NodeStatus::Completed);
            for section in chapter.sub_chapters.iter().flatten() {
                assert_eq!(section.status, NodeStatus::Completed);
                assert!(section.content.as_deref().is_some_and(|c| !c.is_empty()));
            }
        }

        // 2 + 3 content calls, 1 outline call for the bare chapter
        assert_eq!(factory.primary.call_count(), 6);

        // start, chapter A (enter + 2 * 2 + done), chapter B (outline + 3 * 2 + done), end
        assert_eq!(snapshots.len(), 16);
        assert_eq!(transitions(&initial, &snapshots[0]), 1);
        for pair in snapshots.windows(2) {
            assert_eq!(transitions(&pair[0], &pair[1]), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_skips_completed_sections() {
        let (pipeline, factory) = pipeline(MockFactory::well_behaved());
        let mut book = Book::new("Tides", "Romance");
        let mut chapter = Chapter::new("Arrival", "She arrives");
        let mut done = SubChapter::new("Harbor", "At the harbor");
        done.status = NodeStatus::Completed;
        done.content = Some("Existing prose".to_string());
        let mut interrupted = SubChapter::new("Docks", "At the docks");
        interrupted.status = NodeStatus::Generating;
        chapter.sub_chapters = Some(vec![done, interrupted, SubChapter::new("Inn", "At the inn")]);
        book.chapters = vec![chapter];

        pipeline
            .generate_all(
                &mut book,
                &both_clouds(),
                &RuntimeEnvironment::cloud_only(),
                &mut |_: &Book| {},
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let sections = book.chapters[0].sub_chapters.as_ref().unwrap();
        assert_eq!(sections[0].content.as_deref(), Some("Existing prose"));
        assert_eq!(sections[1].content.as_deref(), Some("Prose for Docks"));
        assert_eq!(sections[2].content.as_deref(), Some("Prose for Inn"));
        assert_eq!(factory.primary.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_then_resume() {
        let (pipeline, factory) = pipeline(MockFactory::well_behaved());
        let mut book = two_chapter_book();
        let cancel = CancellationToken::new();
        let creds = both_clouds();
        let env = RuntimeEnvironment::cloud_only();

        let trigger = cancel.clone();
        let mut on_progress = |b: &Book| {
            if b.progress().completed_sections == 2 {
                trigger.cancel();
            }
        };
        let err = pipeline
            .generate_all(&mut book, &creds, &env, &mut on_progress, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(book.progress().completed_sections, 2);
        assert_ne!(book.status, BookStatus::Completed);
        let sections = book.chapters[0].sub_chapters.as_ref().unwrap();
        assert_eq!(sections[2].status, NodeStatus::Pending);
        // 1 outline + 2 sections
        assert_eq!(factory.primary.call_count(), 3);

        cancel.reset();
        pipeline
            .generate_all(&mut book, &creds, &env, &mut |_: &Book| {}, &cancel)
            .await
            .unwrap();

        assert!(book.is_complete());
        assert_eq!(book.status, BookStatus::Completed);
        // + 1 section, 1 outline, 3 sections
        assert_eq!(factory.primary.call_count(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_leaves_last_emitted_state() {
        let factory = MockFactory {
            primary: Arc::new(MockBackend::book_writer(ProviderKind::Primary).queue(vec![
                Ok(r#"[{"title": "Only", "description": "One"}]"#.to_string()),
                Ok("no json here".to_string()),
            ])),
            ..MockFactory::well_behaved()
        };
        let (pipeline, _) = pipeline(factory);
        let mut book = two_chapter_book();
        let mut last: Option<Book> = None;

        let err = pipeline
            .generate_all(
                &mut book,
                &Credentials::primary("key"),
                &RuntimeEnvironment::cloud_only(),
                &mut |b: &Book| last = Some(b.clone()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ForgeError::AllProvidersFailed { .. }));
        let section = &book.chapters[0].sub_chapters.as_ref().unwrap()[0];
        assert_eq!(section.status, NodeStatus::Generating);
        assert!(section.content.is_none());
        assert_eq!(last.unwrap(), book);
    }

    struct RecordingResearch {
        topics: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResearchClient for RecordingResearch {
        async fn research(&self, topic: &str, _context: &str) -> Result<String> {
            self.topics.lock().unwrap().push(topic.to_string());
            Ok(format!("- facts about {}", topic))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_research_enriches_descriptions_and_paces_slower() {
        let (router, factory, _) = router(MockFactory::well_behaved(), MockProbe::new(false, false));
        let research = Arc::new(RecordingResearch {
            topics: Mutex::new(Vec::new()),
        });
        let pipeline = GenerationPipeline::new(Arc::new(router), PipelineConfig::default())
            .with_research(research.clone());
        let mut book = Book::new("Tides", "Romance");
        book.chapters = vec![Chapter::new("Arrival", "She arrives")];
        let start = tokio::time::Instant::now();

        pipeline
            .generate_all_with_research(
                &mut book,
                &both_clouds(),
                &RuntimeEnvironment::cloud_only(),
                &mut |_: &Book| {},
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(book.is_complete());
        assert_eq!(*research.topics.lock().unwrap(), vec!["Part A", "Part B", "Part C"]);
        let prompts = factory.primary.prompts.lock().unwrap();
        assert!(prompts.last().unwrap().contains("- facts about Part C"));
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_research_requires_client() {
        let (pipeline, factory) = pipeline(MockFactory::well_behaved());
        let mut book = two_chapter_book();

        let err = pipeline
            .generate_all_with_research(
                &mut book,
                &both_clouds(),
                &RuntimeEnvironment::cloud_only(),
                &mut |_: &Book| {},
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ForgeError::Config(_)));
        assert_eq!(factory.primary.call_count(), 0);
        assert_eq!(book.status, BookStatus::Draft);
    }

    #[test]
    fn test_config_from_settings() {
        let config = PipelineConfig::from(&PipelineSettings {
            pacing_ms: 10,
            research_pacing_ms: 20,
        });
        assert_eq!(config.pacing, Duration::from_millis(10));
        assert_eq!(config.research_pacing, Duration::from_millis(20));
    }
}

//! Prompt Builder System
//!
//! Standardized prompt construction for every generation operation.
//! Each prompt is tagged with its task, states the role and objectives,
//! lists the inputs, and ends with the exact JSON shape expected back.

use crate::ai::provider::{ImageRequest, OutlineRequest};
use crate::constants::generation as gen_constants;
use crate::types::{HeatLevel, Perspective};

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Machine-readable task tag
    Task(String),
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered objectives
    Objectives(Vec<String>),
    /// Ordered key-value inputs
    Context(Vec<(String, String)>),
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Good/bad writing examples
    AntiPatterns { bad: Vec<String>, good: Vec<String> },
    /// Expected JSON reply
    OutputFormat(String),
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, task: &str) -> Self {
        self.sections.push(PromptSection::Task(task.to_string()));
        self
    }

    /// Add a role definition section
    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    /// Add objectives section
    pub fn objectives(mut self, objectives: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.into_iter().map(String::from).collect(),
        ));
        self
    }

    /// Add a context item, appending to the existing context section
    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        let item = (key.to_string(), value.to_string());
        for section in &mut self.sections {
            if let PromptSection::Context(items) = section {
                items.push(item);
                return self;
            }
        }
        self.sections.push(PromptSection::Context(vec![item]));
        self
    }

    /// Add a context item only when a value is present
    pub fn context_opt(self, key: &str, value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => self.context_item(key, v),
            None => self,
        }
    }

    /// Add text section with header
    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    /// Add anti-patterns section
    pub fn anti_patterns(mut self, bad: Vec<&str>, good: Vec<&str>) -> Self {
        self.sections.push(PromptSection::AntiPatterns {
            bad: bad.into_iter().map(String::from).collect(),
            good: good.into_iter().map(String::from).collect(),
        });
        self
    }

    pub fn output_format(mut self, example: &str) -> Self {
        self.sections
            .push(PromptSection::OutputFormat(example.to_string()));
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Task(task) => {
                    prompt.push_str(&format!("<TASK>{}</TASK>\n\n", task));
                }
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Context(items) => {
                    prompt.push_str("# Context\n\n");
                    for (key, value) in items {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::AntiPatterns { bad, good } => {
                    prompt.push_str("<what_not_to_do>\n");
                    for example in bad {
                        prompt.push_str(&format!("WRONG: {}\n", example));
                    }
                    prompt.push_str("</what_not_to_do>\n\n");
                    prompt.push_str("<what_to_do>\n");
                    for example in good {
                        prompt.push_str(&format!("CORRECT: {}\n", example));
                    }
                    prompt.push_str("</what_to_do>\n\n");
                }
                PromptSection::OutputFormat(example) => {
                    prompt.push_str("# Output Format\n\n");
                    prompt.push_str("Respond ONLY with valid JSON in exactly this shape, no explanation:\n");
                    prompt.push_str("```json\n");
                    prompt.push_str(&example);
                    prompt.push_str("\n```\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

/// Prompt templates for each generation operation
pub struct PromptTemplates;

impl PromptTemplates {
    pub fn book_outline(request: &OutlineRequest) -> String {
        let chapters = request
            .chapter_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "10-15".to_string());

        let mut builder = PromptBuilder::new()
            .task("book-outline")
            .role("book architect", "structuring commercially successful books")
            .objectives(vec![
                "Turn the premise into a compelling working title",
                "Write a one-paragraph description of the book",
                "Lay out the chapters in reading order, each with a title and a short description",
                "Give every chapter a clear purpose that moves the book forward",
            ])
            .context_item("Premise", &request.prompt)
            .context_item("Genre", &request.genre)
            .context_opt("Sub-genre", request.sub_genre.as_deref())
            .context_opt("Tone", request.tone.as_deref())
            .context_opt("Target audience", request.target_audience.as_deref())
            .context_item("Chapter count", &chapters);

        if let Some(perspective) = request.perspective {
            builder = builder.context_item("Narrative perspective", perspective.describe());
        }
        if let Some(level) = request.heat_level {
            builder = builder.context_item("Heat level", level.label());
        }

        builder
            .output_format(
                r#"{"title": "...", "description": "...", "chapters": [{"title": "...", "description": "..."}]}"#,
            )
            .build()
    }

    pub fn chapter_outline(title: &str, description: &str) -> String {
        PromptBuilder::new()
            .task("chapter-outline")
            .role("book architect", "breaking chapters into well-paced sections")
            .objectives(vec![
                &format!(
                    "Split the chapter into {} sections in reading order",
                    gen_constants::SECTIONS_PER_CHAPTER
                ),
                "Give each section a title and a one or two sentence description",
                "Make the sections together cover everything the chapter description promises",
            ])
            .context_item("Chapter title", title)
            .context_item("Chapter description", description)
            .output_format(r#"[{"title": "...", "description": "..."}]"#)
            .build()
    }

    pub fn section_content(title: &str, description: &str) -> String {
        Self::content_builder(title, description).build()
    }

    pub fn section_content_with_intensity(
        title: &str,
        description: &str,
        level: HeatLevel,
        perspective: Option<Perspective>,
    ) -> String {
        let mut builder = Self::content_builder(title, description)
            .context_item("Heat level", level.label())
            .section("Intensity Guidelines", level.guideline());
        if let Some(perspective) = perspective {
            builder = builder.section(
                "Perspective",
                &format!("Write strictly in {}.", perspective.describe()),
            );
        }
        builder.build()
    }

    pub fn illustration(request: &ImageRequest) -> String {
        let mut prompt = format!(
            "Book illustration for \"{}\": {}",
            request.title.trim(),
            request.description.trim()
        );
        if let Some(genre) = request.genre.as_deref().filter(|g| !g.trim().is_empty()) {
            prompt.push_str(&format!(". Genre: {}", genre.trim()));
        }
        let style = request
            .style
            .as_deref()
            .unwrap_or("detailed digital painting, soft cinematic lighting");
        prompt.push_str(&format!(". Style: {}. No text or lettering.", style));
        prompt
    }

    pub fn research(topic: &str, context: &str) -> String {
        PromptBuilder::new()
            .task("research")
            .role("research assistant", "gathering accurate background for authors")
            .objectives(vec![
                "Collect concrete facts, details and terminology relevant to the topic",
                "Prefer specific, verifiable information over generalities",
                "Summarize findings as concise bullet points",
            ])
            .context_item("Topic", topic)
            .context_item("Context", context)
            .build()
    }

    fn content_builder(title: &str, description: &str) -> PromptBuilder {
        PromptBuilder::new()
            .task("section-content")
            .role("novelist", "vivid, publication-ready prose")
            .objectives(vec![
                &format!(
                    "Write {} words of finished prose for this section",
                    gen_constants::SECTION_WORDS
                ),
                "Follow the section description faithfully",
                "Use paragraphs and dialogue; no headings or meta commentary",
            ])
            .context_item("Section title", title)
            .context_item("Section description", description)
            .anti_patterns(
                vec!["Summarizing events instead of dramatizing them", "Ending with a moral"],
                vec!["Showing scenes through action and dialogue", "Ending on forward momentum"],
            )
            .output_format(r#"{"content": "..."}"#)
    }
}

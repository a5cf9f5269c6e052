//! Book Data Model
//!
//! A `Book` owns an ordered chapter list; each `Chapter` owns an optional
//! ordered list of `SubChapter`s (absent until its outline has been generated).
//! Every node carries a lifecycle status that only moves forward within a run:
//! `pending → generating → completed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mint a fresh node identity
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Status Enums
// =============================================================================

/// Book lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Draft,
    Generating,
    Completed,
}

/// Chapter / sub-chapter lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Pending,
    Generating,
    Completed,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Pending => write!(f, "pending"),
            NodeStatus::Generating => write!(f, "generating"),
            NodeStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookStatus::Draft => write!(f, "draft"),
            BookStatus::Generating => write!(f, "generating"),
            BookStatus::Completed => write!(f, "completed"),
        }
    }
}

// =============================================================================
// Heat Level
// =============================================================================

/// Content-intensity level, ordered from least to most explicit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatLevel {
    Clean,
    Sweet,
    Sensual,
    Steamy,
    Spicy,
    Explicit,
}

impl HeatLevel {
    pub const ALL: [HeatLevel; 6] = [
        HeatLevel::Clean,
        HeatLevel::Sweet,
        HeatLevel::Sensual,
        HeatLevel::Steamy,
        HeatLevel::Spicy,
        HeatLevel::Explicit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HeatLevel::Clean => "clean",
            HeatLevel::Sweet => "sweet",
            HeatLevel::Sensual => "sensual",
            HeatLevel::Steamy => "steamy",
            HeatLevel::Spicy => "spicy",
            HeatLevel::Explicit => "explicit",
        }
    }

    /// Human label, used when suffixing derived book titles
    pub fn label(&self) -> &'static str {
        match self {
            HeatLevel::Clean => "Clean",
            HeatLevel::Sweet => "Sweet",
            HeatLevel::Sensual => "Sensual",
            HeatLevel::Steamy => "Steamy",
            HeatLevel::Spicy => "Spicy",
            HeatLevel::Explicit => "Explicit",
        }
    }

    /// Writing guideline embedded into intensity-aware prompts
    pub fn guideline(&self) -> &'static str {
        match self {
            HeatLevel::Clean => {
                "No sexual content. Romance is limited to emotional connection, hand-holding and chaste kisses."
            }
            HeatLevel::Sweet => {
                "Light romantic tension and kissing. Any intimacy happens off the page with a fade to black."
            }
            HeatLevel::Sensual => {
                "Sensual tension and passionate kissing. Intimate scenes are suggestive but not graphic."
            }
            HeatLevel::Steamy => {
                "Open-door intimate scenes with tasteful description, focused on emotion and sensation."
            }
            HeatLevel::Spicy => {
                "Frequent, detailed intimate scenes with frank language between consenting adults."
            }
            HeatLevel::Explicit => {
                "Fully explicit intimate scenes between consenting adults with no fade to black."
            }
        }
    }
}

impl std::fmt::Display for HeatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HeatLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        HeatLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == lower)
            .ok_or_else(|| {
                format!(
                    "Unknown heat level: {}. Valid values: clean, sweet, sensual, steamy, spicy, explicit",
                    s
                )
            })
    }
}

// =============================================================================
// Perspective
// =============================================================================

/// Narrative point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Perspective {
    FirstPerson,
    ThirdLimited,
    ThirdOmniscient,
    SecondPerson,
}

impl Perspective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::FirstPerson => "first-person",
            Perspective::ThirdLimited => "third-limited",
            Perspective::ThirdOmniscient => "third-omniscient",
            Perspective::SecondPerson => "second-person",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Perspective::FirstPerson => "first person (\"I\")",
            Perspective::ThirdLimited => "third person limited to one viewpoint character",
            Perspective::ThirdOmniscient => "third person omniscient",
            Perspective::SecondPerson => "second person (\"you\")",
        }
    }
}

impl std::fmt::Display for Perspective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Perspective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first-person" | "first" => Ok(Perspective::FirstPerson),
            "third-limited" => Ok(Perspective::ThirdLimited),
            "third-omniscient" => Ok(Perspective::ThirdOmniscient),
            "second-person" | "second" => Ok(Perspective::SecondPerson),
            _ => Err(format!(
                "Unknown perspective: {}. Valid values: first-person, third-limited, third-omniscient, second-person",
                s
            )),
        }
    }
}

// =============================================================================
// Tree Nodes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubChapter {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl SubChapter {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            status: NodeStatus::Pending,
            content: None,
            image_url: None,
        }
    }

    /// Completed with non-empty content; such sections are skipped on resume
    pub fn is_done(&self) -> bool {
        self.status == NodeStatus::Completed
            && self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_chapters: Option<Vec<SubChapter>>,
}

impl Chapter {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            status: NodeStatus::Pending,
            sub_chapters: None,
        }
    }

    pub fn has_outline(&self) -> bool {
        self.sub_chapters.as_ref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heat_level: Option<HeatLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<Perspective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub status: BookStatus,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Section-level progress counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BookProgress {
    pub chapters: usize,
    pub chapters_with_outline: usize,
    pub total_sections: usize,
    pub completed_sections: usize,
}

impl BookProgress {
    pub fn percent(&self) -> f32 {
        if self.total_sections == 0 {
            return 0.0;
        }
        self.completed_sections as f32 * 100.0 / self.total_sections as f32
    }
}

impl Book {
    pub fn new(title: impl Into<String>, genre: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.into(),
            author: String::new(),
            description: String::new(),
            genre: genre.into(),
            sub_genre: None,
            heat_level: None,
            perspective: None,
            tone: None,
            target_audience: None,
            status: BookStatus::Draft,
            chapters: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn progress(&self) -> BookProgress {
        let mut progress = BookProgress {
            chapters: self.chapters.len(),
            ..Default::default()
        };
        for chapter in &self.chapters {
            if let Some(sections) = &chapter.sub_chapters {
                progress.chapters_with_outline += 1;
                progress.total_sections += sections.len();
                progress.completed_sections += sections.iter().filter(|s| s.is_done()).count();
            }
        }
        progress
    }

    /// Every chapter has an outline and every section is done
    pub fn is_complete(&self) -> bool {
        !self.chapters.is_empty()
            && self.chapters.iter().all(|c| {
                c.sub_chapters
                    .as_ref()
                    .is_some_and(|s| !s.is_empty() && s.iter().all(SubChapter::is_done))
            })
    }

    /// Whether the heat level applies to this book's genre
    pub fn is_romance(&self) -> bool {
        self.genre.to_lowercase().contains("romance")
    }
}

pub mod book;
pub mod error;

pub use book::{
    Book, BookProgress, BookStatus, Chapter, HeatLevel, NodeStatus, Perspective, SubChapter,
    new_id,
};
pub use error::{ErrorCategory, ErrorClassifier, ForgeError, ImageError, LlmError, Result};

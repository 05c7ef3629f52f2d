//! QUEST Narration
//!
//! Converts the Markdown feedback returned by the text generator into plain
//! text suitable for a speech synthesizer: emphasis markers, headings, list
//! bullets, links, inline HTML and table syntax are removed while the words
//! are kept in reading order, one block per line.
//!
//! # Example
//!
//! ```rust
//! use quest_narration::markdown_to_text;
//!
//! let text = markdown_to_text("**Accuracy:** Good use of the *past tense*.");
//! assert_eq!(text, "Accuracy: Good use of the past tense.");
//! ```

mod markdown;

pub use markdown::markdown_to_text;

//! Pipeline stages for RFP field extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on
//! its own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ prompts ──▶ llm/gemini ──▶ parse
//! (kind)    (text)      (template)  (model call)   (JSON)
//! ```
//!
//! 1. [`input`]   — file name → [`input::DocumentKind`], bytes → [`input::SourceDocument`]
//! 2. [`extract`] — HTML text nodes via `scraper`, PDF text layer via pdfium
//!    (inside `spawn_blocking`)
//! 3. [`crate::prompts`] — embed the text in the extraction template
//! 4. [`llm`] / [`gemini`] — the only stage with network I/O
//! 5. [`parse`]   — greedy `{ … }` location and `serde_json` parsing

pub mod extract;
pub mod gemini;
pub mod input;
pub mod llm;
pub mod parse;

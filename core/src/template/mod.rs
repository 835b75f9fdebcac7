//! Conditional template language.
//!
//! Templates are plain text with `[[[tag]]]` substitutions and
//! `[[[if:COND]]] ... [[[elseif:COND]]] ... [[[else]]] ... [[[endif]]]` blocks.
//! Rendering is lenient and never fails; [`validate`] reports authoring errors.

mod condition;
mod parser;
mod render;
mod validate;

pub use condition::{CompareOp, Condition};
pub use render::{MAX_CONDITIONAL_DEPTH, RenderOutput, RenderWarning, render, render_with_report};
pub use validate::{TemplateSummary, extract_tags, validate};

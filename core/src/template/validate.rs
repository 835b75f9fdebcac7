use serde::Serialize;

use super::condition::Condition;
use super::parser::{Tag, TagKind, Token, tokenize};
use crate::error::TemplateError;

/// What a valid template references
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateSummary {
    /// Substitution tags and condition identifiers, first occurrence order
    pub tags: Vec<String>,
    /// Number of `[[[if:...]]]` blocks
    pub conditionals: usize,
    /// Deepest conditional nesting
    pub max_depth: usize,
}

struct Frame {
    offset: usize,
    seen_else: bool,
}

/// Check a template for authoring errors.
///
/// Rendering never fails, so this is the only place malformed templates are
/// reported. Errors carry the byte offset of the offending tag.
pub fn validate(template: &str) -> Result<TemplateSummary, TemplateError> {
    let tokens = tokenize(template, true)?;
    let mut summary = TemplateSummary::default();
    let mut stack: Vec<Frame> = Vec::new();

    for token in &tokens {
        let Token::Tag(tag) = token else {
            continue;
        };
        match tag.kind() {
            TagKind::Var { name, .. } => push_tag(&mut summary.tags, name),
            TagKind::If(cond) => {
                check_condition(tag, cond, &mut summary.tags)?;
                stack.push(Frame {
                    offset: tag.start,
                    seen_else: false,
                });
                summary.conditionals += 1;
                summary.max_depth = summary.max_depth.max(stack.len());
            }
            TagKind::ElseIf(cond) => {
                let frame = open_frame(&mut stack, "elseif", tag)?;
                if frame.seen_else {
                    return Err(TemplateError::BranchAfterElse {
                        keyword: "elseif",
                        offset: tag.start,
                    });
                }
                check_condition(tag, cond, &mut summary.tags)?;
            }
            TagKind::Else => {
                let frame = open_frame(&mut stack, "else", tag)?;
                if frame.seen_else {
                    return Err(TemplateError::BranchAfterElse {
                        keyword: "else",
                        offset: tag.start,
                    });
                }
                frame.seen_else = true;
            }
            TagKind::EndIf => {
                open_frame(&mut stack, "endif", tag)?;
                stack.pop();
            }
            TagKind::Empty => return Err(TemplateError::EmptyTag { offset: tag.start }),
        }
    }

    if let Some(unclosed) = stack.last() {
        return Err(TemplateError::IncompleteTag {
            offset: unclosed.offset,
            reason: "missing [[[endif]]]".to_string(),
        });
    }
    Ok(summary)
}

fn open_frame<'s>(
    stack: &'s mut [Frame],
    keyword: &'static str,
    tag: &Tag<'_>,
) -> Result<&'s mut Frame, TemplateError> {
    stack.last_mut().ok_or(TemplateError::UnexpectedTag {
        keyword,
        offset: tag.start,
    })
}

fn check_condition(tag: &Tag<'_>, cond: &str, tags: &mut Vec<String>) -> Result<(), TemplateError> {
    let condition = Condition::parse(cond).map_err(|reason| TemplateError::InvalidCondition {
        offset: tag.start,
        reason,
    })?;
    push_tag(tags, condition.ident());
    Ok(())
}

fn push_tag(tags: &mut Vec<String>, name: &str) {
    if !name.is_empty() && !tags.iter().any(|t| t == name) {
        tags.push(name.to_string());
    }
}

/// Tag names a template reads, with transforms stripped.
///
/// Works on malformed templates too: whatever parses as a tag is listed.
pub fn extract_tags(template: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let Ok(tokens) = tokenize(template, false) else {
        return tags;
    };
    for token in tokens {
        let Token::Tag(tag) = token else {
            continue;
        };
        match tag.kind() {
            TagKind::Var { name, .. } => push_tag(&mut tags, name),
            TagKind::If(cond) | TagKind::ElseIf(cond) => {
                if let Ok(condition) = Condition::parse(cond) {
                    push_tag(&mut tags, condition.ident());
                }
            }
            TagKind::Else | TagKind::EndIf | TagKind::Empty => {}
        }
    }
    tags
}

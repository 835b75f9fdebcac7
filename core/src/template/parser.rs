//! Tokenizer and block parser for the tag language.
//!
//! Every tag is `[[[...]]]`. The tokenizer runs in two modes: strict (used by
//! validation, returns the first authoring error) and lenient (used by
//! rendering, where anything malformed stays literal text).

use std::cmp::Ordering;

use super::render::MAX_CONDITIONAL_DEPTH;
use crate::error::TemplateError;

pub(crate) const OPEN: &str = "[[[";
pub(crate) const CLOSE: &str = "]]]";

/// A `[[[body]]]` occurrence. `start..end` covers the brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tag<'a> {
    pub body: &'a str,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind<'a> {
    Var {
        name: &'a str,
        transform: Option<&'a str>,
    },
    If(&'a str),
    ElseIf(&'a str),
    Else,
    EndIf,
    Empty,
}

impl<'a> Tag<'a> {
    pub fn kind(&self) -> TagKind<'a> {
        let body = self.body.trim();
        if body.is_empty() {
            return TagKind::Empty;
        }
        if let Some(cond) = body.strip_prefix("if:") {
            return TagKind::If(cond);
        }
        if let Some(cond) = body.strip_prefix("elseif:") {
            return TagKind::ElseIf(cond);
        }
        match body {
            "else" => TagKind::Else,
            "endif" => TagKind::EndIf,
            _ => match body.split_once('|') {
                Some((name, transform)) => TagKind::Var {
                    name: name.trim(),
                    transform: Some(transform.trim()),
                },
                None => TagKind::Var {
                    name: body,
                    transform: None,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    Tag(Tag<'a>),
}

/// Split `src` into text and tags.
///
/// In lenient mode an unterminated `[[[` and the outer `[[[` of a nested one
/// are kept as text; in strict mode they are errors, as are empty tags.
pub(crate) fn tokenize(src: &str, strict: bool) -> Result<Vec<Token<'_>>, TemplateError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while let Some(rel) = src[pos..].find(OPEN) {
        let start = pos + rel;
        let body_start = start + OPEN.len();
        let close = src[body_start..].find(CLOSE).map(|r| body_start + r);
        let nested = src[body_start..close.unwrap_or(src.len())]
            .find(OPEN)
            .map(|r| body_start + r);

        match (close, nested) {
            (_, Some(inner)) => {
                if strict {
                    return Err(TemplateError::NestedTag { offset: inner });
                }
                pos = inner;
            }
            (None, None) => {
                if strict {
                    return Err(TemplateError::IncompleteTag {
                        offset: start,
                        reason: "missing closing ']]]'".to_string(),
                    });
                }
                break;
            }
            (Some(close), None) => {
                let tag = Tag {
                    body: &src[body_start..close],
                    start,
                    end: close + CLOSE.len(),
                };
                if strict && tag.kind() == TagKind::Empty {
                    return Err(TemplateError::EmptyTag { offset: start });
                }
                if start > text_start {
                    tokens.push(Token::Text(&src[text_start..start]));
                }
                tokens.push(Token::Tag(tag));
                pos = tag.end;
                text_start = tag.end;
            }
        }
    }

    if text_start < src.len() {
        tokens.push(Token::Text(&src[text_start..]));
    }
    Ok(tokens)
}

// ─── Block tree ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node<'a> {
    Text(&'a str),
    Var {
        name: &'a str,
        transform: Option<&'a str>,
        offset: usize,
    },
    If(IfBlock<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IfBlock<'a> {
    pub branches: Vec<Branch<'a>>,
    pub otherwise: Option<Branch<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Branch<'a> {
    /// `None` for the else branch
    pub condition: Option<&'a str>,
    pub body: Vec<Node<'a>>,
    /// Unprocessed branch text, emitted as-is past the depth limit
    pub source: &'a str,
    /// Offset of the tag that opened this branch
    pub offset: usize,
}

/// How much of an open block the parser keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    /// Branch bodies are parsed into nodes
    Build,
    /// First block past the nesting limit: branch conditions and sources
    /// are kept, bodies are not
    Opaque,
    /// Inside an opaque block; only tracked to find the matching `endif`
    Skip,
}

/// A block whose `endif` has not been seen yet
struct Frame<'a> {
    if_tag: Tag<'a>,
    depth: Depth,
    /// Finished branches with the tag that opened each
    done: Vec<(Tag<'a>, Branch<'a>)>,
    /// Tag that opened the current branch
    opener: Tag<'a>,
    /// `None` once in the else branch
    condition: Option<&'a str>,
    body: Vec<Node<'a>>,
}

impl<'a> Frame<'a> {
    fn open(tag: Tag<'a>, cond: &'a str, depth: Depth) -> Self {
        Self {
            if_tag: tag,
            depth,
            done: Vec::new(),
            opener: tag,
            condition: Some(cond),
            body: Vec::new(),
        }
    }

    fn finish_branch(&mut self, src: &'a str, closer: &Tag<'a>) {
        if self.depth == Depth::Skip {
            return;
        }
        let branch = Branch {
            condition: self.condition,
            body: std::mem::take(&mut self.body),
            source: &src[self.opener.end..closer.start],
            offset: self.opener.start,
        };
        self.done.push((self.opener, branch));
    }

    fn next_branch(&mut self, src: &'a str, tag: Tag<'a>, condition: Option<&'a str>) {
        self.finish_branch(src, &tag);
        self.opener = tag;
        self.condition = condition;
    }

    /// Close on `endif`. Blocks inside an opaque block produce nothing.
    fn close(mut self, src: &'a str, endif: &Tag<'a>) -> Option<IfBlock<'a>> {
        if self.depth == Depth::Skip {
            return None;
        }
        self.finish_branch(src, endif);
        let mut branches = Vec::with_capacity(self.done.len());
        let mut otherwise = None;
        for (_, branch) in self.done {
            if branch.condition.is_some() {
                branches.push(branch);
            } else {
                otherwise = Some(branch);
            }
        }
        Some(IfBlock {
            branches,
            otherwise,
        })
    }

    /// Input ended before `endif`: the block's tags become literal text
    /// and its bodies are spliced into the parent.
    fn unwind(mut self, src: &'a str) -> Vec<Node<'a>> {
        match self.depth {
            Depth::Skip => Vec::new(),
            Depth::Opaque => vec![Node::Text(&src[self.if_tag.start..])],
            Depth::Build => {
                let mut nodes = Vec::new();
                let body = std::mem::take(&mut self.body);
                let branches = self
                    .done
                    .into_iter()
                    .map(|(tag, branch)| (tag, branch.body))
                    .chain(std::iter::once((self.opener, body)));
                for (tag, body) in branches {
                    nodes.push(Node::Text(&src[tag.start..tag.end]));
                    nodes.extend(body);
                }
                nodes
            }
        }
    }
}

/// Lenient parse for rendering. Never fails and never recurses.
///
/// Blocks nested deeper than [`MAX_CONDITIONAL_DEPTH`] keep only their
/// branch sources. An `if` without a matching `endif`, and stray
/// `elseif`/`else`/`endif` tags, render as the literal tag text.
pub(crate) fn parse(src: &str) -> Vec<Node<'_>> {
    let tokens = tokenize(src, false).unwrap_or_else(|_| vec![Token::Text(src)]);
    let mut root = Vec::new();
    let mut stack: Vec<Frame<'_>> = Vec::new();

    for token in tokens {
        let tag = match token {
            Token::Text(text) => {
                push_node(&mut stack, &mut root, Node::Text(text));
                continue;
            }
            Token::Tag(tag) => tag,
        };
        let literal = Node::Text(&src[tag.start..tag.end]);

        match tag.kind() {
            TagKind::Empty => push_node(&mut stack, &mut root, literal),
            TagKind::Var { name, transform } => push_node(
                &mut stack,
                &mut root,
                Node::Var {
                    name,
                    transform,
                    offset: tag.start,
                },
            ),
            TagKind::If(cond) => {
                let depth = match stack.len().cmp(&MAX_CONDITIONAL_DEPTH) {
                    Ordering::Less => Depth::Build,
                    Ordering::Equal => Depth::Opaque,
                    Ordering::Greater => Depth::Skip,
                };
                stack.push(Frame::open(tag, cond, depth));
            }
            TagKind::ElseIf(_) | TagKind::Else => {
                let condition = match tag.kind() {
                    TagKind::ElseIf(cond) => Some(cond),
                    _ => None,
                };
                // Only an open, non-else branch can be continued
                if let Some(frame) = stack.last_mut().filter(|f| f.condition.is_some()) {
                    frame.next_branch(src, tag, condition);
                } else {
                    push_node(&mut stack, &mut root, literal);
                }
            }
            TagKind::EndIf => match stack.pop() {
                Some(frame) => {
                    if let Some(block) = frame.close(src, &tag) {
                        push_node(&mut stack, &mut root, Node::If(block));
                    }
                }
                None => root.push(literal),
            },
        }
    }

    while let Some(frame) = stack.pop() {
        for node in frame.unwind(src) {
            push_node(&mut stack, &mut root, node);
        }
    }
    root
}

/// Append to the innermost open branch, or the top level. Nodes inside
/// opaque blocks are dropped; the block's source covers them.
fn push_node<'a>(stack: &mut [Frame<'a>], root: &mut Vec<Node<'a>>, node: Node<'a>) {
    match stack.last_mut() {
        Some(frame) if frame.depth == Depth::Build => frame.body.push(node),
        Some(_) => {}
        None => root.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(src: &str) -> Vec<TagKind<'_>> {
        tokenize(src, true)
            .unwrap()
            .into_iter()
            .filter_map(|t| match t {
                Token::Tag(tag) => Some(tag.kind()),
                Token::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_tag_kinds() {
        assert_eq!(
            tags("[[[if:a>1]]][[[elseif:b]]][[[ else ]]][[[endif]]][[[x.y | upper]]][[[z]]]"),
            vec![
                TagKind::If("a>1"),
                TagKind::ElseIf("b"),
                TagKind::Else,
                TagKind::EndIf,
                TagKind::Var {
                    name: "x.y",
                    transform: Some("upper")
                },
                TagKind::Var {
                    name: "z",
                    transform: None
                },
            ]
        );
    }

    #[test]
    fn test_strict_errors_carry_offsets() {
        assert_eq!(
            tokenize("ab[[[name", true),
            Err(TemplateError::IncompleteTag {
                offset: 2,
                reason: "missing closing ']]]'".to_string()
            })
        );
        assert_eq!(
            tokenize("[[[a [[[b]]]", true),
            Err(TemplateError::NestedTag { offset: 5 })
        );
        assert_eq!(
            tokenize("x [[[ ]]]", true),
            Err(TemplateError::EmptyTag { offset: 2 })
        );
    }

    #[test]
    fn test_lenient_keeps_malformed_as_text() {
        let tokens = tokenize("a [[[b [[[c]]] d [[[e", false).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("a [[[b "),
                Token::Tag(Tag {
                    body: "c",
                    start: 7,
                    end: 14
                }),
                Token::Text(" d [[[e"),
            ]
        );
    }

    #[test]
    fn test_parse_if_chain_with_sources() {
        let src = "[[[if:a]]]A[[[elseif:b]]]B[[[else]]]C[[[endif]]]";
        let nodes = parse(src);
        assert_eq!(nodes.len(), 1);
        let Node::If(block) = &nodes[0] else {
            panic!("expected if block");
        };
        assert_eq!(block.branches.len(), 2);
        assert_eq!(block.branches[0].source, "A");
        assert_eq!(block.branches[1].condition, Some("b"));
        assert_eq!(block.branches[1].offset, 11);
        let otherwise = block.otherwise.as_ref().unwrap();
        assert_eq!(otherwise.source, "C");
        assert_eq!(otherwise.condition, None);
    }

    #[test]
    fn test_unclosed_if_degrades_to_text() {
        let nodes = parse("[[[if:x]]]y");
        assert_eq!(nodes, vec![Node::Text("[[[if:x]]]"), Node::Text("y")]);

        let nodes = parse("[[[endif]]][[[else]]]");
        assert_eq!(
            nodes,
            vec![Node::Text("[[[endif]]]"), Node::Text("[[[else]]]")]
        );
    }

    fn block_depth(nodes: &[Node<'_>]) -> usize {
        nodes
            .iter()
            .filter_map(|node| match node {
                Node::If(block) => Some(block),
                _ => None,
            })
            .map(|block| {
                let deepest = block
                    .branches
                    .iter()
                    .chain(block.otherwise.iter())
                    .map(|b| block_depth(&b.body))
                    .max()
                    .unwrap_or(0);
                deepest + 1
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_deep_nesting_stops_building_at_limit() {
        let n = 10_000;
        let src = format!("{}x{}", "[[[if:on]]]".repeat(n), "[[[endif]]]".repeat(n));
        let nodes = parse(&src);
        assert_eq!(block_depth(&nodes), MAX_CONDITIONAL_DEPTH + 1);

        let mut block = match &nodes[..] {
            [Node::If(block)] => block,
            other => panic!("expected one block, got {other:?}"),
        };
        for _ in 0..MAX_CONDITIONAL_DEPTH {
            block = match &block.branches[0].body[..] {
                [Node::If(inner)] => inner,
                other => panic!("expected nested block, got {other:?}"),
            };
        }
        let inner = n - MAX_CONDITIONAL_DEPTH - 1;
        let branch = &block.branches[0];
        assert!(branch.body.is_empty());
        assert_eq!(
            branch.source,
            format!("{}x{}", "[[[if:on]]]".repeat(inner), "[[[endif]]]".repeat(inner))
        );
    }

    #[test]
    fn test_unclosed_run_is_all_text() {
        let src = "[[[if:on]]]".repeat(20_000);
        let nodes = parse(&src);
        let text: String = nodes
            .iter()
            .map(|node| match node {
                Node::Text(t) => *t,
                other => panic!("unexpected node {other:?}"),
            })
            .collect();
        assert_eq!(text, src);
    }

    #[test]
    fn test_unclosed_if_keeps_branch_tags_and_inner_blocks() {
        let nodes = parse("[[[if:a]]]A[[[else]]][[[if:b]]]B[[[endif]]]");
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], Node::Text("[[[if:a]]]"));
        assert_eq!(nodes[1], Node::Text("A"));
        assert_eq!(nodes[2], Node::Text("[[[else]]]"));
        assert!(matches!(&nodes[3], Node::If(block) if block.branches[0].source == "B"));
    }
}

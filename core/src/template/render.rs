use serde::Serialize;
use serde_json::Value;

use herald_types::formatting::apply_transform;

use super::condition::Condition;
use super::parser::{Branch, IfBlock, Node, parse};
use crate::lookup::{resolve, value_to_string};

/// Deepest conditional nesting that is evaluated. A branch selected below
/// this depth is emitted unprocessed.
pub const MAX_CONDITIONAL_DEPTH: usize = 10;

/// Something the renderer worked around
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderWarning {
    #[error("conditional nesting deeper than {max} at byte {offset}; branch left unprocessed")]
    DepthExceeded { offset: usize, max: usize },

    #[error("invalid condition at byte {offset} treated as false: {reason}")]
    InvalidCondition { offset: usize, reason: String },

    #[error("unknown transform '{name}' at byte {offset}; value left unchanged")]
    UnknownTransform { offset: usize, name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderOutput {
    pub text: String,
    pub warnings: Vec<RenderWarning>,
}

/// Render `template` against `data`. Never fails; see [`render_with_report`].
pub fn render(template: &str, data: &Value) -> String {
    render_with_report(template, data).text
}

/// Render and collect warnings.
///
/// `[[[tag]]]` is replaced by the tag's value (empty when absent), and the
/// first true branch of each conditional block is rendered in place of it.
pub fn render_with_report(template: &str, data: &Value) -> RenderOutput {
    let nodes = parse(template);
    let mut renderer = Renderer {
        data,
        out: String::with_capacity(template.len()),
        warnings: Vec::new(),
    };
    renderer.nodes(&nodes, 0);
    RenderOutput {
        text: renderer.out,
        warnings: renderer.warnings,
    }
}

struct Renderer<'d> {
    data: &'d Value,
    out: String,
    warnings: Vec<RenderWarning>,
}

impl Renderer<'_> {
    fn nodes(&mut self, nodes: &[Node<'_>], depth: usize) {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Var {
                    name,
                    transform,
                    offset,
                } => self.var(name, *transform, *offset),
                Node::If(block) => self.conditional(block, depth),
            }
        }
    }

    fn var(&mut self, name: &str, transform: Option<&str>, offset: usize) {
        let value = resolve(self.data, name)
            .and_then(value_to_string)
            .unwrap_or_default();
        let value = match transform.filter(|t| !t.is_empty()) {
            None => value,
            Some(name) => match apply_transform(name, &value) {
                Some(transformed) => transformed,
                None => {
                    self.warnings.push(RenderWarning::UnknownTransform {
                        offset,
                        name: name.to_string(),
                    });
                    value
                }
            },
        };
        self.out.push_str(&value);
    }

    fn conditional(&mut self, block: &IfBlock<'_>, depth: usize) {
        let selected = block
            .branches
            .iter()
            .find(|branch| self.test(branch))
            .or(block.otherwise.as_ref());
        let Some(branch) = selected else {
            return;
        };

        if depth >= MAX_CONDITIONAL_DEPTH {
            tracing::warn!(
                offset = branch.offset,
                max = MAX_CONDITIONAL_DEPTH,
                "Conditional nesting too deep, branch left unprocessed"
            );
            self.warnings.push(RenderWarning::DepthExceeded {
                offset: branch.offset,
                max: MAX_CONDITIONAL_DEPTH,
            });
            self.out.push_str(branch.source);
            return;
        }
        self.nodes(&branch.body, depth + 1);
    }

    fn test(&mut self, branch: &Branch<'_>) -> bool {
        let Some(text) = branch.condition else {
            return true;
        };
        match Condition::parse(text) {
            Ok(condition) => condition.evaluate(self.data),
            Err(reason) => {
                self.warnings.push(RenderWarning::InvalidCondition {
                    offset: branch.offset,
                    reason,
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BITS: &str = "[[[if:event.bits>100]]]Big[[[else]]]Small[[[endif]]]";

    #[test]
    fn test_if_else_on_event_bits() {
        assert_eq!(render(BITS, &json!({"event": {"bits": 150}})), "Big");
        assert_eq!(render(BITS, &json!({"event": {"bits": 50}})), "Small");
        assert_eq!(render(BITS, &json!({})), "Small");
    }

    #[test]
    fn test_substitution() {
        let data = json!({"latest_follower": "Ann", "a.b": "flat", "a": {"b": "nested"}, "n": 1500});
        assert_eq!(
            render("Hi [[[latest_follower]]]! [[[missing]]]|[[[a.b]]]", &data),
            "Hi Ann! |flat"
        );
        assert_eq!(render("[[[n|compact]]] [[[n|thousands]]]", &data), "1.50K 1,500");
        assert_eq!(render("[[[latest_follower | upper]]]", &data), "ANN");
    }

    #[test]
    fn test_unknown_transform_warns() {
        let out = render_with_report("[[[name|sparkle]]]", &json!({"name": "x"}));
        assert_eq!(out.text, "x");
        assert_eq!(
            out.warnings,
            vec![RenderWarning::UnknownTransform {
                offset: 0,
                name: "sparkle".to_string()
            }]
        );
    }

    #[test]
    fn test_elseif_chain_first_true_wins() {
        let tpl = "[[[if:n>=100]]]big[[[elseif:n>=10]]]mid[[[elseif:n>=1]]]small[[[endif]]]";
        assert_eq!(render(tpl, &json!({"n": 500})), "big");
        assert_eq!(render(tpl, &json!({"n": 50})), "mid");
        assert_eq!(render(tpl, &json!({"n": 5})), "small");
        assert_eq!(render(tpl, &json!({"n": 0})), "");
    }

    #[test]
    fn test_nested_blocks_and_substitution_inside() {
        let tpl = "[[[if:live]]]Live[[[if:viewers>10]]] with [[[viewers]]][[[endif]]]![[[else]]]Offline[[[endif]]]";
        assert_eq!(render(tpl, &json!({"live": "1", "viewers": 42})), "Live with 42!");
        assert_eq!(render(tpl, &json!({"live": "1", "viewers": 3})), "Live!");
        assert_eq!(render(tpl, &json!({"live": "0"})), "Offline");
    }

    #[test]
    fn test_depth_limit_leaves_branch_unprocessed() {
        let depth = MAX_CONDITIONAL_DEPTH + 1;
        let tpl = format!(
            "{}[[[x]]]{}",
            "[[[if:on]]]".repeat(depth),
            "[[[endif]]]".repeat(depth)
        );
        let out = render_with_report(&tpl, &json!({"on": true, "x": "deep"}));
        assert_eq!(out.text, "[[[x]]]");
        assert!(matches!(
            out.warnings.as_slice(),
            [RenderWarning::DepthExceeded { .. }]
        ));

        let tpl = format!(
            "{}[[[x]]]{}",
            "[[[if:on]]]".repeat(MAX_CONDITIONAL_DEPTH),
            "[[[endif]]]".repeat(MAX_CONDITIONAL_DEPTH)
        );
        let out = render_with_report(&tpl, &json!({"on": true, "x": "deep"}));
        assert_eq!(out.text, "deep");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_very_deep_nesting_renders_without_overflow() {
        let n = 10_000;
        let tpl = format!("{}x{}", "[[[if:on]]]".repeat(n), "[[[endif]]]".repeat(n));
        assert!(crate::template::validate(&tpl).is_ok());

        let out = render_with_report(&tpl, &json!({"on": true}));
        let inner = n - MAX_CONDITIONAL_DEPTH - 1;
        assert_eq!(
            out.text,
            format!("{}x{}", "[[[if:on]]]".repeat(inner), "[[[endif]]]".repeat(inner))
        );
        assert_eq!(
            out.warnings,
            vec![RenderWarning::DepthExceeded {
                offset: MAX_CONDITIONAL_DEPTH * "[[[if:on]]]".len(),
                max: MAX_CONDITIONAL_DEPTH
            }]
        );
    }

    #[test]
    fn test_long_run_of_unclosed_ifs_stays_literal() {
        let tpl = "[[[if:on]]]".repeat(20_000);
        let out = render_with_report(&tpl, &json!({"on": true}));
        assert_eq!(out.text, tpl);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_malformed_degrades_to_literal() {
        assert_eq!(render("[[[if:x]]]y", &json!({"x": 1})), "[[[if:x]]]y");
        assert_eq!(render("[[[]]] and [[[name", &json!({})), "[[[]]] and [[[name");
        assert_eq!(render("[[[a [[[b]]]", &json!({"b": "B"})), "[[[a B");
        assert_eq!(render("[[[endif]]]ok", &json!({})), "[[[endif]]]ok");
    }

    #[test]
    fn test_invalid_condition_is_false() {
        let out = render_with_report("[[[if: >3]]]a[[[else]]]b[[[endif]]]", &json!({}));
        assert_eq!(out.text, "b");
        assert!(matches!(
            out.warnings.as_slice(),
            [RenderWarning::InvalidCondition { offset: 0, .. }]
        ));
    }
}

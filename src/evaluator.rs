//! Resolution of `{name}` attribute references.
//!
//! Evaluation runs in two passes over one flat attribute scope. First every
//! attribute value is expanded once against the attribute values as parsed;
//! then every text line and list item in the tree is expanded against the
//! updated values. Expansion is deliberately not transitive: if `{a}` expands
//! to text containing `{b}`, that inner reference stays as written.
//!
//! Evaluation never fails. A broken reference is replaced by a visible
//! `<error: ...>` marker in the output text.

use crate::ast::{Block, Document, Node};
use crate::context::Context;
use log::Level;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

/// A `{...}` span with no braces inside it.
static ATTRIBUTE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*)\}").expect("attribute reference pattern is valid"));

/// Replaces every `{name}` in `text` with the value of attribute `name`.
pub fn substitute(text: &str, attributes: &BTreeMap<String, String>) -> String {
    ATTRIBUTE_REF
        .replace_all(text, |caps: &Captures| {
            let name = caps[1].trim();
            if name.is_empty() {
                return format!("<error: too short attribute '{name}'>");
            }
            match attributes.get(name) {
                Some(value) => value.clone(),
                None => format!("<error: no such attribute '{name}'>"),
            }
        })
        .into_owned()
}

pub struct Evaluator<'c> {
    ctx: &'c Context,
}

impl<'c> Evaluator<'c> {
    pub fn new(ctx: &'c Context) -> Self {
        Self { ctx }
    }

    pub fn evaluate(&self, document: &mut Document) {
        self.eval_attributes(document);
        let Document { root, attributes } = document;
        self.eval_tree(root, attributes);
    }

    /// One substitution pass over every attribute value, both in the document
    /// scope and in the per-block maps, all against the values as parsed.
    fn eval_attributes(&self, document: &mut Document) {
        let parsed = document.attributes.clone();
        for value in document.attributes.values_mut() {
            *value = substitute(value, &parsed);
        }

        let mut pending = vec![&mut document.root];
        while let Some(block) = pending.pop() {
            for value in block.attributes.values_mut() {
                *value = substitute(value, &parsed);
            }
            for child in block.children.iter_mut() {
                if let Node::Block(inner) = child {
                    pending.push(inner);
                }
            }
        }
    }

    fn eval_tree(&self, root: &mut Block, attributes: &BTreeMap<String, String>) {
        let mut pending = vec![root];
        while let Some(block) = pending.pop() {
            if self.ctx.enabled(Level::Debug) {
                log::debug!("evaluating block '{}' (line {})", block.name, block.line);
            }
            for child in block.children.iter_mut() {
                match child {
                    Node::Block(inner) => pending.push(inner),
                    Node::List(list) => {
                        for item in &mut list.items {
                            item.text = substitute(&item.text, attributes);
                        }
                    }
                    Node::TextLine(leaf) => leaf.text = substitute(&leaf.text, attributes),
                    Node::Empty(_) => {}
                }
            }
        }
    }
}

impl Document {
    /// Resolves attribute references in place.
    pub fn evaluate(&mut self, ctx: &Context) {
        Evaluator::new(ctx).evaluate(self);
    }
}

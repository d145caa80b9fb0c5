//! Anonymous label allocation.
//!
//! A node that needs a synthesized name (an unnamed alias, a bind parameter, an
//! unlabeled expression in a subquery's columns) produces an [`AnonLabel`]: a
//! template made of literal text and slots keyed by the node's transient
//! [`NodeId`] plus a human hint. Templates become final strings only inside a
//! [`LabelResolver`], which hands out `<hint>_<n>` names from per-hint counters.
//! The same slot always resolves to the same string within one resolver, so a
//! label used both in the projection and in ORDER BY names one output column.

use crate::config::CompileConfig;
use crate::node::NodeId;
use std::collections::HashMap;
use std::fmt;

/// One piece of an anonymous label template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelPart {
    /// Literal text.
    Text(String),
    /// Placeholder resolved per compilation.
    Slot { id: NodeId, hint: String },
}

/// A label template with at least one identity-keyed slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnonLabel {
    parts: Vec<LabelPart>,
}

impl AnonLabel {
    /// Create a template for the node `id`, using `hint` as the readable part.
    pub fn new(id: NodeId, hint: impl Into<String>) -> Self {
        let hint = hint.into();
        let hint = if hint.is_empty() { "anon".to_string() } else { hint };
        Self {
            parts: vec![LabelPart::Slot { id, hint }],
        }
    }

    /// Append literal text, keeping the result anonymous.
    pub fn concat(&self, suffix: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.push(LabelPart::Text(suffix.to_string()));
        Self { parts }
    }

    /// Prepend literal text, keeping the result anonymous.
    pub fn prefixed(&self, prefix: &str) -> Self {
        let mut parts = Vec::with_capacity(self.parts.len() + 1);
        parts.push(LabelPart::Text(prefix.to_string()));
        parts.extend(self.parts.iter().cloned());
        Self { parts }
    }

    pub fn parts(&self) -> &[LabelPart] {
        &self.parts
    }

    /// The most specific readable name available without resolving.
    pub fn hint(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                LabelPart::Text(t) => t.as_str(),
                LabelPart::Slot { hint, .. } => hint.as_str(),
            })
            .collect()
    }
}

impl fmt::Display for AnonLabel {
    /// Renders the unresolved template, e.g. `%(17 param)s`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                LabelPart::Text(t) => write!(f, "{}", t)?,
                LabelPart::Slot { id, hint } => write!(f, "%({} {})s", id.get(), hint)?,
            }
        }
        Ok(())
    }
}

/// A name that is either fixed or resolved at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelName {
    Plain(String),
    Anon(AnonLabel),
}

impl LabelName {
    pub fn anon(id: NodeId, hint: impl Into<String>) -> Self {
        LabelName::Anon(AnonLabel::new(id, hint))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, LabelName::Anon(_))
    }

    /// A readable form for messages: the plain name or the anonymous hint.
    pub fn description(&self) -> String {
        match self {
            LabelName::Plain(s) => s.clone(),
            LabelName::Anon(a) => a.hint(),
        }
    }

    /// Append literal text.
    pub fn concat(&self, suffix: &str) -> Self {
        match self {
            LabelName::Plain(s) => LabelName::Plain(format!("{}{}", s, suffix)),
            LabelName::Anon(a) => LabelName::Anon(a.concat(suffix)),
        }
    }
}

impl From<&str> for LabelName {
    fn from(s: &str) -> Self {
        LabelName::Plain(s.to_string())
    }
}

impl From<String> for LabelName {
    fn from(s: String) -> Self {
        LabelName::Plain(s)
    }
}

impl fmt::Display for LabelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelName::Plain(s) => write!(f, "{}", s),
            LabelName::Anon(a) => write!(f, "{}", a),
        }
    }
}

/// Per-compilation label state.
///
/// Create one per rendering pass; never share one across statements that are
/// compiled independently.
#[derive(Debug, Clone)]
pub struct LabelResolver {
    config: CompileConfig,
    slots: HashMap<(NodeId, String), String>,
    counters: HashMap<String, usize>,
    truncated: HashMap<String, String>,
    truncation_counter: usize,
}

impl Default for LabelResolver {
    fn default() -> Self {
        Self::new(CompileConfig::default())
    }
}

impl LabelResolver {
    pub fn new(config: CompileConfig) -> Self {
        Self {
            config,
            slots: HashMap::new(),
            counters: HashMap::new(),
            truncated: HashMap::new(),
            truncation_counter: 1,
        }
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Resolve a label to its final string.
    pub fn resolve(&mut self, name: &LabelName) -> String {
        match name {
            LabelName::Plain(s) => s.clone(),
            LabelName::Anon(a) => self.resolve_anon(a),
        }
    }

    /// Resolve every slot of an anonymous template, then truncate if too long.
    pub fn resolve_anon(&mut self, label: &AnonLabel) -> String {
        let mut out = String::new();
        for part in label.parts() {
            match part {
                LabelPart::Text(t) => out.push_str(t),
                LabelPart::Slot { id, hint } => {
                    let resolved = self.resolve_slot(*id, hint);
                    out.push_str(&resolved);
                }
            }
        }
        self.truncate(out)
    }

    /// Number of distinct slots resolved so far.
    pub fn resolved_count(&self) -> usize {
        self.slots.len()
    }

    fn resolve_slot(&mut self, id: NodeId, hint: &str) -> String {
        let key = (id, hint.to_string());
        if let Some(existing) = self.slots.get(&key) {
            return existing.clone();
        }
        let counter = self.counters.entry(hint.to_string()).or_insert(1);
        let value = format!("{}{}{}", hint, self.config.label_separator, counter);
        *counter += 1;
        self.slots.insert(key, value.clone());
        value
    }

    fn truncate(&mut self, name: String) -> String {
        let max = self.config.max_identifier_length;
        if name.chars().count() <= max {
            return name;
        }
        if let Some(existing) = self.truncated.get(&name) {
            return existing.clone();
        }
        let head: String = name.chars().take(max.saturating_sub(6)).collect();
        let short = format!("{}_{:x}", head, self.truncation_counter);
        self.truncation_counter += 1;
        self.truncated.insert(name, short.clone());
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_slot_resolves_identically() {
        let id = NodeId::next();
        let label = AnonLabel::new(id, "param");
        let mut resolver = LabelResolver::default();
        let first = resolver.resolve_anon(&label);
        let second = resolver.resolve_anon(&label.clone());
        assert_eq!(first, "param_1");
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_identities_get_distinct_names() {
        let a = AnonLabel::new(NodeId::next(), "param");
        let b = AnonLabel::new(NodeId::next(), "param");
        let c = AnonLabel::new(NodeId::next(), "count");
        let mut resolver = LabelResolver::default();
        assert_eq!(resolver.resolve_anon(&a), "param_1");
        assert_eq!(resolver.resolve_anon(&b), "param_2");
        assert_eq!(resolver.resolve_anon(&c), "count_1");
        assert_eq!(resolver.resolved_count(), 3);
    }

    #[test]
    fn test_concat_keeps_slot() {
        let label = AnonLabel::new(NodeId::next(), "users").concat("_id");
        let mut resolver = LabelResolver::default();
        assert_eq!(resolver.resolve_anon(&label), "users_1_id");
        assert_eq!(label.hint(), "users_id");
    }

    #[test]
    fn test_template_text_mentions_identity() {
        let id = NodeId::next();
        let label = AnonLabel::new(id, "anon");
        assert_eq!(label.to_string(), format!("%({} anon)s", id.get()));
    }

    #[test]
    fn test_truncation_is_stable() {
        let config = CompileConfig::new().with_max_identifier_length(10);
        let mut resolver = LabelResolver::new(config);
        let long = LabelName::Plain("a_very_long_label_name".to_string());
        let first = resolver.resolve(&long);
        assert_eq!(first, "a_ve_1");
        assert_eq!(resolver.resolve(&long), first);
        let other = LabelName::Plain("another_long_label".to_string());
        assert_eq!(resolver.resolve(&other), "anot_2");
    }

    #[test]
    fn test_custom_separator() {
        let config = CompileConfig::new().with_label_separator("__");
        let mut resolver = LabelResolver::new(config);
        let label = LabelName::anon(NodeId::next(), "x");
        assert_eq!(resolver.resolve(&label), "x__1");
    }
}

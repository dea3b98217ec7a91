//! Scope coverage: every discovered feature must end up implemented,
//! deferred or skipped before a workflow may finish.

use crate::paths::slugify;
use crate::types::DecisionCategory;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeCoverage {
    #[serde(default)]
    pub discovered: Vec<FeatureRef>,
    #[serde(default)]
    pub implemented: BTreeSet<String>,
    #[serde(default)]
    pub deferred: BTreeSet<String>,
    #[serde(default)]
    pub skipped: BTreeSet<String>,
}

impl ScopeCoverage {
    pub fn is_discovered(&self, name: &str) -> bool {
        self.discovered.iter().any(|f| f.name == name)
    }

    /// Record a feature decision. `Unknown` only discovers the feature and
    /// leaves any earlier outcome in place; other categories move the
    /// feature into exactly one outcome set.
    pub fn record_decision(
        &mut self,
        name: &str,
        category: DecisionCategory,
        question: Option<&str>,
        at: DateTime<Utc>,
    ) {
        if !self.is_discovered(name) {
            self.discovered.push(FeatureRef {
                name: name.to_string(),
                question: question.map(|q| q.chars().take(200).collect()),
                discovered_at: Some(at),
            });
        }
        let target = match category {
            DecisionCategory::Implement => &mut self.implemented,
            DecisionCategory::Defer => &mut self.deferred,
            DecisionCategory::Skip => &mut self.skipped,
            DecisionCategory::Unknown => return,
        };
        target.insert(name.to_string());
        for (set, cat) in [
            (&mut self.implemented, DecisionCategory::Implement),
            (&mut self.deferred, DecisionCategory::Defer),
            (&mut self.skipped, DecisionCategory::Skip),
        ] {
            if cat != category {
                set.remove(name);
            }
        }
    }

    pub fn outcome(&self, name: &str) -> Option<DecisionCategory> {
        if self.implemented.contains(name) {
            Some(DecisionCategory::Implement)
        } else if self.deferred.contains(name) {
            Some(DecisionCategory::Defer)
        } else if self.skipped.contains(name) {
            Some(DecisionCategory::Skip)
        } else {
            None
        }
    }

    fn is_accounted(&self, name: &str) -> bool {
        self.outcome(name).is_some()
    }

    /// Discovered features with no outcome yet, in discovery order.
    pub fn undecided(&self) -> Vec<&str> {
        self.discovered
            .iter()
            .map(|f| f.name.as_str())
            .filter(|n| !self.is_accounted(n))
            .collect()
    }

    /// True iff every discovered feature has an outcome (vacuously true when
    /// nothing was discovered).
    pub fn is_complete(&self) -> bool {
        self.discovered.iter().all(|f| self.is_accounted(&f.name))
    }

    /// Rounded percentage of discovered features with an outcome; 100 when
    /// nothing was discovered. Informational only.
    pub fn coverage_percent(&self) -> u32 {
        let total = self.discovered.len() as u32;
        if total == 0 {
            return 100;
        }
        let accounted = self
            .discovered
            .iter()
            .filter(|f| self.is_accounted(&f.name))
            .count() as u32;
        (accounted * 200 + total) / (2 * total)
    }
}

// ---------------------------------------------------------------------------
// Heuristics for events without an explicit feature id
// ---------------------------------------------------------------------------

const FEATURE_VERBS: &[&str] = &["implement", "include", "support", "enable", "add"];
const FEATURE_NOUNS: &[&str] = &["feature", "functionality", "capability"];

fn word_re(words: &str) -> Regex {
    Regex::new(&format!(r"\b(?:{words})\b")).unwrap()
}

fn decision_reply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        word_re("yes|no|skip|defer|later|include|exclude|implement|confirm|reject")
    })
}

fn implement_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| word_re("yes|include|implement|confirm"))
}

fn defer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| word_re("defer|later|phase 2|future"))
}

fn skip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| word_re("no|skip|exclude|reject"))
}

/// A question is a feature decision when it talks about adding capability
/// and the reply reads like a yes / no / later verdict.
pub fn is_feature_decision(prompt: &str, reply: &str) -> bool {
    let prompt = prompt.to_lowercase();
    let has_keyword = FEATURE_VERBS
        .iter()
        .chain(FEATURE_NOUNS)
        .any(|k| prompt.contains(k));
    has_keyword && decision_reply_re().is_match(&reply.to_lowercase())
}

pub fn categorize_reply(reply: &str) -> DecisionCategory {
    let reply = reply.to_lowercase();
    if implement_re().is_match(&reply) {
        DecisionCategory::Implement
    } else if defer_re().is_match(&reply) {
        DecisionCategory::Defer
    } else if skip_re().is_match(&reply) {
        DecisionCategory::Skip
    } else {
        DecisionCategory::Unknown
    }
}

/// Up to three words following the first feature verb, as a slug.
pub fn extract_feature(prompt: &str) -> Option<String> {
    let lower = prompt.to_lowercase();
    let question = lower.split('?').next().unwrap_or_default();
    for verb in FEATURE_VERBS {
        let Some(idx) = question.find(verb) else {
            continue;
        };
        let after: Vec<&str> = question[idx..].split_whitespace().skip(1).take(3).collect();
        let slug = slugify(&after.join(" "), 3);
        if !slug.is_empty() {
            return Some(slug);
        }
    }
    None
}

/// Name the feature an event refers to. An explicit id wins; otherwise the
/// name is extracted from the prompt, then slugged from it, then numbered.
pub fn resolve_feature_name(explicit: Option<&str>, prompt: &str, ordinal: usize) -> String {
    if let Some(id) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        return id.to_string();
    }
    if let Some(name) = extract_feature(prompt) {
        return name;
    }
    let slug = slugify(prompt, 4);
    if slug.is_empty() {
        format!("feature-{ordinal}")
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(discovered: &[&str], decisions: &[(&str, DecisionCategory)]) -> ScopeCoverage {
        let mut scope = ScopeCoverage::default();
        let now = Utc::now();
        for name in discovered {
            scope.record_decision(name, DecisionCategory::Unknown, None, now);
        }
        for (name, cat) in decisions {
            scope.record_decision(name, *cat, None, now);
        }
        scope
    }

    #[test]
    fn one_undecided_feature_blocks_completion() {
        let scope = coverage(
            &["A", "B", "C"],
            &[("A", DecisionCategory::Implement), ("B", DecisionCategory::Defer)],
        );
        assert!(!scope.is_complete());
        assert_eq!(scope.coverage_percent(), 67);
        assert_eq!(scope.undecided(), vec!["C"]);
    }

    #[test]
    fn empty_scope_is_vacuously_complete() {
        let scope = ScopeCoverage::default();
        assert!(scope.is_complete());
        assert_eq!(scope.coverage_percent(), 100);
    }

    #[test]
    fn outcomes_are_mutually_exclusive() {
        let scope = coverage(
            &[],
            &[("webhooks", DecisionCategory::Defer), ("webhooks", DecisionCategory::Implement)],
        );
        assert!(scope.implemented.contains("webhooks"));
        assert!(!scope.deferred.contains("webhooks"));
        assert_eq!(scope.discovered.len(), 1);
        assert!(scope.is_complete());
    }

    #[test]
    fn unknown_keeps_previous_outcome() {
        let scope = coverage(
            &[],
            &[("svg", DecisionCategory::Skip), ("svg", DecisionCategory::Unknown)],
        );
        assert_eq!(scope.outcome("svg"), Some(DecisionCategory::Skip));
    }

    #[test]
    fn reply_categories() {
        assert_eq!(categorize_reply("Yes, include it"), DecisionCategory::Implement);
        assert_eq!(categorize_reply("Let's do that later"), DecisionCategory::Defer);
        assert_eq!(categorize_reply("No, skip"), DecisionCategory::Skip);
        assert_eq!(categorize_reply("hmm"), DecisionCategory::Unknown);
        assert_eq!(categorize_reply("nothing"), DecisionCategory::Unknown);
    }

    #[test]
    fn feature_decision_detection() {
        assert!(is_feature_decision("Should we support SVG logos?", "yes"));
        assert!(!is_feature_decision("Should we support SVG logos?", "hmm"));
        assert!(!is_feature_decision("Which provider?", "yes"));
    }

    #[test]
    fn feature_names_prefer_explicit_ids() {
        assert_eq!(resolve_feature_name(Some("svg-logos"), "whatever", 1), "svg-logos");
        assert_eq!(
            resolve_feature_name(None, "Should we support SVG logo output?", 1),
            "svg-logo-output"
        );
        assert_eq!(resolve_feature_name(None, "Rate limits?", 2), "rate-limits");
        assert_eq!(resolve_feature_name(None, "???", 3), "feature-3");
    }
}

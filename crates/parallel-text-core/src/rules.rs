//! Weighted regex rule engine.
//!
//! A [`RuleSet`] is an immutable table of named `(pattern, weight)` rules,
//! built once at startup and passed explicitly to whatever scores chunks.
//! Scoring lowercases the text, collects the distinct matches of every rule,
//! and sums `distinct matches × weight`.
//!
//! # Scoring
//!
//! 1. Lowercase the text; all patterns are compiled case-insensitively.
//! 2. For each rule, in table order, collect every non-overlapping match
//!    and deduplicate (each distinct substring counts once).
//! 3. `score = Σ distinct_count × weight`.
//! 4. If the score is 0 but the trimmed text is longer than
//!    [`BASELINE_MIN_CHARS`] characters, the score becomes
//!    [`BASELINE_SCORE`]. The match lists are left as they are.
//!
//! Distinct matches are sorted within each rule, so the output is fully
//! deterministic for a given text and table.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::{Chunk, RuleMatches, ScoreRecord};

/// Score assigned to substantial text that matched no rule.
pub const BASELINE_SCORE: i64 = 5;
/// Trimmed length (in characters) above which the baseline applies.
pub const BASELINE_MIN_CHARS: usize = 30;

/// Built-in rule table: `(name, pattern, weight)`, in evaluation order.
pub const BUILTIN_RULES: &[(&str, &str, i64)] = &[
    // identity
    ("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}", 8),
    ("mobile", r"\b[6-9]\d{9}\b", 8),
    // dates and amounts
    ("date", r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b", 4),
    ("amount", r"\b(rs\.?|₹|\$)\s?\d+(\.\d+)?\b", 4),
    // intent
    ("request", r"\b(request|apply|submit|require|need)\b", 3),
    ("complaint", r"\b(issue|problem|complaint|delay|error|fail)\b", 3),
    ("urgent", r"\b(urgent|immediate|asap|important)\b", 4),
    // technology
    (
        "technology",
        r"\b(software|application|system|server|database|network)\b",
        3,
    ),
    // skills
    (
        "skills",
        r"\b(python|java|c\+\+|html|css|javascript|sql|react|node|ai|ml)\b",
        2,
    ),
    // sentiment
    ("positive", r"\b(good|satisfied|happy|excellent)\b", 1),
    ("negative", r"\b(bad|unsatisfied|poor|delay|angry)\b", 1),
];

/// Uncompiled rule definition, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDef {
    pub name: String,
    pub pattern: String,
    pub weight: i64,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub pattern: String,
    pub weight: i64,
    regex: Regex,
}

impl Rule {
    /// Distinct matched substrings, sorted.
    fn distinct_matches(&self, folded: &str) -> Vec<String> {
        self.regex
            .find_iter(folded)
            .map(|m| m.as_str().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Output of [`RuleSet::analyze`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    /// Every rule name, with its distinct matches (possibly empty).
    pub matches: RuleMatches,
    /// Distinct matches of all rules, concatenated in table order.
    pub flat_patterns: Vec<String>,
    pub score: i64,
}

/// Immutable, versioned rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    version: String,
}

impl RuleSet {
    /// Compile a rule table. Fails on an invalid pattern or a repeated name.
    pub fn new(defs: Vec<RuleDef>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(defs.len());
        for def in defs {
            if def.name.trim().is_empty() {
                return Err(Error::invalid("rule name must not be empty"));
            }
            if !seen.insert(def.name.clone()) {
                return Err(Error::invalid(format!("duplicate rule name: {}", def.name)));
            }
            let regex = RegexBuilder::new(&def.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::invalid(format!("rule '{}': {}", def.name, e)))?;
            rules.push(Rule {
                name: def.name,
                pattern: def.pattern,
                weight: def.weight,
                regex,
            });
        }
        let version = fingerprint(&rules);
        Ok(Self { rules, version })
    }

    /// The built-in table ([`BUILTIN_RULES`]).
    pub fn builtin() -> Self {
        let defs = BUILTIN_RULES
            .iter()
            .map(|(name, pattern, weight)| RuleDef {
                name: name.to_string(),
                pattern: pattern.to_string(),
                weight: *weight,
            })
            .collect();
        // The built-in patterns are constants covered by unit tests.
        Self::new(defs).unwrap_or_else(|e| panic!("built-in rule table is invalid: {}", e))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Short SHA-256 fingerprint over every `(name, pattern, weight)`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Score `text` against the table.
    pub fn analyze(&self, text: &str) -> Analysis {
        let folded = text.to_lowercase();
        let mut matches = BTreeMap::new();
        let mut flat_patterns = Vec::new();
        let mut score = 0i64;

        for rule in &self.rules {
            let distinct = rule.distinct_matches(&folded);
            score += distinct.len() as i64 * rule.weight;
            flat_patterns.extend(distinct.iter().cloned());
            matches.insert(rule.name.clone(), distinct);
        }

        if score == 0 && folded.trim().chars().count() > BASELINE_MIN_CHARS {
            score = BASELINE_SCORE;
        }

        Analysis {
            matches,
            flat_patterns,
            score,
        }
    }

    /// Analyze a stored chunk and build the record to persist for it.
    pub fn score_chunk(&self, chunk: &Chunk) -> ScoreRecord {
        let analysis = self.analyze(&chunk.text);
        ScoreRecord {
            chunk_id: chunk.chunk_id.clone(),
            matches: analysis.matches,
            patterns: analysis.flat_patterns,
            score: analysis.score,
            rule_set_version: self.version.clone(),
            analyzed_at: chrono::Utc::now().timestamp(),
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn fingerprint(rules: &[Rule]) -> String {
    let mut hasher = Sha256::new();
    for rule in rules {
        hasher.update(rule.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(rule.pattern.as_bytes());
        hasher.update([0u8]);
        hasher.update(rule.weight.to_le_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

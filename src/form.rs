//! Form model — the core data model
//!
//! A `Form` is an ordered sequence of questions. A question may carry a
//! *visibility predicate*: a boolean expression over the answers given to
//! earlier questions. Questions without a predicate are always visible.
//!
//! ## Example Form
//!
//! ```yaml
//! id: onboarding
//! name: "Customer Onboarding"
//! questions:
//!   - id: account_type
//!     label: "Account type"
//!     domain:
//!       choices:
//!         - id: personal
//!         - id: business
//!   - id: company_name
//!     label: "Company name"
//!     visible_when:
//!       equals: { question: account_type, choice: business }
//! ```
//!
//! The ordinal position of a question is its position in the `questions`
//! list. A predicate may only reference questions that appear strictly
//! earlier; this is enforced during classification.

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A complete form definition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Form", description = "Conditional form definition")]
pub struct Form {
    /// Unique identifier (used in file names and reports)
    pub id: String,

    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Questions in display order
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// A single question
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    /// Stable identifier, unique within the form
    pub id: String,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Answer domain
    #[serde(default)]
    pub domain: AnswerDomain,

    /// Visibility predicate; absent means unconditionally visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<Predicate>,
}

/// Answer domain of a question
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerDomain {
    /// Ordered, enumerated choice set
    Choices(Vec<Choice>),

    /// Free-form entry (text, date, dynamic lookup) with no static choices
    #[default]
    FreeForm,
}

impl AnswerDomain {
    /// Choices if enumerated, empty slice otherwise
    pub fn choices(&self) -> &[Choice] {
        match self {
            AnswerDomain::Choices(choices) => choices,
            AnswerDomain::FreeForm => &[],
        }
    }

    pub fn is_free_form(&self) -> bool {
        matches!(self, AnswerDomain::FreeForm)
    }
}

/// A named option within an enumerated domain
///
/// The integer encoding of a choice is its 1-based position in the
/// declaration order; 0 is reserved for "not answered / not visible".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Choice {
    /// Stable identifier referenced by predicates
    pub id: String,

    /// Display label; defaults to the identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Choice {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// A visibility predicate over earlier questions' answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// The answer to `question` equals `choice`
    Equals { question: String, choice: String },

    /// The answer to `question` differs from `choice`
    NotEquals { question: String, choice: String },

    /// The answer to `question` is one of `choices`
    InSet {
        question: String,
        choices: Vec<String>,
    },

    /// All sub-predicates hold
    And(Vec<Predicate>),

    /// At least one sub-predicate holds
    Or(Vec<Predicate>),

    /// The sub-predicate does not hold
    Not(Box<Predicate>),
}

impl Predicate {
    /// Visit every comparison leaf (Equals / NotEquals / InSet) in
    /// left-to-right order.
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a Predicate)) {
        match self {
            Predicate::Equals { .. } | Predicate::NotEquals { .. } | Predicate::InSet { .. } => {
                f(self)
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.for_each_leaf(f);
                }
            }
            Predicate::Not(inner) => inner.for_each_leaf(f),
        }
    }

    /// Identifiers of all questions this predicate references, deduplicated,
    /// in order of first appearance.
    pub fn referenced_questions(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();
        self.for_each_leaf(&mut |leaf| {
            let q = match leaf {
                Predicate::Equals { question, .. }
                | Predicate::NotEquals { question, .. }
                | Predicate::InSet { question, .. } => question.as_str(),
                _ => return,
            };
            if !refs.contains(&q) {
                refs.push(q);
            }
        });
        refs
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Equals { question, choice } => write!(f, "{} == {}", question, choice),
            Predicate::NotEquals { question, choice } => write!(f, "{} != {}", question, choice),
            Predicate::InSet { question, choices } => {
                write!(f, "{} in [{}]", question, choices.join(", "))
            }
            Predicate::And(parts) => {
                let strs: Vec<_> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", strs.join(" && "))
            }
            Predicate::Or(parts) => {
                let strs: Vec<_> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", strs.join(" || "))
            }
            Predicate::Not(inner) => write!(f, "!({})", inner),
        }
    }
}

impl Form {
    /// Parse form from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::FormParse(e.to_string()))
    }

    /// Serialize form to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::FormParse(e.to_string()))
    }

    /// Parse form from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::FormParse(e.to_string()))
    }

    /// Serialize form to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::FormParse(e.to_string()))
    }

    /// Get a question by identifier
    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Map from question identifier to ordinal index.
    ///
    /// Fails on duplicate identifiers — the first structural check every
    /// pipeline stage relies on.
    pub fn index_of_ids(&self) -> Result<HashMap<&str, usize>> {
        let mut map = HashMap::with_capacity(self.questions.len());
        for (idx, q) in self.questions.iter().enumerate() {
            if map.insert(q.id.as_str(), idx).is_some() {
                return Err(Error::DuplicateId {
                    question: q.id.clone(),
                });
            }
        }
        Ok(map)
    }

    /// Display number for a question index (1-based, matching form order)
    pub fn number(&self, idx: usize) -> usize {
        idx + 1
    }

    /// Compute hash of form for change detection
    pub fn hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let content = self.to_yaml().unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("sha256:{}", hex::encode(&hasher.finalize()[..8]))
    }

    /// Validate structural invariants
    ///
    /// Checks identifiers (non-empty, unique), choice lists (non-empty ids,
    /// unique within a question) and predicate shapes (no empty
    /// conjunction / disjunction / choice set). Reference checks against
    /// other questions happen during classification.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::FormParse("form id is required".into()));
        }

        self.index_of_ids()?;

        for q in &self.questions {
            if q.id.is_empty() {
                return Err(Error::FormParse("question id is required".into()));
            }

            if let AnswerDomain::Choices(choices) = &q.domain {
                if choices.is_empty() {
                    return Err(Error::FormParse(format!(
                        "question {}: enumerated domain needs at least one choice",
                        q.id
                    )));
                }
            }

            let choices = q.domain.choices();
            let mut seen = std::collections::HashSet::new();
            for c in choices {
                if c.id.is_empty() {
                    return Err(Error::FormParse(format!(
                        "question {}: choice id is required",
                        q.id
                    )));
                }
                if !seen.insert(c.id.as_str()) {
                    return Err(Error::FormParse(format!(
                        "question {}: duplicate choice id '{}'",
                        q.id, c.id
                    )));
                }
            }

            if let Some(pred) = &q.visible_when {
                check_predicate_shape(&q.id, pred)?;
            }
        }

        Ok(())
    }
}

fn check_predicate_shape(question: &str, pred: &Predicate) -> Result<()> {
    match pred {
        Predicate::Equals { .. } | Predicate::NotEquals { .. } => Ok(()),
        Predicate::InSet { choices, .. } => {
            if choices.is_empty() {
                return Err(Error::Encoding {
                    question: question.to_string(),
                    reason: "empty choice set in 'in_set'".into(),
                });
            }
            Ok(())
        }
        Predicate::And(parts) | Predicate::Or(parts) => {
            if parts.is_empty() {
                return Err(Error::Encoding {
                    question: question.to_string(),
                    reason: "empty conjunction or disjunction".into(),
                });
            }
            for p in parts {
                check_predicate_shape(question, p)?;
            }
            Ok(())
        }
        Predicate::Not(inner) => check_predicate_shape(question, inner),
    }
}

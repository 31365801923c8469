//! Reporting interface — classification and gating structure as data
//!
//! Everything here is plain structured data for downstream consumers (the
//! CLI renders text and CSV from it); the engine does no formatting.

use crate::classify::Classification;
use crate::form::{Form, Predicate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a question participates in gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionClass {
    TestVariable,
    DataCollection,
}

/// Comparison used by a gating edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GateOperator {
    Equals,
    NotEquals,
    In,
}

impl std::fmt::Display for GateOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateOperator::Equals => write!(f, "=="),
            GateOperator::NotEquals => write!(f, "!="),
            GateOperator::In => write!(f, "in"),
        }
    }
}

/// The classification maps for one form
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Classification Report")]
pub struct ClassificationReport {
    pub form_id: String,
    pub total_questions: usize,
    pub test_variables: Vec<String>,
    pub gatekeepers: Vec<String>,
    pub data_collection: Vec<String>,
}

/// One gating relationship: the parent's answer appears in the child's
/// visibility predicate
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatingEdge {
    pub parent: String,
    pub parent_label: String,
    pub child: String,
    pub child_label: String,
    pub operator: GateOperator,
    /// Expected choice identifiers (one for equals/not-equals)
    pub expected: Vec<String>,
}

/// Per-question summary row
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QuestionIndexRow {
    pub question: String,
    pub label: String,
    pub classification: QuestionClass,
    /// Has a visibility predicate
    pub conditional: bool,
    /// Questions whose answers gate this one
    pub gated_by: Vec<String>,
    /// Questions this one's answer gates
    pub gates: Vec<String>,
}

/// Build the classification report.
pub fn classification_report(form: &Form, cls: &Classification) -> ClassificationReport {
    let ids = |set: &std::collections::BTreeSet<usize>| -> Vec<String> {
        set.iter().map(|&i| form.questions[i].id.clone()).collect()
    };

    ClassificationReport {
        form_id: form.id.clone(),
        total_questions: form.questions.len(),
        test_variables: ids(&cls.test_variables),
        gatekeepers: ids(&cls.gatekeepers),
        data_collection: ids(&cls.data_collection),
    }
}

/// Flatten every predicate leaf into gating-relationship rows, ordered by
/// (parent position, child position, leaf order).
pub fn gating_index(form: &Form) -> Vec<GatingEdge> {
    let mut edges: Vec<(usize, usize, GatingEdge)> = Vec::new();

    let position = |id: &str| form.questions.iter().position(|q| q.id == id);

    for (child_idx, q) in form.questions.iter().enumerate() {
        let Some(pred) = &q.visible_when else {
            continue;
        };

        pred.for_each_leaf(&mut |leaf| {
            let (parent, operator, expected) = match leaf {
                Predicate::Equals { question, choice } => {
                    (question, GateOperator::Equals, vec![choice.clone()])
                }
                Predicate::NotEquals { question, choice } => {
                    (question, GateOperator::NotEquals, vec![choice.clone()])
                }
                Predicate::InSet { question, choices } => {
                    (question, GateOperator::In, choices.clone())
                }
                _ => return,
            };
            let Some(parent_idx) = position(parent) else {
                return;
            };
            edges.push((
                parent_idx,
                child_idx,
                GatingEdge {
                    parent: parent.clone(),
                    parent_label: form.questions[parent_idx].label.clone(),
                    child: q.id.clone(),
                    child_label: q.label.clone(),
                    operator,
                    expected,
                },
            ));
        });
    }

    edges.sort_by_key(|(parent_idx, child_idx, _)| (*parent_idx, *child_idx));
    edges.into_iter().map(|(_, _, e)| e).collect()
}

/// Build the per-question index.
pub fn question_index(form: &Form, cls: &Classification) -> Vec<QuestionIndexRow> {
    form.questions
        .iter()
        .enumerate()
        .map(|(idx, q)| {
            let classification = if cls.is_test_variable(idx) {
                QuestionClass::TestVariable
            } else {
                QuestionClass::DataCollection
            };
            QuestionIndexRow {
                question: q.id.clone(),
                label: q.label.clone(),
                classification,
                conditional: q.visible_when.is_some(),
                gated_by: cls.reverse[idx]
                    .iter()
                    .map(|&i| form.questions[i].id.clone())
                    .collect(),
                gates: cls.forward[idx]
                    .iter()
                    .map(|&i| form.questions[i].id.clone())
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::form::{AnswerDomain, Choice, Question};

    fn sample_form() -> Form {
        Form {
            id: "sample".into(),
            name: None,
            questions: vec![
                Question {
                    id: "q1".into(),
                    label: "First".into(),
                    domain: AnswerDomain::Choices(vec![
                        Choice {
                            id: "a".into(),
                            label: None,
                        },
                        Choice {
                            id: "b".into(),
                            label: None,
                        },
                    ]),
                    visible_when: None,
                },
                Question {
                    id: "q2".into(),
                    label: "Second".into(),
                    domain: AnswerDomain::FreeForm,
                    visible_when: Some(Predicate::Equals {
                        question: "q1".into(),
                        choice: "a".into(),
                    }),
                },
                Question {
                    id: "q3".into(),
                    label: "Third".into(),
                    domain: AnswerDomain::FreeForm,
                    visible_when: Some(Predicate::InSet {
                        question: "q1".into(),
                        choices: vec!["a".into(), "b".into()],
                    }),
                },
            ],
        }
    }

    #[test]
    fn test_classification_report() {
        let form = sample_form();
        let cls = classify(&form).unwrap();
        let report = classification_report(&form, &cls);

        assert_eq!(report.test_variables, vec!["q1"]);
        assert_eq!(report.gatekeepers, vec!["q1"]);
        assert_eq!(report.data_collection, vec!["q2", "q3"]);
    }

    #[test]
    fn test_gating_index_rows() {
        let form = sample_form();
        let edges = gating_index(&form);

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].parent, "q1");
        assert_eq!(edges[0].child, "q2");
        assert_eq!(edges[0].operator, GateOperator::Equals);
        assert_eq!(edges[0].expected, vec!["a"]);
        assert_eq!(edges[1].child, "q3");
        assert_eq!(edges[1].operator, GateOperator::In);
        assert_eq!(edges[1].expected, vec!["a", "b"]);
    }

    #[test]
    fn test_question_index() {
        let form = sample_form();
        let cls = classify(&form).unwrap();
        let rows = question_index(&form, &cls);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].classification, QuestionClass::TestVariable);
        assert!(!rows[0].conditional);
        assert_eq!(rows[0].gates, vec!["q2", "q3"]);
        assert_eq!(rows[1].classification, QuestionClass::DataCollection);
        assert!(rows[1].conditional);
        assert_eq!(rows[1].gated_by, vec!["q1"]);
    }
}

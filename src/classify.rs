//! Question classification and dependency analysis
//!
//! Walks every visibility predicate to build the gating graph, then
//! partitions questions:
//!
//! - **Test variables** — questions whose answer gates at least one other
//!   question (out-degree ≥ 1 in the forward graph). Only these are encoded
//!   and assigned values during synthesis.
//! - **Gatekeepers** — test variables nothing gates (in-degree 0); the roots
//!   of enumeration.
//! - **Data-collection questions** — everything else. They may still be
//!   conditionally visible and must be covered, but their answers are never
//!   chosen for.
//!
//! References to unknown questions and references that do not point strictly
//! earlier in the form (which includes self-references and anything that
//! could form a cycle) are fatal here, before any synthesis work starts.

use crate::error::{Error, Result};
use crate::form::Form;
use std::collections::{BTreeMap, BTreeSet};

/// Result of classifying a form
#[derive(Debug, Clone)]
pub struct Classification {
    /// Forward gating edges: question index -> indices of questions it gates
    pub forward: Vec<BTreeSet<usize>>,

    /// Reverse gating edges: question index -> indices of questions gating it
    pub reverse: Vec<BTreeSet<usize>>,

    /// Indices of test variables
    pub test_variables: BTreeSet<usize>,

    /// Indices of gatekeepers (test variables with no incoming edges)
    pub gatekeepers: BTreeSet<usize>,

    /// Indices of data-collection questions
    pub data_collection: BTreeSet<usize>,

    /// Test variables in topological order.
    ///
    /// Because predicates only reference strictly earlier questions, ordinal
    /// order is already topological.
    pub order: Vec<usize>,
}

impl Classification {
    /// Number of questions classified
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn is_test_variable(&self, idx: usize) -> bool {
        self.test_variables.contains(&idx)
    }

    pub fn is_gatekeeper(&self, idx: usize) -> bool {
        self.gatekeepers.contains(&idx)
    }
}

/// Classify the questions of a form and build both dependency graphs.
pub fn classify(form: &Form) -> Result<Classification> {
    let ids = form.index_of_ids()?;
    let n = form.questions.len();

    let mut forward: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut reverse: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];

    for (idx, q) in form.questions.iter().enumerate() {
        let Some(pred) = &q.visible_when else {
            continue;
        };

        for referenced in pred.referenced_questions() {
            let Some(&ref_idx) = ids.get(referenced) else {
                return Err(Error::UnknownReference {
                    question: q.id.clone(),
                    referenced: referenced.to_string(),
                });
            };

            if ref_idx >= idx {
                return Err(Error::ForwardReference {
                    question: q.id.clone(),
                    referenced: referenced.to_string(),
                });
            }

            forward[ref_idx].insert(idx);
            reverse[idx].insert(ref_idx);
        }
    }

    let mut test_variables = BTreeSet::new();
    let mut gatekeepers = BTreeSet::new();
    let mut data_collection = BTreeSet::new();

    for idx in 0..n {
        if forward[idx].is_empty() {
            data_collection.insert(idx);
        } else {
            test_variables.insert(idx);
            if reverse[idx].is_empty() {
                gatekeepers.insert(idx);
            }
        }
    }

    // BTreeSet iterates ascending, so this is ordinal (= topological) order.
    let order: Vec<usize> = test_variables.iter().copied().collect();

    Ok(Classification {
        forward,
        reverse,
        test_variables,
        gatekeepers,
        data_collection,
        order,
    })
}

/// Reverse-dependency map keyed by question identifier: which questions'
/// visibility mentions each question's answer.
pub fn reverse_dependency_map(form: &Form, cls: &Classification) -> BTreeMap<String, Vec<String>> {
    let mut map = BTreeMap::new();
    for (idx, gated) in cls.forward.iter().enumerate() {
        if gated.is_empty() {
            continue;
        }
        let children = gated
            .iter()
            .map(|&c| form.questions[c].id.clone())
            .collect();
        map.insert(form.questions[idx].id.clone(), children);
    }
    map
}

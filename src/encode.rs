//! Constraint encoding of visibility logic
//!
//! Every test variable becomes a bounded integer: 0 means "not answered /
//! not visible", choice *i* (1-based declaration order) means that choice
//! was picked. Each question's visibility becomes a [`BoolExpr`] over those
//! integers, and one pair of linkage constraints per variable ties answers
//! to visibility.
//!
//! Visibility is *transitive*: a conditional question is visible only when
//! its own predicate holds **and** every question that predicate references
//! is itself visible. The encoder conjoins the referenced questions'
//! visibility expressions in, so a chain A gates B gates C unfolds to
//! `pred(C) && pred(B)` without any solver-side fixpoint.

use crate::classify::Classification;
use crate::error::{Error, Result};
use crate::form::{AnswerDomain, Form, Predicate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Index of an encoded integer variable
pub type VarId = usize;

/// Boolean expression over encoded integer variables
///
/// This is the full language shipped to the solver: integer comparison
/// against constants, membership, and the boolean connectives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoolExpr {
    Const(bool),

    /// Variable equals the encoded value
    Eq(VarId, i64),

    /// Variable differs from the encoded value
    Ne(VarId, i64),

    /// Variable is one of the encoded values
    In(VarId, Vec<i64>),

    And(Vec<BoolExpr>),
    Or(Vec<BoolExpr>),
    Not(Box<BoolExpr>),
}

impl BoolExpr {
    /// Conjunction with flattening and constant folding
    pub fn and(parts: Vec<BoolExpr>) -> BoolExpr {
        let mut flat = Vec::with_capacity(parts.len());
        for p in parts {
            match p {
                BoolExpr::Const(true) => {}
                BoolExpr::Const(false) => return BoolExpr::Const(false),
                BoolExpr::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => BoolExpr::Const(true),
            1 => flat.pop().unwrap_or(BoolExpr::Const(true)),
            _ => BoolExpr::And(flat),
        }
    }

    /// Disjunction with flattening and constant folding
    pub fn or(parts: Vec<BoolExpr>) -> BoolExpr {
        let mut flat = Vec::with_capacity(parts.len());
        for p in parts {
            match p {
                BoolExpr::Const(false) => {}
                BoolExpr::Const(true) => return BoolExpr::Const(true),
                BoolExpr::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => BoolExpr::Const(false),
            1 => flat.pop().unwrap_or(BoolExpr::Const(false)),
            _ => BoolExpr::Or(flat),
        }
    }

    /// Negation; pushes through constants, comparisons and double negation
    pub fn negate(self) -> BoolExpr {
        match self {
            BoolExpr::Const(b) => BoolExpr::Const(!b),
            BoolExpr::Eq(v, c) => BoolExpr::Ne(v, c),
            BoolExpr::Ne(v, c) => BoolExpr::Eq(v, c),
            BoolExpr::Not(inner) => *inner,
            other => BoolExpr::Not(Box::new(other)),
        }
    }

    /// `premise ⇒ conclusion`, encoded as `!premise || conclusion`
    pub fn implies(premise: BoolExpr, conclusion: BoolExpr) -> BoolExpr {
        BoolExpr::or(vec![premise.negate(), conclusion])
    }

    pub fn is_const_false(&self) -> bool {
        matches!(self, BoolExpr::Const(false))
    }
}

/// Encoded domain of one test variable
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VarInfo {
    /// Question index this variable encodes
    pub question: usize,

    /// Choice identifiers encoded 1..=len() in declaration order.
    /// For free-form questions these are the literals appearing in
    /// predicates, in order of first appearance.
    pub choice_values: Vec<String>,

    /// Encoding of the "other" bucket for free-form variables: a value the
    /// tester may fill with anything not matching a known literal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_value: Option<i64>,
}

impl VarInfo {
    /// Largest encoded value; the domain is 0..=domain_max()
    pub fn domain_max(&self) -> i64 {
        let choices = self.choice_values.len() as i64;
        match self.other_value {
            Some(v) => v.max(choices),
            None => choices,
        }
    }

    /// Encoding of a choice identifier, if it is part of this domain
    pub fn encode_choice(&self, choice: &str) -> Option<i64> {
        self.choice_values
            .iter()
            .position(|c| c == choice)
            .map(|p| p as i64 + 1)
    }

    /// Choice identifier for a nonzero encoded value, if it maps to one
    pub fn decode(&self, value: i64) -> Option<&str> {
        if value < 1 {
            return None;
        }
        self.choice_values
            .get(value as usize - 1)
            .map(|s| s.as_str())
    }

    pub fn is_other(&self, value: i64) -> bool {
        self.other_value == Some(value)
    }
}

/// Encoded constraint model of a form
#[derive(Debug, Clone)]
pub struct EncodedModel {
    /// One entry per test variable, in topological order
    pub vars: Vec<VarInfo>,

    /// Question index -> variable id
    pub var_of: HashMap<usize, VarId>,

    /// Visibility expression for every question (by question index)
    pub visibility: Vec<BoolExpr>,

    /// Linkage constraints: for every test variable V,
    /// `V ≠ 0 ⇒ visible(V)` and `visible(V) ⇒ V ≠ 0`
    pub validity: Vec<BoolExpr>,

    /// Questions whose visibility folded to constant false during encoding.
    /// The solver confirms these as unreachable without being asked.
    pub statically_dead: BTreeSet<usize>,
}

impl EncodedModel {
    /// Variable id for a question index, if it is a test variable
    pub fn var_for(&self, question: usize) -> Option<VarId> {
        self.var_of.get(&question).copied()
    }
}

/// Encode the classified form into a constraint model.
pub fn encode(form: &Form, cls: &Classification) -> Result<EncodedModel> {
    let ids = form.index_of_ids()?;

    // Domains first: enumerated choices keep declaration order; free-form
    // domains are bounded by the literals predicates compare against, plus
    // one "other" value.
    let mut vars: Vec<VarInfo> = Vec::with_capacity(cls.order.len());
    let mut var_of: HashMap<usize, VarId> = HashMap::with_capacity(cls.order.len());

    for &q_idx in &cls.order {
        let q = &form.questions[q_idx];
        let info = match &q.domain {
            AnswerDomain::Choices(choices) => VarInfo {
                question: q_idx,
                choice_values: choices.iter().map(|c| c.id.clone()).collect(),
                other_value: None,
            },
            AnswerDomain::FreeForm => {
                let literals = free_form_literals(form, &q.id);
                if literals.is_empty() {
                    // A free-form question only becomes a test variable via
                    // predicate leaves, which always carry a literal.
                    return Err(Error::Encoding {
                        question: q.id.clone(),
                        reason: "free-form test variable with no referenced values".into(),
                    });
                }
                let other = literals.len() as i64 + 1;
                VarInfo {
                    question: q_idx,
                    choice_values: literals,
                    other_value: Some(other),
                }
            }
        };
        var_of.insert(q_idx, vars.len());
        vars.push(info);
    }

    // Visibility expressions in ordinal order. Referenced questions come
    // strictly earlier, so their expressions are already built when needed
    // for the transitive conjunction.
    let mut visibility: Vec<BoolExpr> = Vec::with_capacity(form.questions.len());
    let mut statically_dead = BTreeSet::new();

    for (q_idx, q) in form.questions.iter().enumerate() {
        let expr = match &q.visible_when {
            None => BoolExpr::Const(true),
            Some(pred) => {
                let own = translate(&q.id, pred, &ids, &vars, &var_of)?;
                let mut parts = vec![own];
                for referenced in pred.referenced_questions() {
                    let ref_idx = ids[referenced];
                    parts.push(visibility[ref_idx].clone());
                }
                BoolExpr::and(parts)
            }
        };
        if expr.is_const_false() {
            statically_dead.insert(q_idx);
        }
        visibility.push(expr);
    }

    // Linkage: an answered variable is visible, a visible variable is
    // answered.
    let mut validity = Vec::with_capacity(vars.len() * 2);
    for (var, info) in vars.iter().enumerate() {
        let vis = visibility[info.question].clone();
        validity.push(BoolExpr::implies(BoolExpr::Ne(var, 0), vis.clone()));
        validity.push(BoolExpr::implies(vis, BoolExpr::Ne(var, 0)));
    }

    Ok(EncodedModel {
        vars,
        var_of,
        visibility,
        validity,
        statically_dead,
    })
}

/// Distinct literals compared against a free-form question, in order of
/// first appearance across the form.
fn free_form_literals(form: &Form, question_id: &str) -> Vec<String> {
    let mut literals: Vec<String> = Vec::new();
    let mut push = |value: &str| {
        if !literals.iter().any(|l| l == value) {
            literals.push(value.to_string());
        }
    };

    for q in &form.questions {
        let Some(pred) = &q.visible_when else {
            continue;
        };
        pred.for_each_leaf(&mut |leaf| match leaf {
            Predicate::Equals { question, choice } | Predicate::NotEquals { question, choice }
                if question == question_id =>
            {
                push(choice);
            }
            Predicate::InSet { question, choices } if question == question_id => {
                for c in choices {
                    push(c);
                }
            }
            _ => {}
        });
    }

    literals
}

/// Translate one predicate tree into arithmetic over encoded variables.
///
/// A comparison against a choice identifier the domain does not contain can
/// never hold: equality folds to false, inequality to true. That is how an
/// impossible gate surfaces as a statically dead question instead of an
/// error.
fn translate(
    question: &str,
    pred: &Predicate,
    ids: &HashMap<&str, usize>,
    vars: &[VarInfo],
    var_of: &HashMap<usize, VarId>,
) -> Result<BoolExpr> {
    Ok(match pred {
        Predicate::Equals {
            question: target,
            choice,
        } => {
            let var = lookup_var(question, target, ids, var_of)?;
            match vars[var].encode_choice(choice) {
                Some(value) => BoolExpr::Eq(var, value),
                None => BoolExpr::Const(false),
            }
        }

        Predicate::NotEquals {
            question: target,
            choice,
        } => {
            let var = lookup_var(question, target, ids, var_of)?;
            match vars[var].encode_choice(choice) {
                Some(value) => BoolExpr::Ne(var, value),
                None => BoolExpr::Const(true),
            }
        }

        Predicate::InSet {
            question: target,
            choices,
        } => {
            if choices.is_empty() {
                return Err(Error::Encoding {
                    question: question.to_string(),
                    reason: "empty choice set in 'in_set'".into(),
                });
            }
            let var = lookup_var(question, target, ids, var_of)?;
            let values: Vec<i64> = choices
                .iter()
                .filter_map(|c| vars[var].encode_choice(c))
                .collect();
            if values.is_empty() {
                BoolExpr::Const(false)
            } else {
                BoolExpr::In(var, values)
            }
        }

        Predicate::And(parts) => {
            let translated: Result<Vec<_>> = parts
                .iter()
                .map(|p| translate(question, p, ids, vars, var_of))
                .collect();
            BoolExpr::and(translated?)
        }

        Predicate::Or(parts) => {
            let translated: Result<Vec<_>> = parts
                .iter()
                .map(|p| translate(question, p, ids, vars, var_of))
                .collect();
            BoolExpr::or(translated?)
        }

        Predicate::Not(inner) => translate(question, inner, ids, vars, var_of)?.negate(),
    })
}

fn lookup_var(
    question: &str,
    target: &str,
    ids: &HashMap<&str, usize>,
    var_of: &HashMap<usize, VarId>,
) -> Result<VarId> {
    let idx = ids.get(target).ok_or_else(|| Error::UnknownReference {
        question: question.to_string(),
        referenced: target.to_string(),
    })?;
    // Every referenced question has out-degree ≥ 1, so classification made
    // it a test variable and the encoder gave it a variable.
    var_of.get(idx).copied().ok_or_else(|| Error::Encoding {
        question: question.to_string(),
        reason: format!("referenced question '{}' has no encoded variable", target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::form::{Choice, Question};

    fn choice_question(id: &str, choices: &[&str], visible_when: Option<Predicate>) -> Question {
        Question {
            id: id.into(),
            label: id.into(),
            domain: AnswerDomain::Choices(
                choices
                    .iter()
                    .map(|c| Choice {
                        id: c.to_string(),
                        label: None,
                    })
                    .collect(),
            ),
            visible_when,
        }
    }

    fn free_question(id: &str, visible_when: Option<Predicate>) -> Question {
        Question {
            id: id.into(),
            label: id.into(),
            domain: AnswerDomain::FreeForm,
            visible_when,
        }
    }

    fn eq(question: &str, choice: &str) -> Predicate {
        Predicate::Equals {
            question: question.into(),
            choice: choice.into(),
        }
    }

    fn build(questions: Vec<Question>) -> (Form, Classification) {
        let form = Form {
            id: "test".into(),
            name: None,
            questions,
        };
        let cls = classify(&form).unwrap();
        (form, cls)
    }

    #[test]
    fn test_choice_encoding_is_declaration_order() {
        let (form, cls) = build(vec![
            choice_question("q1", &["a", "b", "c"], None),
            free_question("q2", Some(eq("q1", "b"))),
        ]);
        let enc = encode(&form, &cls).unwrap();

        assert_eq!(enc.vars.len(), 1);
        assert_eq!(enc.vars[0].encode_choice("a"), Some(1));
        assert_eq!(enc.vars[0].encode_choice("b"), Some(2));
        assert_eq!(enc.vars[0].encode_choice("c"), Some(3));
        assert_eq!(enc.vars[0].domain_max(), 3);
        assert_eq!(enc.visibility[1], BoolExpr::Eq(0, 2));
    }

    #[test]
    fn test_transitive_chain_conjoined() {
        let (form, cls) = build(vec![
            choice_question("q1", &["a", "b"], None),
            choice_question("q2", &["x", "y"], Some(eq("q1", "a"))),
            free_question("q3", Some(eq("q2", "x"))),
        ]);
        let enc = encode(&form, &cls).unwrap();

        // visible(q3) folds to pred(q3) && pred(q2)
        assert_eq!(
            enc.visibility[2],
            BoolExpr::And(vec![BoolExpr::Eq(1, 1), BoolExpr::Eq(0, 1)])
        );
    }

    #[test]
    fn test_unknown_choice_is_statically_dead() {
        let (form, cls) = build(vec![
            choice_question("q1", &["a", "b"], None),
            free_question("q2", Some(eq("q1", "missing"))),
        ]);
        let enc = encode(&form, &cls).unwrap();

        assert!(enc.visibility[1].is_const_false());
        assert_eq!(enc.statically_dead, BTreeSet::from([1]));
    }

    #[test]
    fn test_free_form_domain_bounded_by_literals() {
        let (form, cls) = build(vec![
            free_question("service", None),
            free_question("q2", Some(eq("service", "database"))),
            free_question(
                "q3",
                Some(Predicate::InSet {
                    question: "service".into(),
                    choices: vec!["cache".into(), "database".into()],
                }),
            ),
        ]);
        let enc = encode(&form, &cls).unwrap();

        let var = &enc.vars[0];
        assert_eq!(var.choice_values, vec!["database", "cache"]);
        assert_eq!(var.other_value, Some(3));
        assert_eq!(var.domain_max(), 3);
    }

    #[test]
    fn test_validity_links_answer_and_visibility() {
        let (form, cls) = build(vec![
            choice_question("q1", &["a", "b"], None),
            choice_question("q2", &["x"], Some(eq("q1", "a"))),
            free_question("q3", Some(eq("q2", "x"))),
        ]);
        let enc = encode(&form, &cls).unwrap();

        // Two linkage constraints per test variable.
        assert_eq!(enc.validity.len(), 4);
        // q1 is unconditional: answered-implies-visible folds to true…
        assert_eq!(enc.validity[0], BoolExpr::Const(true));
        // …and visible-implies-answered folds to "q1 != 0".
        assert_eq!(enc.validity[1], BoolExpr::Ne(0, 0));
    }

    #[test]
    fn test_negation_pushes_through_comparison() {
        let (form, cls) = build(vec![
            choice_question("q1", &["a", "b"], None),
            free_question("q2", Some(Predicate::Not(Box::new(eq("q1", "a"))))),
        ]);
        let enc = encode(&form, &cls).unwrap();
        assert_eq!(enc.visibility[1], BoolExpr::Ne(0, 1));
    }
}

//! Scenario synthesis — the three-phase enumeration engine
//!
//! Produces a pool of valid scenarios from a classified, encoded form:
//!
//! 1. **Branch-aware enumeration** walks the test variables in topological
//!    order. A variable that is invisible under the partial assignment
//!    collapses to 0; a visible one branches over its nonzero values. The
//!    realized branching factor stays far below the unconstrained cartesian
//!    product because whole subtrees of the form collapse together.
//! 2. **Coverage inventory** unions the pool's visible-sets, then asks the
//!    solver whether each still-uncovered question can be visible at all.
//!    Questions with unsatisfiable visibility are *dead*: design feedback,
//!    not an error, and excluded from the coverage target.
//! 3. **Gap fill** repeatedly asks the solver for an assignment making any
//!    still-uncovered question visible and turns each model into a
//!    scenario. Every round covers at least one member of the gap, so the
//!    loop terminates in at most |gap| iterations.
//!
//! Scenario emission order is deterministic: Phase 1 in lexicographic order
//! of assignments along the topological order, Phase 3 in solver-model
//! order (itself deterministic for [`BoundedSolver`](crate::solver::BoundedSolver)).

use crate::classify::Classification;
use crate::encode::{BoolExpr, EncodedModel, VarId};
use crate::form::{Form, Predicate};
use crate::solver::{SatResult, Solver};
use fixedbitset::FixedBitSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Where a scenario came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOrigin {
    /// Phase 1 branch-aware enumeration
    Enumerated,
    /// Phase 3 solver-driven gap fill
    Synthesized,
}

/// One concrete assignment of answers to all test variables, with the set
/// of questions it makes visible
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Value per encoded variable; 0 means "not answered"
    pub assignment: Vec<i64>,

    /// Visible questions, by question index
    pub visible: FixedBitSet,

    pub origin: ScenarioOrigin,
}

impl Scenario {
    /// Number of test variables this scenario actually answers
    pub fn answered_count(&self) -> usize {
        self.assignment.iter().filter(|&&v| v != 0).count()
    }
}

/// Synthesis tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SynthOptions {
    /// Upper bound on Phase-1 scenarios. Enumeration past the bound is cut
    /// off deterministically (prefix in enumeration order) and Phase 3
    /// closes any gaps that leaves.
    pub max_enumerated_scenarios: usize,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            max_enumerated_scenarios: 4096,
        }
    }
}

/// The synthesized scenario pool with its coverage bookkeeping
#[derive(Debug, Clone)]
pub struct ScenarioPool {
    pub scenarios: Vec<Scenario>,

    /// Questions that can ever be visible (the coverage target)
    pub reachable: FixedBitSet,

    /// Union of the pool's visible-sets
    pub covered: FixedBitSet,

    /// Questions with unsatisfiable visibility
    pub dead: BTreeSet<usize>,

    /// Questions the gap-fill phase could not reach even though the
    /// reachability filter said it should; reported unreachable
    pub inconsistent: BTreeSet<usize>,

    /// Scenario counts per phase
    pub enumerated: usize,
    pub synthesized: usize,

    /// Phase 1 hit the enumeration bound
    pub truncated: bool,

    /// Set when the solver deadline expired; the pool is partial
    pub partial: Option<String>,
}

impl ScenarioPool {
    /// Reachable questions not covered by any scenario
    pub fn uncovered(&self) -> Vec<usize> {
        self.reachable
            .ones()
            .filter(|&q| !self.covered.contains(q))
            .collect()
    }
}

/// Run all three phases against a solver already holding nothing; the
/// engine declares the variables and asserts the validity model itself.
pub fn synthesize<S: Solver>(
    form: &Form,
    cls: &Classification,
    enc: &EncodedModel,
    solver: &mut S,
    options: &SynthOptions,
) -> ScenarioPool {
    let n = form.questions.len();

    for info in &enc.vars {
        solver.declare(0, info.domain_max());
    }
    for constraint in &enc.validity {
        solver.assert(constraint.clone());
    }

    let mut pool = ScenarioPool {
        scenarios: Vec::new(),
        reachable: FixedBitSet::with_capacity(n),
        covered: FixedBitSet::with_capacity(n),
        dead: BTreeSet::new(),
        inconsistent: BTreeSet::new(),
        enumerated: 0,
        synthesized: 0,
        truncated: false,
        partial: None,
    };

    enumerate_branches(form, cls, enc, solver, options, &mut pool);
    inventory_coverage(enc, solver, &mut pool, n);

    if pool.partial.is_none() {
        fill_gaps(form, enc, solver, &mut pool);
    }

    pool
}

// ---------------------------------------------------------------------------
// Phase 1 — branch-aware enumeration
// ---------------------------------------------------------------------------

fn enumerate_branches<S: Solver>(
    form: &Form,
    cls: &Classification,
    enc: &EncodedModel,
    solver: &mut S,
    options: &SynthOptions,
    pool: &mut ScenarioPool,
) {
    let mut assignment = vec![0i64; enc.vars.len()];
    let mut stop = false;
    descend(
        form, cls, enc, solver, options, pool, 0, &mut assignment, &mut stop,
    );
}

#[allow(clippy::too_many_arguments)]
fn descend<S: Solver>(
    form: &Form,
    cls: &Classification,
    enc: &EncodedModel,
    solver: &mut S,
    options: &SynthOptions,
    pool: &mut ScenarioPool,
    pos: usize,
    assignment: &mut Vec<i64>,
    stop: &mut bool,
) {
    if *stop {
        return;
    }

    if pos == cls.order.len() {
        accept_candidate(form, enc, solver, options, pool, assignment, stop);
        return;
    }

    let q_idx = cls.order[pos];
    let var = match enc.var_for(q_idx) {
        Some(v) => v,
        None => return,
    };

    // Later variables are still 0, which cannot influence this question:
    // its predicate only references strictly earlier ones.
    let currently_visible = visible_set(form, enc, assignment).contains(q_idx);

    if currently_visible {
        for value in 1..=enc.vars[var].domain_max() {
            assignment[var] = value;
            descend(
                form,
                cls,
                enc,
                solver,
                options,
                pool,
                pos + 1,
                assignment,
                stop,
            );
            if *stop {
                break;
            }
        }
        assignment[var] = 0;
    } else {
        assignment[var] = 0;
        descend(
            form,
            cls,
            enc,
            solver,
            options,
            pool,
            pos + 1,
            assignment,
            stop,
        );
    }
}

fn accept_candidate<S: Solver>(
    form: &Form,
    enc: &EncodedModel,
    solver: &mut S,
    options: &SynthOptions,
    pool: &mut ScenarioPool,
    assignment: &[i64],
    stop: &mut bool,
) {
    if pool.enumerated >= options.max_enumerated_scenarios {
        pool.truncated = true;
        *stop = true;
        return;
    }

    // Safety net: the evaluator should never produce an invalid candidate,
    // but the validity model is the authority.
    solver.push();
    for (var, &value) in assignment.iter().enumerate() {
        solver.assert(BoolExpr::Eq(var, value));
    }
    let result = solver.check();
    solver.pop();

    match result {
        SatResult::Sat => {
            pool.enumerated += 1;
            let visible = visible_set(form, enc, assignment);
            pool.covered.union_with(&visible);
            pool.scenarios.push(Scenario {
                assignment: assignment.to_vec(),
                visible,
                origin: ScenarioOrigin::Enumerated,
            });
        }
        SatResult::Unsat => {}
        SatResult::Unknown => {
            pool.partial = Some("solver deadline expired during branch enumeration".into());
            *stop = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Phase 2 — coverage inventory and reachability
// ---------------------------------------------------------------------------

fn inventory_coverage<S: Solver>(
    enc: &EncodedModel,
    solver: &mut S,
    pool: &mut ScenarioPool,
    question_count: usize,
) {
    // An earlier timeout carries over: no further queries, first reason wins.
    let mut deadline_hit = pool.partial.is_some();

    for q in 0..question_count {
        // A covering scenario is itself a reachability witness.
        if pool.covered.contains(q) {
            pool.reachable.insert(q);
            continue;
        }

        if enc.statically_dead.contains(&q) {
            pool.dead.insert(q);
            continue;
        }

        if deadline_hit {
            // Unknown reachability counts toward the target so the gap is
            // visible in the coverage summary.
            pool.reachable.insert(q);
            continue;
        }

        solver.push();
        solver.assert(enc.visibility[q].clone());
        let result = solver.check();
        solver.pop();

        match result {
            SatResult::Sat => {
                pool.reachable.insert(q);
            }
            SatResult::Unsat => {
                pool.dead.insert(q);
            }
            SatResult::Unknown => {
                pool.partial = Some("solver deadline expired during reachability check".into());
                pool.reachable.insert(q);
                deadline_hit = true;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Phase 3 — solver-driven gap fill
// ---------------------------------------------------------------------------

fn fill_gaps<S: Solver>(
    form: &Form,
    enc: &EncodedModel,
    solver: &mut S,
    pool: &mut ScenarioPool,
) {
    let mut gap = pool.uncovered();

    while !gap.is_empty() {
        solver.push();
        solver.assert(BoolExpr::or(
            gap.iter().map(|&q| enc.visibility[q].clone()).collect(),
        ));
        let result = solver.check();
        let model = solver.model();
        solver.pop();

        match result {
            SatResult::Sat => {
                let Some(mut assignment) = model else {
                    pool.partial = Some("solver reported sat without a model".into());
                    return;
                };
                assignment.truncate(enc.vars.len());

                let visible = visible_set(form, enc, &assignment);
                let before = gap.len();
                gap.retain(|&q| !visible.contains(q));

                if gap.len() == before {
                    // The disjunction guarantees progress; failing that means
                    // the model and the evaluator disagree.
                    pool.inconsistent.extend(gap.iter().copied());
                    return;
                }

                pool.covered.union_with(&visible);
                pool.synthesized += 1;
                pool.scenarios.push(Scenario {
                    assignment,
                    visible,
                    origin: ScenarioOrigin::Synthesized,
                });
            }
            SatResult::Unsat => {
                // Should not happen after the reachability filter.
                pool.inconsistent.extend(gap.iter().copied());
                return;
            }
            SatResult::Unknown => {
                pool.partial = Some("solver deadline expired during gap fill".into());
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Concrete visibility evaluation
// ---------------------------------------------------------------------------

/// Compute the set of visible questions under a total assignment.
///
/// Visibility is evaluated in form order: a conditional question is visible
/// only when its predicate holds and every question it references is itself
/// visible. This is the concrete mirror of the encoder's transitive
/// conjunction, and the authority for what a scenario reports.
pub fn visible_set(form: &Form, enc: &EncodedModel, assignment: &[i64]) -> FixedBitSet {
    let ids: HashMap<&str, usize> = form
        .questions
        .iter()
        .enumerate()
        .map(|(idx, q)| (q.id.as_str(), idx))
        .collect();

    let mut visible = FixedBitSet::with_capacity(form.questions.len());

    for (idx, q) in form.questions.iter().enumerate() {
        let is_visible = match &q.visible_when {
            None => true,
            Some(pred) => {
                eval_predicate(pred, &ids, enc, assignment)
                    && pred
                        .referenced_questions()
                        .iter()
                        .all(|r| ids.get(r).is_some_and(|&i| visible.contains(i)))
            }
        };
        if is_visible {
            visible.insert(idx);
        }
    }

    visible
}

fn leaf_var<'a>(
    question: &str,
    ids: &HashMap<&str, usize>,
    enc: &'a EncodedModel,
) -> Option<(VarId, &'a crate::encode::VarInfo)> {
    let idx = ids.get(question)?;
    let var = enc.var_for(*idx)?;
    Some((var, &enc.vars[var]))
}

fn eval_predicate(
    pred: &Predicate,
    ids: &HashMap<&str, usize>,
    enc: &EncodedModel,
    assignment: &[i64],
) -> bool {
    match pred {
        Predicate::Equals { question, choice } => leaf_var(question, ids, enc)
            .is_some_and(|(var, info)| {
                info.encode_choice(choice)
                    .is_some_and(|value| assignment[var] == value)
            }),

        Predicate::NotEquals { question, choice } => leaf_var(question, ids, enc)
            .is_some_and(|(var, info)| match info.encode_choice(choice) {
                Some(value) => assignment[var] != value,
                None => true,
            }),

        Predicate::InSet { question, choices } => leaf_var(question, ids, enc)
            .is_some_and(|(var, info)| {
                choices
                    .iter()
                    .filter_map(|c| info.encode_choice(c))
                    .any(|value| assignment[var] == value)
            }),

        Predicate::And(parts) => parts
            .iter()
            .all(|p| eval_predicate(p, ids, enc, assignment)),

        Predicate::Or(parts) => parts
            .iter()
            .any(|p| eval_predicate(p, ids, enc, assignment)),

        Predicate::Not(inner) => !eval_predicate(inner, ids, enc, assignment),
    }
}

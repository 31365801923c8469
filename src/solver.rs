//! Bounded-integer satisfiability
//!
//! The synthesis phases only need a narrow capability: declare bounded
//! integer variables, assert boolean expressions over them, push/pop
//! assertion scopes around speculative queries, check satisfiability, and
//! read a model back. [`Solver`] captures exactly that surface, so the
//! phase logic can be unit-tested against a scripted stand-in.
//!
//! [`BoundedSolver`] is the default implementation: complete backtracking
//! search over the declared domains with three-valued pruning of partial
//! assignments. Domains here are small (a handful of choices per question),
//! so exhaustive search with pruning is both sound and fast. Values are
//! tried in ascending order, which keeps every answer — and everything
//! derived from it — deterministic.

use crate::encode::{BoolExpr, VarId};
use std::time::Instant;

/// Outcome of a satisfiability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The deadline expired before the search finished
    Unknown,
}

/// The solver capability consumed by the synthesis phases
pub trait Solver {
    /// Declare an integer variable ranged over `lo..=hi`, returning its id
    fn declare(&mut self, lo: i64, hi: i64) -> VarId;

    /// Assert a boolean expression in the current scope
    fn assert(&mut self, expr: BoolExpr);

    /// Open an assertion scope
    fn push(&mut self);

    /// Discard every assertion made since the matching [`push`](Solver::push)
    fn pop(&mut self);

    /// Check satisfiability of all current assertions
    fn check(&mut self) -> SatResult;

    /// Model from the last successful check: one value per declared variable
    fn model(&self) -> Option<Vec<i64>>;
}

/// Backtracking solver over bounded integer domains
#[derive(Debug, Default)]
pub struct BoundedSolver {
    domains: Vec<(i64, i64)>,
    assertions: Vec<BoolExpr>,
    scopes: Vec<usize>,
    deadline: Option<Instant>,
    model: Option<Vec<i64>>,
}

/// How many search nodes to expand between deadline checks
const DEADLINE_STRIDE: u32 = 64;

impl BoundedSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort any check still running at `deadline` with [`SatResult::Unknown`]
    pub fn with_deadline(deadline: Option<Instant>) -> Self {
        Self {
            deadline,
            ..Self::default()
        }
    }

    /// Value of one variable in the last model
    pub fn value(&self, var: VarId) -> Option<i64> {
        self.model.as_ref().and_then(|m| m.get(var).copied())
    }

    fn search(
        &self,
        var: usize,
        assignment: &mut Vec<Option<i64>>,
        nodes: &mut u32,
    ) -> SatResult {
        if var == self.domains.len() {
            return SatResult::Sat;
        }

        let (lo, hi) = self.domains[var];
        for value in lo..=hi {
            *nodes += 1;
            if *nodes % DEADLINE_STRIDE == 0 {
                if let Some(deadline) = self.deadline {
                    if Instant::now() >= deadline {
                        return SatResult::Unknown;
                    }
                }
            }

            assignment[var] = Some(value);

            if self
                .assertions
                .iter()
                .any(|a| eval_partial(a, assignment) == Some(false))
            {
                continue;
            }

            match self.search(var + 1, assignment, nodes) {
                SatResult::Sat => return SatResult::Sat,
                SatResult::Unknown => return SatResult::Unknown,
                SatResult::Unsat => {}
            }
        }

        assignment[var] = None;
        SatResult::Unsat
    }
}

impl Solver for BoundedSolver {
    fn declare(&mut self, lo: i64, hi: i64) -> VarId {
        let id = self.domains.len();
        self.domains.push((lo, hi));
        id
    }

    fn assert(&mut self, expr: BoolExpr) {
        self.assertions.push(expr);
    }

    fn push(&mut self) {
        self.scopes.push(self.assertions.len());
    }

    fn pop(&mut self) {
        if let Some(mark) = self.scopes.pop() {
            self.assertions.truncate(mark);
        }
    }

    fn check(&mut self) -> SatResult {
        self.model = None;

        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return SatResult::Unknown;
            }
        }

        let mut assignment: Vec<Option<i64>> = vec![None; self.domains.len()];

        // Catches constant-false assertions up front; also the only place
        // assertions are evaluated when no variables are declared.
        if self
            .assertions
            .iter()
            .any(|a| eval_partial(a, &assignment) == Some(false))
        {
            return SatResult::Unsat;
        }

        let mut nodes = 0u32;
        let result = self.search(0, &mut assignment, &mut nodes);

        if result == SatResult::Sat {
            // Every variable is assigned at a Sat leaf.
            self.model = Some(assignment.iter().map(|v| v.unwrap_or(0)).collect());
        }
        result
    }

    fn model(&self) -> Option<Vec<i64>> {
        self.model.clone()
    }
}

/// Three-valued evaluation of an expression under a partial assignment.
///
/// `Some(b)` means the expression is already decided; `None` means it still
/// depends on unassigned variables. Conjunctions fail fast on a decided
/// false, disjunctions succeed fast on a decided true.
fn eval_partial(expr: &BoolExpr, assignment: &[Option<i64>]) -> Option<bool> {
    match expr {
        BoolExpr::Const(b) => Some(*b),
        BoolExpr::Eq(var, value) => assignment[*var].map(|v| v == *value),
        BoolExpr::Ne(var, value) => assignment[*var].map(|v| v != *value),
        BoolExpr::In(var, values) => assignment[*var].map(|v| values.contains(&v)),
        BoolExpr::And(parts) => {
            let mut decided = true;
            for p in parts {
                match eval_partial(p, assignment) {
                    Some(false) => return Some(false),
                    Some(true) => {}
                    None => decided = false,
                }
            }
            if decided {
                Some(true)
            } else {
                None
            }
        }
        BoolExpr::Or(parts) => {
            let mut decided = true;
            for p in parts {
                match eval_partial(p, assignment) {
                    Some(true) => return Some(true),
                    Some(false) => {}
                    None => decided = false,
                }
            }
            if decided {
                Some(false)
            } else {
                None
            }
        }
        BoolExpr::Not(inner) => eval_partial(inner, assignment).map(|b| !b),
    }
}

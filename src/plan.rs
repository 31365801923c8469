//! Test plan assembly — the four-stage pipeline
//!
//! `generate_plan` wires classification, encoding, synthesis and
//! minimization together and reports the result as structured data. The
//! engine never formats human-readable text; that is the CLI's job.
//!
//! Failure semantics: malformed input is an error carrying the offending
//! question; a solver deadline makes the plan [`PlanOutcome::Partial`], not
//! an error; a form with no test variables gets the trivial one-scenario
//! plan.

use crate::classify::classify;
use crate::cover::minimize;
use crate::encode::{encode, EncodedModel};
use crate::error::Result;
use crate::form::Form;
use crate::solver::{BoundedSolver, Solver};
use crate::synth::{synthesize, ScenarioOrigin, ScenarioPool, SynthOptions};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Tuning knobs for plan generation
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PlanOptions {
    /// Synthesis bounds
    #[serde(default)]
    pub synth: SynthOptions,

    /// Per-form time budget in milliseconds; unset means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_ms: Option<u64>,
}

/// Whether the plan covers everything it should
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum PlanOutcome {
    /// Every reachable question is covered
    Complete,
    /// Coverage stopped early; the reason says why
    Partial(String),
}

/// The generated test plan for one form
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Test Plan")]
pub struct TestPlan {
    pub form_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_name: Option<String>,

    pub outcome: PlanOutcome,

    pub summary: CoverageSummary,

    /// Test variables in topological order, with their answer options
    pub test_variables: Vec<TestVariableReport>,

    /// Selected scenarios in execution order
    pub scenarios: Vec<PlannedScenario>,

    /// Questions proven unreachable; design feedback, not required coverage
    pub dead_questions: Vec<DeadQuestion>,
}

/// Summary header of a plan
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverageSummary {
    pub total_questions: usize,
    pub reachable_questions: usize,
    pub covered_questions: usize,
    /// Covered as a percentage of reachable (100.0 when nothing is reachable)
    pub coverage_pct: f64,
    pub dead_questions: usize,
    pub test_variables: usize,

    /// Size of the synthesized pool the scenarios were selected from
    pub pool_size: usize,
    pub enumerated_scenarios: usize,
    pub synthesized_scenarios: usize,
    /// Branch enumeration hit its bound and was cut off
    pub enumeration_truncated: bool,

    /// Visible-question stats over the selected scenarios
    pub min_visible: usize,
    pub max_visible: usize,
    pub mean_visible: f64,
}

/// A test variable as presented to the tester
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestVariableReport {
    pub question: String,
    pub label: String,
    /// Choice identifiers in encoding order
    pub options: Vec<String>,
    /// Free-form variable whose domain was bounded by referenced values
    pub free_form: bool,
}

/// One scenario of the final plan
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedScenario {
    /// 1-based position in the plan
    pub number: usize,

    pub origin: ScenarioOrigin,

    /// Answer for every test variable, in topological order
    pub answers: Vec<ScenarioAnswer>,

    /// Identifiers of all visible questions, in form order
    pub visible_questions: Vec<String>,

    /// Questions this scenario covers that no earlier scenario did
    pub newly_covered: Vec<String>,
}

/// Answer assignment for one test variable
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioAnswer {
    pub question: String,
    pub label: String,
    pub answer: AnswerValue,
}

/// What the tester should enter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerValue {
    /// The question is not visible in this scenario; leave it alone
    NotAnswered,
    /// Pick this choice
    Choice { id: String, label: String },
    /// Free-form field: enter anything not matching a referenced value
    Other,
}

/// An unreachable question with the condition that can never hold
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeadQuestion {
    pub question: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Set when the gap-fill phase contradicted the reachability filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Generate a test plan with the default bounded solver.
pub fn generate_plan(form: &Form, options: &PlanOptions) -> Result<TestPlan> {
    let deadline = options
        .time_budget_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    let mut solver = BoundedSolver::with_deadline(deadline);
    generate_plan_with_solver(form, options, &mut solver)
}

/// Generate a test plan against a caller-supplied solver.
///
/// The solver must be empty; the engine declares variables and asserts the
/// validity model itself. This seam is what lets unit tests drive the
/// phases with a scripted solver.
pub fn generate_plan_with_solver<S: Solver>(
    form: &Form,
    options: &PlanOptions,
    solver: &mut S,
) -> Result<TestPlan> {
    form.validate()?;
    let cls = classify(form)?;

    if cls.test_variables.is_empty() {
        return Ok(trivial_plan(form));
    }

    let enc = encode(form, &cls)?;
    let pool = synthesize(form, &cls, &enc, solver, &options.synth);
    let selection = minimize(&pool);

    Ok(assemble(form, &enc, &pool, &selection.selected))
}

/// A form with no gating at all still gets one scenario: open the form,
/// every unconditional question is visible.
fn trivial_plan(form: &Form) -> TestPlan {
    // With zero test variables there are no predicates (every predicate
    // creates a test variable), so every question is visible.
    let visible: Vec<String> = form.questions.iter().map(|q| q.id.clone()).collect();
    let total = visible.len();

    TestPlan {
        form_id: form.id.clone(),
        form_name: form.name.clone(),
        outcome: PlanOutcome::Complete,
        summary: CoverageSummary {
            total_questions: total,
            reachable_questions: total,
            covered_questions: total,
            coverage_pct: 100.0,
            dead_questions: 0,
            test_variables: 0,
            pool_size: 1,
            enumerated_scenarios: 1,
            synthesized_scenarios: 0,
            enumeration_truncated: false,
            min_visible: total,
            max_visible: total,
            mean_visible: total as f64,
        },
        test_variables: Vec::new(),
        scenarios: vec![PlannedScenario {
            number: 1,
            origin: ScenarioOrigin::Enumerated,
            answers: Vec::new(),
            visible_questions: visible.clone(),
            newly_covered: visible,
        }],
        dead_questions: Vec::new(),
    }
}

fn assemble(
    form: &Form,
    enc: &EncodedModel,
    pool: &ScenarioPool,
    selected: &[usize],
) -> TestPlan {
    let test_variables: Vec<TestVariableReport> = enc
        .vars
        .iter()
        .map(|info| {
            let q = &form.questions[info.question];
            TestVariableReport {
                question: q.id.clone(),
                label: q.label.clone(),
                options: info.choice_values.clone(),
                free_form: info.other_value.is_some(),
            }
        })
        .collect();

    let mut newly = pool.reachable.clone();
    newly.clear();
    let mut scenarios = Vec::with_capacity(selected.len());

    for (pos, &idx) in selected.iter().enumerate() {
        let scenario = &pool.scenarios[idx];

        let answers: Vec<ScenarioAnswer> = enc
            .vars
            .iter()
            .enumerate()
            .map(|(var, info)| {
                let q = &form.questions[info.question];
                let value = scenario.assignment[var];
                let answer = if value == 0 {
                    AnswerValue::NotAnswered
                } else if info.is_other(value) {
                    AnswerValue::Other
                } else {
                    match info.decode(value) {
                        Some(choice_id) => {
                            let label = q
                                .domain
                                .choices()
                                .iter()
                                .find(|c| c.id == choice_id)
                                .map(|c| c.display_label().to_string())
                                .unwrap_or_else(|| choice_id.to_string());
                            AnswerValue::Choice {
                                id: choice_id.to_string(),
                                label,
                            }
                        }
                        None => AnswerValue::NotAnswered,
                    }
                };
                ScenarioAnswer {
                    question: q.id.clone(),
                    label: q.label.clone(),
                    answer,
                }
            })
            .collect();

        let visible_questions: Vec<String> = scenario
            .visible
            .ones()
            .map(|q| form.questions[q].id.clone())
            .collect();

        let newly_covered: Vec<String> = scenario
            .visible
            .ones()
            .filter(|&q| pool.reachable.contains(q) && !newly.contains(q))
            .map(|q| form.questions[q].id.clone())
            .collect();
        newly.union_with(&scenario.visible);

        scenarios.push(PlannedScenario {
            number: pos + 1,
            origin: scenario.origin,
            answers,
            visible_questions,
            newly_covered,
        });
    }

    let mut dead_questions: Vec<DeadQuestion> = pool
        .dead
        .iter()
        .map(|&q| DeadQuestion {
            question: form.questions[q].id.clone(),
            label: form.questions[q].label.clone(),
            condition: form.questions[q].visible_when.as_ref().map(|p| p.to_string()),
            note: None,
        })
        .collect();
    dead_questions.extend(pool.inconsistent.iter().map(|&q| DeadQuestion {
        question: form.questions[q].id.clone(),
        label: form.questions[q].label.clone(),
        condition: form.questions[q].visible_when.as_ref().map(|p| p.to_string()),
        note: Some("reachability check passed but no covering assignment was found".into()),
    }));

    let total = form.questions.len();
    let reachable = pool.reachable.count_ones(..);
    let covered_selected = scenarios
        .iter()
        .flat_map(|s| s.newly_covered.iter())
        .count();
    let coverage_pct = if reachable == 0 {
        100.0
    } else {
        covered_selected as f64 * 100.0 / reachable as f64
    };

    let visible_counts: Vec<usize> = scenarios.iter().map(|s| s.visible_questions.len()).collect();
    let min_visible = visible_counts.iter().copied().min().unwrap_or(0);
    let max_visible = visible_counts.iter().copied().max().unwrap_or(0);
    let mean_visible = if visible_counts.is_empty() {
        0.0
    } else {
        visible_counts.iter().sum::<usize>() as f64 / visible_counts.len() as f64
    };

    let outcome = match (&pool.partial, pool.inconsistent.is_empty()) {
        (Some(reason), _) => PlanOutcome::Partial(reason.clone()),
        (None, false) => PlanOutcome::Partial(
            "gap fill could not cover every question the reachability filter admitted".into(),
        ),
        (None, true) => {
            if covered_selected == reachable {
                PlanOutcome::Complete
            } else {
                PlanOutcome::Partial("scenario pool does not cover every reachable question".into())
            }
        }
    };

    TestPlan {
        form_id: form.id.clone(),
        form_name: form.name.clone(),
        outcome,
        summary: CoverageSummary {
            total_questions: total,
            reachable_questions: reachable,
            covered_questions: covered_selected,
            coverage_pct,
            dead_questions: dead_questions.len(),
            test_variables: enc.vars.len(),
            pool_size: pool.scenarios.len(),
            enumerated_scenarios: pool.enumerated,
            synthesized_scenarios: pool.synthesized,
            enumeration_truncated: pool.truncated,
            min_visible,
            max_visible,
            mean_visible,
        },
        test_variables,
        scenarios,
        dead_questions,
    }
}

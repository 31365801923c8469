// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # formcover — coverage-complete test plans for conditional forms
//!
//! A conditional form shows and hides questions based on answers given
//! earlier. Testing such a form by hand means finding a set of answer
//! combinations that makes every question appear at least once — without
//! enumerating the full cartesian product of all answers. formcover
//! synthesizes that set: a minimal *test plan* in which every reachable
//! question is visible in at least one *scenario*.
//!
//! ## Pipeline
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                                                                │
//! │  FORM (questions + visibility predicates)                      │
//! │       │                                                        │
//! │       ├──► classify(form) ──► dependency graphs, test vars     │
//! │       │                                                        │
//! │       ├──► encode(form, cls) ──► constraint model              │
//! │       │                                                        │
//! │       ├──► synthesize(...) ──► scenario pool (3 phases)        │
//! │       │                                                        │
//! │       └──► minimize(pool) ──► greedy set cover                 │
//! │                                                                │
//! │  generate_plan(form, options) runs all four stages             │
//! │                                                                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use formcover::{generate_plan, Form, PlanOptions};
//!
//! let form = Form::from_yaml(r#"
//!   id: onboarding
//!   questions:
//!     - id: account_type
//!       label: "Account type"
//!       domain:
//!         choices:
//!           - id: personal
//!           - id: business
//!     - id: company_name
//!       label: "Company name"
//!       visible_when:
//!         equals: { question: account_type, choice: business }
//! "#)?;
//!
//! let plan = generate_plan(&form, &PlanOptions::default())?;
//! for scenario in &plan.scenarios {
//!     println!("scenario {}: {} questions visible",
//!         scenario.number, scenario.visible_questions.len());
//! }
//! ```
//!
//! ## How scenarios are found
//!
//! Visibility predicates compose into chains: if A gates B and B gates C,
//! making C appear requires satisfying both gates at once. The synthesizer
//! handles this in three phases: branch-aware enumeration over the
//! dependency order (invisible variables collapse to "not answered", which
//! keeps the branching far below the full product), a coverage inventory
//! that asks a bounded-integer solver which uncovered questions are
//! reachable at all (the rest are reported *dead* — design feedback, not an
//! error), and a solver-driven gap fill that produces one witness scenario
//! per remaining gap. Greedy set cover then selects the final plan.
//!
//! The engine is single-threaded and synchronous within one form; forms are
//! independent, so callers parallelize across forms if they want to.

// Core data model and analysis
pub mod classify;
pub mod encode;
pub mod error;
pub mod form;

// Synthesis pipeline
pub mod cover;
pub mod plan;
pub mod solver;
pub mod synth;

// Reporting interface
pub mod report;

// Re-exports
pub use classify::{classify, reverse_dependency_map, Classification};
pub use cover::{greedy_cover, minimize, CoverSelection};
pub use encode::{encode, BoolExpr, EncodedModel, VarId, VarInfo};
pub use error::{Error, Result};
pub use form::{AnswerDomain, Choice, Form, Predicate, Question};
pub use plan::{
    generate_plan, generate_plan_with_solver, AnswerValue, CoverageSummary, DeadQuestion,
    PlanOptions, PlanOutcome, PlannedScenario, ScenarioAnswer, TestPlan, TestVariableReport,
};
pub use report::{
    classification_report, gating_index, question_index, ClassificationReport, GateOperator,
    GatingEdge, QuestionClass, QuestionIndexRow,
};
pub use solver::{BoundedSolver, SatResult, Solver};
pub use synth::{
    synthesize, visible_set, Scenario, ScenarioOrigin, ScenarioPool, SynthOptions,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

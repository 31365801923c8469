//! End-to-end plan generation against small literal forms

use formcover::{
    generate_plan, AnswerDomain, AnswerValue, Choice, Error, Form, PlanOptions, PlanOutcome,
    Predicate, Question, ScenarioOrigin,
};

fn choice_question(id: &str, choices: &[&str], visible_when: Option<Predicate>) -> Question {
    Question {
        id: id.into(),
        label: format!("Question {}", id),
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
        label: format!("Question {}", id),
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

fn form(questions: Vec<Question>) -> Form {
    Form {
        id: "fixture".into(),
        name: None,
        questions,
    }
}

#[test]
fn trivial_form_yields_one_scenario_covering_everything() {
    let f = form(vec![free_question("q1", None), free_question("q2", None)]);
    let plan = generate_plan(&f, &PlanOptions::default()).unwrap();

    assert_eq!(plan.outcome, PlanOutcome::Complete);
    assert_eq!(plan.scenarios.len(), 1);
    assert_eq!(plan.scenarios[0].visible_questions, vec!["q1", "q2"]);
    assert_eq!(plan.summary.covered_questions, 2);
    assert_eq!(plan.summary.reachable_questions, 2);
    assert_eq!(plan.summary.coverage_pct, 100.0);
}

#[test]
fn single_gate_covers_both_questions() {
    let f = form(vec![
        choice_question("q1", &["a", "b"], None),
        free_question("q2", Some(eq("q1", "a"))),
    ]);
    let plan = generate_plan(&f, &PlanOptions::default()).unwrap();

    assert_eq!(plan.outcome, PlanOutcome::Complete);
    // Both branches are enumerated into the pool; the gating branch alone
    // already shows every question, so the cover selects one scenario.
    assert_eq!(plan.summary.pool_size, 2);
    assert_eq!(plan.summary.covered_questions, 2);
    assert_eq!(plan.scenarios[0].visible_questions, vec!["q1", "q2"]);
    assert_eq!(
        plan.scenarios[0].answers[0].answer,
        AnswerValue::Choice {
            id: "a".into(),
            label: "a".into()
        }
    );
}

#[test]
fn chained_gates_collapse_invisible_variables() {
    let f = form(vec![
        choice_question("q1", &["a", "b"], None),
        choice_question("q2", &["x", "y"], Some(eq("q1", "a"))),
        free_question("q3", Some(eq("q2", "x"))),
    ]);
    let plan = generate_plan(&f, &PlanOptions::default()).unwrap();

    // Branches: (a,x) shows all, (a,y) hides q3, (b) collapses q2 to
    // unanswered. No cartesian product over the q1=b subtree.
    assert_eq!(plan.summary.pool_size, 3);
    assert_eq!(plan.outcome, PlanOutcome::Complete);
    assert_eq!(plan.summary.covered_questions, 3);

    // The deepest branch covers the whole chain by itself.
    assert_eq!(plan.scenarios.len(), 1);
    assert_eq!(plan.scenarios[0].visible_questions, vec!["q1", "q2", "q3"]);
}

#[test]
fn disjoint_gates_need_one_scenario_per_branch() {
    let f = form(vec![
        choice_question("q1", &["v1", "v2"], None),
        choice_question("q2", &["v1", "v2"], None),
        free_question(
            "q3",
            Some(Predicate::And(vec![eq("q1", "v2"), eq("q2", "v2")])),
        ),
        free_question(
            "q4",
            Some(Predicate::And(vec![eq("q1", "v2"), eq("q2", "v1")])),
        ),
    ]);
    let plan = generate_plan(&f, &PlanOptions::default()).unwrap();

    // Two gatekeepers, four enumerated combinations.
    assert_eq!(plan.summary.pool_size, 4);
    assert_eq!(plan.outcome, PlanOutcome::Complete);
    assert_eq!(plan.summary.covered_questions, 4);

    // q3 and q4 are mutually exclusive, so no single scenario suffices.
    assert_eq!(plan.scenarios.len(), 2);
    let covered: Vec<&str> = plan
        .scenarios
        .iter()
        .flat_map(|s| s.newly_covered.iter().map(String::as_str))
        .collect();
    assert!(covered.contains(&"q3"));
    assert!(covered.contains(&"q4"));
}

#[test]
fn impossible_gate_reports_dead_question() {
    let f = form(vec![
        choice_question("q1", &["v1", "v2"], None),
        free_question("q2", Some(eq("q1", "v3"))),
    ]);
    let plan = generate_plan(&f, &PlanOptions::default()).unwrap();

    assert_eq!(plan.outcome, PlanOutcome::Complete);
    assert_eq!(plan.dead_questions.len(), 1);
    assert_eq!(plan.dead_questions[0].question, "q2");
    assert_eq!(plan.dead_questions[0].condition.as_deref(), Some("q1 == v3"));
    // The coverage target shrinks to the reachable question.
    assert_eq!(plan.summary.reachable_questions, 1);
    assert_eq!(plan.scenarios.len(), 1);
    assert_eq!(plan.summary.coverage_pct, 100.0);
}

#[test]
fn deep_chain_closed_by_gap_fill_minimizes_to_one() {
    // Each level opens only on the *second* choice of its predecessor, so a
    // tiny enumeration bound cuts Phase 1 off before it reaches the deep
    // path and the gap-fill phase has to find it.
    let mut questions = vec![choice_question("q1", &["a", "b"], None)];
    for i in 2..=5 {
        questions.push(choice_question(
            &format!("q{}", i),
            &["a", "b"],
            Some(eq(&format!("q{}", i - 1), "b")),
        ));
    }
    questions.push(free_question("q6", Some(eq("q5", "b"))));
    let f = form(questions);

    let mut options = PlanOptions::default();
    options.synth.max_enumerated_scenarios = 2;
    let plan = generate_plan(&f, &options).unwrap();

    assert!(plan.summary.enumeration_truncated);
    assert!(plan.summary.synthesized_scenarios >= 1);
    assert_eq!(plan.outcome, PlanOutcome::Complete);
    assert_eq!(plan.summary.covered_questions, 6);

    // The all-"b" scenario shows the entire chain, so the plan is one case.
    assert_eq!(plan.scenarios.len(), 1);
    assert_eq!(plan.scenarios[0].origin, ScenarioOrigin::Synthesized);
    assert_eq!(plan.scenarios[0].visible_questions.len(), 6);
}

#[test]
fn deep_chain_without_bound_enumerates_fully() {
    let mut questions = vec![choice_question("q1", &["a", "b"], None)];
    for i in 2..=5 {
        questions.push(choice_question(
            &format!("q{}", i),
            &["a", "b"],
            Some(eq(&format!("q{}", i - 1), "a")),
        ));
    }
    questions.push(free_question("q6", Some(eq("q5", "a"))));
    let f = form(questions);

    let plan = generate_plan(&f, &PlanOptions::default()).unwrap();

    assert!(!plan.summary.enumeration_truncated);
    assert_eq!(plan.summary.synthesized_scenarios, 0);
    assert_eq!(plan.outcome, PlanOutcome::Complete);
    assert_eq!(plan.scenarios.len(), 1);
    assert_eq!(plan.scenarios[0].visible_questions.len(), 6);
}

#[test]
fn self_reference_is_rejected_before_synthesis() {
    let f = form(vec![choice_question("q1", &["a", "b"], Some(eq("q1", "a")))]);
    assert!(matches!(
        generate_plan(&f, &PlanOptions::default()),
        Err(Error::ForwardReference { question, .. }) if question == "q1"
    ));
}

#[test]
fn unknown_reference_is_rejected_with_offending_question() {
    let f = form(vec![
        choice_question("q1", &["a"], None),
        free_question("q2", Some(eq("missing", "a"))),
    ]);
    assert!(matches!(
        generate_plan(&f, &PlanOptions::default()),
        Err(Error::UnknownReference { question, referenced })
            if question == "q2" && referenced == "missing"
    ));
}

#[test]
fn duplicate_identifier_is_rejected() {
    let f = form(vec![free_question("q1", None), free_question("q1", None)]);
    assert!(matches!(
        generate_plan(&f, &PlanOptions::default()),
        Err(Error::DuplicateId { question }) if question == "q1"
    ));
}

#[test]
fn exhausted_time_budget_marks_plan_partial() {
    let f = form(vec![
        choice_question("q1", &["a", "b", "c", "d"], None),
        choice_question("q2", &["a", "b", "c", "d"], None),
        choice_question("q3", &["a", "b", "c", "d"], None),
        free_question(
            "q4",
            Some(Predicate::And(vec![
                eq("q1", "d"),
                eq("q2", "d"),
                eq("q3", "d"),
            ])),
        ),
    ]);

    let options = PlanOptions {
        time_budget_ms: Some(0),
        ..PlanOptions::default()
    };
    let plan = generate_plan(&f, &options).unwrap();

    assert!(matches!(plan.outcome, PlanOutcome::Partial(_)));
}

#[test]
fn disjunctive_predicate_covers_through_either_branch() {
    let f = form(vec![
        choice_question("q1", &["a", "b", "c"], None),
        free_question(
            "q2",
            Some(Predicate::Or(vec![eq("q1", "a"), eq("q1", "c")])),
        ),
    ]);
    let plan = generate_plan(&f, &PlanOptions::default()).unwrap();

    assert_eq!(plan.outcome, PlanOutcome::Complete);
    assert_eq!(plan.summary.pool_size, 3);
    assert_eq!(plan.scenarios.len(), 1);
}

#[test]
fn in_set_and_negation_predicates_round_trip() {
    let f = form(vec![
        choice_question("q1", &["a", "b", "c"], None),
        free_question(
            "q2",
            Some(Predicate::InSet {
                question: "q1".into(),
                choices: vec!["a".into(), "b".into()],
            }),
        ),
        free_question("q3", Some(Predicate::Not(Box::new(eq("q1", "a"))))),
    ]);
    let plan = generate_plan(&f, &PlanOptions::default()).unwrap();

    assert_eq!(plan.outcome, PlanOutcome::Complete);
    assert_eq!(plan.summary.covered_questions, 3);
    // q1=b shows both q2 (in-set) and q3 (negation) at once.
    assert_eq!(plan.scenarios.len(), 1);
    assert_eq!(
        plan.scenarios[0].answers[0].answer,
        AnswerValue::Choice {
            id: "b".into(),
            label: "b".into()
        }
    );
}

#[test]
fn free_form_gate_uses_referenced_literal_and_other_bucket() {
    let f = form(vec![
        free_question("service", None),
        free_question("q2", Some(eq("service", "database"))),
        free_question(
            "q3",
            Some(Predicate::Not(Box::new(eq("service", "database")))),
        ),
    ]);
    let plan = generate_plan(&f, &PlanOptions::default()).unwrap();

    assert_eq!(plan.outcome, PlanOutcome::Complete);
    assert_eq!(plan.summary.covered_questions, 3);
    assert!(plan.test_variables[0].free_form);

    // One scenario answers "database", another uses the other-bucket.
    let answers: Vec<&AnswerValue> = plan
        .scenarios
        .iter()
        .map(|s| &s.answers[0].answer)
        .collect();
    assert!(answers.iter().any(|a| matches!(
        a,
        AnswerValue::Choice { id, .. } if id == "database"
    )));
    assert!(answers.iter().any(|a| matches!(a, AnswerValue::Other)));
}

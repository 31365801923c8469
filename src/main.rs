//! formcover CLI - Command-line interface
//!
//! Commands:
//!   plan      - Generate a coverage-complete test plan for a form
//!   classify  - Show test variables, gatekeepers and data-collection questions
//!   index     - Write CSV indexes of gating relationships
//!   validate  - Check a form definition without generating a plan
//!   schema    - Print JSON schema for an output type

use formcover::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "plan" => cmd_plan(&args[2..]),
        "classify" => cmd_classify(&args[2..]),
        "index" => cmd_index(&args[2..]),
        "validate" => cmd_validate(&args[2..]),
        "schema" => cmd_schema(&args[2..]),
        "version" | "--version" | "-v" => {
            println!("formcover {}", VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            Err("Unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"
formcover - Coverage-complete test plans for conditional forms

USAGE:
    formcover <COMMAND> [OPTIONS]

COMMANDS:
    plan <form.yaml>                 Generate a test plan
    classify <form.yaml>             Show question classification
    index <form.yaml>                Write CSV indexes of gating relationships
    validate <form.yaml>             Check the form definition
    schema [name]                    Print JSON schema for an output type
                                     (test-plan, form, classification)
    version                          Print version

OPTIONS:
    --json                           JSON output (plan, classify, validate)
    --out <dir>                      Output directory (plan, index)
    --budget-ms <n>                  Per-form solver time budget
    --max-branch <n>                 Phase-1 enumeration bound

EXAMPLES:
    formcover plan onboarding.yaml
    formcover plan onboarding.json --json --budget-ms 5000
    formcover classify onboarding.yaml
    formcover index onboarding.yaml --out reports/
"#
    );
}

fn load_form(path: &str) -> Result<Form> {
    let content = fs::read_to_string(path)?;
    if Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    {
        Form::from_json(&content)
    } else {
        Form::from_yaml(&content)
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn plan_options(args: &[String]) -> Result<PlanOptions> {
    let mut options = PlanOptions::default();
    if let Some(ms) = flag_value(args, "--budget-ms") {
        options.time_budget_ms = Some(
            ms.parse()
                .map_err(|_| format!("invalid --budget-ms value: {}", ms))?,
        );
    }
    if let Some(max) = flag_value(args, "--max-branch") {
        options.synth.max_enumerated_scenarios = max
            .parse()
            .map_err(|_| format!("invalid --max-branch value: {}", max))?;
    }
    Ok(options)
}

fn cmd_plan(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Err("Usage: formcover plan <form.yaml> [--json] [--out <dir>]".into());
    }

    let form = load_form(&args[0])?;
    let options = plan_options(args)?;
    let plan = generate_plan(&form, &options)?;

    let rendered = if args.contains(&"--json".to_string()) {
        serde_json::to_string_pretty(&plan)?
    } else {
        render_plan_text(&plan)
    };

    match flag_value(args, "--out") {
        Some(dir) => {
            fs::create_dir_all(&dir)?;
            let ext = if args.contains(&"--json".to_string()) {
                "json"
            } else {
                "txt"
            };
            let file = PathBuf::from(dir).join(format!("{}_test_plan.{}", plan.form_id, ext));
            fs::write(&file, rendered)?;
            println!("Test plan saved to: {}", file.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

fn render_plan_text(plan: &TestPlan) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let rule = "=".repeat(100);
    let thin = "-".repeat(100);

    let name = plan.form_name.as_deref().unwrap_or(&plan.form_id);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "TEST PLAN - {}", name);
    let _ = writeln!(out, "Generated: {}", chrono::Local::now().format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out, "{}\n", rule);

    let s = &plan.summary;
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{}", thin);
    let _ = writeln!(out, "Test variables: {}", s.test_variables);
    let _ = writeln!(out, "Test cases: {}", plan.scenarios.len());
    let _ = writeln!(
        out,
        "Coverage: {}/{} reachable questions ({:.0}%)",
        s.covered_questions, s.reachable_questions, s.coverage_pct
    );
    if s.dead_questions > 0 {
        let _ = writeln!(
            out,
            "Unreachable questions (excluded from coverage): {}",
            s.dead_questions
        );
    }
    if !plan.scenarios.is_empty() {
        let _ = writeln!(out, "Min questions per case: {}", s.min_visible);
        let _ = writeln!(out, "Max questions per case: {}", s.max_visible);
        let _ = writeln!(out, "Avg questions per case: {:.1}", s.mean_visible);
    }
    if let PlanOutcome::Partial(reason) = &plan.outcome {
        let _ = writeln!(out, "PARTIAL COVERAGE: {}", reason);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "TEST VARIABLES (vary these to cover all paths)");
    let _ = writeln!(out, "{}\n", rule);
    for tv in &plan.test_variables {
        let _ = writeln!(out, "{}: {}", tv.question, tv.label);
        if !tv.options.is_empty() {
            let _ = writeln!(out, "  Options: {}", tv.options.join(", "));
        }
        if tv.free_form {
            let _ = writeln!(out, "  Free-form field; values above appear in conditions");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "TEST CASES");
    let _ = writeln!(out, "{}\n", rule);
    for scenario in &plan.scenarios {
        let _ = writeln!(out, "Test Case {}", scenario.number);
        let _ = writeln!(out, "{}", thin);
        let _ = writeln!(out, "ANSWERS (required - follow exactly):");
        for answer in &scenario.answers {
            let value = match &answer.answer {
                AnswerValue::NotAnswered => "[not answered - question hidden]".to_string(),
                AnswerValue::Choice { label, .. } => label.clone(),
                AnswerValue::Other => "[any value not used in conditions]".to_string(),
            };
            let _ = writeln!(out, "  {} ({}): {}", answer.question, answer.label, value);
        }
        let _ = writeln!(
            out,
            "\nVisible questions ({}): {}",
            scenario.visible_questions.len(),
            scenario.visible_questions.join(", ")
        );
        let _ = writeln!(
            out,
            "Newly covered: {}\n",
            scenario.newly_covered.join(", ")
        );
    }

    if !plan.dead_questions.is_empty() {
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "UNREACHABLE QUESTIONS (cannot be tested)");
        let _ = writeln!(out, "{}\n", rule);
        for dead in &plan.dead_questions {
            let _ = writeln!(out, "{}: {}", dead.question, dead.label);
            if let Some(condition) = &dead.condition {
                let _ = writeln!(out, "  Visibility condition: {}", condition);
            }
            if let Some(note) = &dead.note {
                let _ = writeln!(out, "  Note: {}", note);
            }
        }
    }

    out
}

fn cmd_classify(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Err("Usage: formcover classify <form.yaml> [--json]".into());
    }

    let form = load_form(&args[0])?;
    form.validate()?;
    let cls = classify(&form)?;
    let report = classification_report(&form, &cls);

    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Form: {}", report.form_id);
    println!("Total questions: {}", report.total_questions);
    println!(
        "Test variables ({}): {}",
        report.test_variables.len(),
        report.test_variables.join(", ")
    );
    println!(
        "Gatekeepers ({}): {}",
        report.gatekeepers.len(),
        report.gatekeepers.join(", ")
    );
    println!(
        "Data collection ({}): {}",
        report.data_collection.len(),
        report.data_collection.join(", ")
    );
    Ok(())
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn cmd_index(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Err("Usage: formcover index <form.yaml> [--out <dir>]".into());
    }

    let form = load_form(&args[0])?;
    form.validate()?;
    let cls = classify(&form)?;
    let out_dir = flag_value(args, "--out").unwrap_or_else(|| ".".into());
    fs::create_dir_all(&out_dir)?;

    let mut relationships = vec![csv_row(&[
        "Form_Id".into(),
        "Parent_Question".into(),
        "Parent_Label".into(),
        "Child_Question".into(),
        "Child_Label".into(),
        "Operator".into(),
        "Expected_Value".into(),
    ])];
    for edge in gating_index(&form) {
        relationships.push(csv_row(&[
            form.id.clone(),
            edge.parent,
            edge.parent_label,
            edge.child,
            edge.child_label,
            edge.operator.to_string(),
            edge.expected.join("; "),
        ]));
    }
    let rel_file = PathBuf::from(&out_dir).join(format!("{}_gating_relationships.csv", form.id));
    fs::write(&rel_file, relationships.join("\n") + "\n")?;
    println!("Gating relationships: {}", rel_file.display());

    let mut index = vec![csv_row(&[
        "Form_Id".into(),
        "Question".into(),
        "Label".into(),
        "Classification".into(),
        "Conditional".into(),
        "Gated_By_Count".into(),
        "Gated_By".into(),
        "Gates_Count".into(),
        "Gates".into(),
    ])];
    for row in question_index(&form, &cls) {
        let class = match row.classification {
            QuestionClass::TestVariable => "TEST_VAR",
            QuestionClass::DataCollection => "DATA_COL",
        };
        index.push(csv_row(&[
            form.id.clone(),
            row.question,
            row.label,
            class.into(),
            if row.conditional { "Yes" } else { "No" }.into(),
            row.gated_by.len().to_string(),
            row.gated_by.join(", "),
            row.gates.len().to_string(),
            row.gates.join(", "),
        ]));
    }
    let idx_file = PathBuf::from(&out_dir).join(format!("{}_question_index.csv", form.id));
    fs::write(&idx_file, index.join("\n") + "\n")?;
    println!("Question index: {}", idx_file.display());

    Ok(())
}

fn cmd_validate(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Err("Usage: formcover validate <form.yaml>".into());
    }

    let form = load_form(&args[0])?;
    form.validate()?;
    let cls = classify(&form)?;

    println!(
        "OK: {} ({} questions, {} test variables, hash {})",
        form.id,
        form.questions.len(),
        cls.test_variables.len(),
        form.hash()
    );
    Ok(())
}

fn cmd_schema(args: &[String]) -> Result<()> {
    let name = args.first().map(String::as_str).unwrap_or("test-plan");
    let schema = match name {
        "test-plan" => schemars::schema_for!(TestPlan),
        "form" => schemars::schema_for!(Form),
        "classification" => schemars::schema_for!(ClassificationReport),
        other => {
            return Err(format!(
                "Unknown schema '{}'. Available: test-plan, form, classification",
                other
            )
            .into())
        }
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

//! The `pathwise init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_once(Path::new("pathwise.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("courseware")?;
    write_once(Path::new("courseware/example.toml"), EXAMPLE_COURSEWARE)?;

    std::fs::create_dir_all("scripts")?;
    write_once(Path::new("scripts/example.toml"), EXAMPLE_SCRIPT)?;

    println!("\nNext steps:");
    println!("  1. Run: pathwise validate --courseware courseware/example.toml");
    println!(
        "  2. Run: pathwise simulate --courseware courseware/example.toml --script scripts/example.toml"
    );

    Ok(())
}

fn write_once(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# pathwise configuration

event_capacity = 256
progress_history = 50
output_dir = "./pathwise-results"
# default_deployment = "${PATHWISE_DEPLOYMENT}"
# log_filter = "pathwise=debug"
"#;

const EXAMPLE_COURSEWARE: &str = r#"[courseware]
id = "example"
name = "Fractions"
root = "course"

[[activities]]
key = "course"
name = "Fractions course"
pathways = ["lessons", "practice"]

[[pathways]]
key = "lessons"
type = "linear"
children = ["welcome", "check"]

[[pathways]]
key = "practice"
type = "bkt"
exit_after = 2
children = ["problem-1", "problem-2"]

[pathways.bkt]
p_l0 = 0.3
p_transit = 0.2
p_slip = 0.1
p_guess = 0.2
maintain_for = 2
proficiency_threshold = 0.9
competency = [{ document = "skills", item = "adding" }]

[[interactives]]
key = "welcome"
name = "Welcome"

[[interactives.scenarios]]
name = "seen"

[[interactives]]
key = "check"
name = "Warm-up check"

[[interactives.scenarios]]
name = "right"
correctness = "correct"
condition = { type = "equals", source = "answer", path = "/value", value = "3/4" }

[[interactives.scenarios.actions]]
type = "send-feedback"
text = "Correct!"

[[interactives.scenarios]]
name = "wrong"
correctness = "incorrect"

[[interactives.scenarios.actions]]
type = "change-progress"
progression = "interactive-repeat"

[[interactives]]
key = "problem-1"
name = "1/2 + 1/4"

[[interactives.scenarios]]
name = "solved"
correctness = "correct"
condition = { type = "equals", source = "answer", value = "3/4" }

[[interactives.scenarios]]
name = "missed"
correctness = "incorrect"

[[interactives]]
key = "problem-2"
name = "1/3 + 1/3"

[[interactives.scenarios]]
name = "solved"
correctness = "correct"
condition = { type = "equals", source = "answer", value = "2/3" }

[[interactives.scenarios]]
name = "missed"
correctness = "incorrect"

[[documents]]
key = "skills"
name = "Fraction skills"

[[documents.items]]
key = "fractions"

[[documents.items]]
key = "adding"
parents = ["fractions"]
"#;

const EXAMPLE_SCRIPT: &str = r#"# Submissions replayed in order by `pathwise simulate`.

[[submissions]]
interactive = "welcome"

[[submissions]]
interactive = "check"
scope = { answer = { value = "1/2" } }

[[submissions]]
interactive = "check"
scope = { answer = { value = "3/4" } }

[[submissions]]
interactive = "problem-1"
scope = { answer = "3/4" }

[[submissions]]
interactive = "problem-2"
scope = { answer = "2/3" }
"#;

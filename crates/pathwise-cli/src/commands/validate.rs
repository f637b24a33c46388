//! The `pathwise validate` command.

use std::path::PathBuf;

use anyhow::Result;

use pathwise_core::parser;

pub fn execute(courseware_path: PathBuf) -> Result<()> {
    let definitions = if courseware_path.is_dir() {
        parser::load_courseware_directory(&courseware_path)?
    } else {
        vec![parser::parse_courseware(&courseware_path)?]
    };
    anyhow::ensure!(
        !definitions.is_empty(),
        "no courseware definitions found in {}",
        courseware_path.display()
    );

    let mut total_warnings = 0;

    for definition in &definitions {
        println!(
            "Courseware: {} ({} activities, {} pathways, {} interactives)",
            definition.name,
            definition.activities.len(),
            definition.pathways.len(),
            definition.interactives.len()
        );

        let warnings = parser::validate_courseware(definition);
        for w in &warnings {
            let prefix = w
                .key
                .as_ref()
                .map(|key| format!("  [{key}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All courseware valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}

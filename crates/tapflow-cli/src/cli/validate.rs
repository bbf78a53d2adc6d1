//! Script validation (`tapflow validate`).
//!
//! Loads and flattens a script the same way `run` would, then reports the
//! plan shape instead of executing it.

use std::path::Path;

use anyhow::Result;
use console::style;

use tapflow_core::engine::flatten::flatten;
use tapflow_core::script::ScriptLoader;
use tapflow_types::config::AppConfig;

pub fn validate(config: &AppConfig, script: &Path, json: bool) -> Result<i32> {
    let loader = ScriptLoader::new(&config.run.scripts_dir, config.defaults.clone());

    let definition = match loader.load(script) {
        Ok(def) => def,
        Err(error) => return report_invalid(script, &error.to_string(), json),
    };
    let plan = match flatten(&definition.items) {
        Ok(plan) => plan,
        Err(error) => return report_invalid(script, &error.to_string(), json),
    };

    if json {
        let summary = serde_json::json!({
            "file": script,
            "name": definition.name,
            "valid": true,
            "steps": definition.step_count(),
            "loops": definition.loop_count(),
            "plan_units": plan.len(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!(
            "  {} {} is valid",
            style("✓").green(),
            style(script.display()).cyan()
        );
        println!();
        println!("  Workflow:   {}", definition.name);
        println!("  Steps:      {}", definition.step_count());
        println!("  Loops:      {}", definition.loop_count());
        println!("  Plan units: {}", plan.len());
        println!();
    }
    Ok(0)
}

fn report_invalid(script: &Path, error: &str, json: bool) -> Result<i32> {
    if json {
        let summary = serde_json::json!({
            "file": script,
            "valid": false,
            "error": error,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!("  {} {}: {}", style("✗").red(), script.display(), error);
        println!();
    }
    Ok(1)
}

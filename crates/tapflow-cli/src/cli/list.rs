//! Script listing (`tapflow list`).

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use tapflow_core::script::ScriptLoader;
use tapflow_types::config::AppConfig;

pub fn list_scripts(config: &AppConfig, json: bool) -> Result<i32> {
    let loader = ScriptLoader::new(&config.run.scripts_dir, config.defaults.clone());
    let entries = loader.discover()?;

    if json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| match loader.load(&entry.path) {
                Ok(def) => serde_json::json!({
                    "name": entry.name,
                    "file": entry.path,
                    "steps": def.step_count(),
                    "loops": def.loop_count(),
                }),
                Err(error) => serde_json::json!({
                    "name": entry.name,
                    "file": entry.path,
                    "error": error.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(0);
    }

    if entries.is_empty() {
        println!();
        println!(
            "  No scripts found under {}.",
            style(config.run.scripts_dir.display()).cyan()
        );
        println!();
        return Ok(0);
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("File"),
            Cell::new("Steps"),
            Cell::new("Loops"),
        ]);

    for entry in &entries {
        match loader.load(&entry.path) {
            Ok(def) => {
                table.add_row(vec![
                    Cell::new(&entry.name),
                    Cell::new(entry.path.display()),
                    Cell::new(def.step_count()),
                    Cell::new(def.loop_count()),
                ]);
            }
            Err(error) => {
                table.add_row(vec![
                    Cell::new(&entry.name),
                    Cell::new(entry.path.display()),
                    Cell::new(format!("invalid: {error}")).fg(Color::Red),
                    Cell::new("-"),
                ]);
            }
        }
    }

    println!("{table}");
    Ok(0)
}

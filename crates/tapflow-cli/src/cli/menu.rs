//! Interactive pickers for `tapflow run` with no script argument.

use anyhow::{Result, bail};
use dialoguer::Select;

use tapflow_core::script::ScriptEntry;
use tapflow_types::workflow::RunMode;

/// Pick one of the discovered scripts.
pub fn pick_script(entries: &[ScriptEntry]) -> Result<&ScriptEntry> {
    if entries.is_empty() {
        bail!("no scripts found; put .yaml files under the scripts directory");
    }
    let labels: Vec<String> = entries
        .iter()
        .map(|entry| format!("{} ({})", entry.name, entry.path.display()))
        .collect();
    let index = Select::new()
        .with_prompt("  Script")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(&entries[index])
}

/// Pick between a single pass and looping until stopped.
pub fn pick_mode() -> Result<RunMode> {
    let index = Select::new()
        .with_prompt("  Mode")
        .items(&["Run once", "Loop until stopped"])
        .default(0)
        .interact()?;
    Ok(if index == 0 { RunMode::Once } else { RunMode::Loop })
}

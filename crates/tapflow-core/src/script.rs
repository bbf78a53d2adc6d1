//! Script loading -- YAML workflow definitions from the scripts directory.
//!
//! A script file carries an optional display `name`, an optional
//! workflow-level `on_failure` policy, and a `steps` list. Each list item is
//! a step mapping, a `loop:` block (`iterations` or `until`, plus a nested
//! `steps` list), or an `include:` directive splicing another script in
//! place. Omitted step fields fall back to the installation's defaults
//! table.
//!
//! ```yaml
//! name: daily-harvest
//! steps:
//!   - name: open-chest
//!     find: chest.png
//!     action: tap
//!     threshold: 0.8
//!     roi: { x: 0, y: 400, width: 320, height: 240 }
//!   - include: common/login.yaml
//!   - loop:
//!       iterations: 3
//!       steps:
//!         - name: collect
//!           find: coin.png
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml_ng::Value;
use thiserror::Error;
use tracing::debug;

use tapflow_types::config::StepDefaults;
use tapflow_types::defaults::{
    ITERATION_DELAY_SECS, LOOP_BREAK_THRESHOLD, START_DELAY_SECS, VERIFY_ATTEMPTS,
    VERIFY_DELAY_SECS,
};
use tapflow_types::geometry::{Position, Region};
use tapflow_types::workflow::{
    ActionKind, FailurePolicy, LoopDefinition, LoopId, LoopKind, RetryPolicy, StepDefinition,
    VerifyPolicy, WorkflowDefinition, WorkflowItem,
};

/// Errors from loading or validating a script file.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml in {}: {source}", .path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("invalid script {}: {message}", .path.display())]
    InvalidFile { path: PathBuf, message: String },

    #[error("invalid script {}, item {item}: {message}", .path.display())]
    InvalidItem {
        path: PathBuf,
        item: usize,
        message: String,
    },

    #[error("include cycle detected at {}", .0.display())]
    IncludeCycle(PathBuf),
}

/// A script file found under the scripts directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    /// Path relative to the scripts directory.
    pub path: PathBuf,
    /// Display name: the file's `name:` key, or its stem.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Raw file schema
// ---------------------------------------------------------------------------

// The on-disk schema differs from the domain types: scripts say `find`/`roi`/
// `retries`, and omitted fields must stay distinguishable from explicit ones
// so the defaults table can fill them in. Items are kept as raw values and
// dispatched on their keys, which keeps include/loop/step errors precise.

#[derive(Debug, Deserialize)]
struct RawScript {
    name: Option<String>,
    on_failure: Option<FailurePolicy>,
    #[serde(default)]
    steps: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    name: String,
    find: String,
    #[serde(default, with = "serde_yaml_ng::with::singleton_map")]
    action: Option<ActionKind>,
    threshold: Option<f32>,
    roi: Option<Region>,
    offset: Option<Position>,
    retries: Option<u32>,
    retry_delay: Option<f64>,
    timeout: Option<f64>,
    start_delay: Option<f64>,
    end_delay: Option<f64>,
    verify: Option<RawVerify>,
    on_failure: Option<FailurePolicy>,
}

#[derive(Debug, Deserialize)]
struct RawVerify {
    attempts: Option<u32>,
    delay: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawLoop {
    iterations: Option<u32>,
    until: Option<RawUntil>,
    iteration_delay: Option<f64>,
    #[serde(default)]
    steps: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawUntil {
    find: String,
    threshold: Option<f32>,
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Loads and validates workflow scripts, resolving includes and defaults.
pub struct ScriptLoader {
    base_dir: PathBuf,
    defaults: StepDefaults,
}

/// Per-load bookkeeping: the next loop id to hand out and the include chain
/// currently being resolved (for cycle detection).
struct LoadState {
    next_loop: u32,
    stack: Vec<PathBuf>,
}

impl ScriptLoader {
    pub fn new(base_dir: impl Into<PathBuf>, defaults: StepDefaults) -> Self {
        Self {
            base_dir: base_dir.into(),
            defaults,
        }
    }

    /// Load one script (relative paths resolve against the scripts
    /// directory) into a validated workflow definition.
    pub fn load(&self, path: &Path) -> Result<WorkflowDefinition, ScriptError> {
        let file = self.resolve(path);
        let mut state = LoadState {
            next_loop: 0,
            stack: Vec::new(),
        };
        let raw = parse_script(&file)?;
        let name = raw.name.unwrap_or_else(|| file_stem(&file));
        let on_failure = raw.on_failure;
        let items = self.convert_guarded(&mut state, &raw.steps, &file)?;
        Ok(WorkflowDefinition {
            name,
            on_failure,
            items,
        })
    }

    /// List every `.yaml`/`.yml` under the scripts directory, recursively,
    /// sorted by path.
    pub fn discover(&self) -> Result<Vec<ScriptEntry>, ScriptError> {
        if !self.base_dir.is_dir() {
            return Err(ScriptError::NotFound(self.base_dir.clone()));
        }
        let mut entries = Vec::new();
        self.collect(&self.base_dir, &mut entries)?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn collect(&self, dir: &Path, entries: &mut Vec<ScriptEntry>) -> Result<(), ScriptError> {
        let listing = fs::read_dir(dir).map_err(|source| ScriptError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in listing {
            let entry = entry.map_err(|source| ScriptError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                self.collect(&path, entries)?;
            } else if is_script(&path) {
                let rel = path
                    .strip_prefix(&self.base_dir)
                    .unwrap_or(&path)
                    .to_path_buf();
                entries.push(ScriptEntry {
                    name: display_name(&path),
                    path: rel,
                });
            }
        }
        Ok(())
    }

    /// Load a file's items, guarding against include cycles.
    fn load_items(
        &self,
        state: &mut LoadState,
        file: &Path,
    ) -> Result<Vec<WorkflowItem>, ScriptError> {
        let raw = parse_script(file)?;
        self.convert_guarded(state, &raw.steps, file)
    }

    fn convert_guarded(
        &self,
        state: &mut LoadState,
        values: &[Value],
        file: &Path,
    ) -> Result<Vec<WorkflowItem>, ScriptError> {
        let canonical = file.canonicalize().map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ScriptError::NotFound(file.to_path_buf()),
            _ => ScriptError::Read {
                path: file.to_path_buf(),
                source,
            },
        })?;
        if state.stack.contains(&canonical) {
            return Err(ScriptError::IncludeCycle(file.to_path_buf()));
        }
        debug!(path = %file.display(), "loading script");
        state.stack.push(canonical);
        let items = self.convert_items(state, values, file);
        state.stack.pop();
        items
    }

    fn convert_items(
        &self,
        state: &mut LoadState,
        values: &[Value],
        file: &Path,
    ) -> Result<Vec<WorkflowItem>, ScriptError> {
        let mut items = Vec::new();
        for (idx, value) in values.iter().enumerate() {
            let item = idx + 1;
            if value.get("include").is_some() {
                let target = self.include_target(value, file, item)?;
                items.append(&mut self.load_items(state, &target)?);
            } else if let Some(block) = value.get("loop") {
                if block.is_null() {
                    return Err(invalid_item(
                        file,
                        item,
                        "loop definition is empty (check indentation)",
                    ));
                }
                let raw: RawLoop = serde_yaml_ng::from_value(block.clone())
                    .map_err(|e| invalid_item(file, item, e))?;
                items.push(WorkflowItem::Loop(
                    self.convert_loop(state, raw, file, item)?,
                ));
            } else {
                let raw: RawStep = serde_yaml_ng::from_value(value.clone())
                    .map_err(|e| invalid_item(file, item, e))?;
                items.push(WorkflowItem::Step(self.convert_step(raw, file, item)?));
            }
        }
        Ok(items)
    }

    fn include_target(
        &self,
        value: &Value,
        file: &Path,
        item: usize,
    ) -> Result<PathBuf, ScriptError> {
        let Some(rel) = value.get("include").and_then(Value::as_str) else {
            return Err(invalid_item(file, item, "include path must be a string"));
        };
        let rel = Path::new(rel);
        if rel.is_absolute() {
            Ok(rel.to_path_buf())
        } else {
            // Relative to the including file, so nested script libraries
            // can reference their own neighbours.
            let parent = file.parent().unwrap_or_else(|| Path::new("."));
            Ok(parent.join(rel))
        }
    }

    fn convert_loop(
        &self,
        state: &mut LoadState,
        raw: RawLoop,
        file: &Path,
        item: usize,
    ) -> Result<LoopDefinition, ScriptError> {
        // Ids are handed out in depth-first encounter order, parent first.
        let id = LoopId(state.next_loop);
        state.next_loop += 1;

        let kind = match (raw.iterations, raw.until) {
            (Some(_), Some(_)) => {
                return Err(invalid_item(
                    file,
                    item,
                    "loop accepts exactly one of `iterations` and `until`, got both",
                ));
            }
            (None, None) => {
                return Err(invalid_item(
                    file,
                    item,
                    "loop needs either `iterations` or `until`",
                ));
            }
            (Some(0), None) => {
                return Err(invalid_item(file, item, "loop iterations must be at least 1"));
            }
            (Some(n), None) => LoopKind::Counted { iterations: n },
            (None, Some(until)) => {
                let threshold = until.threshold.unwrap_or(LOOP_BREAK_THRESHOLD);
                check_threshold(threshold, file, item)?;
                LoopKind::Until {
                    template: until.find,
                    threshold,
                }
            }
        };

        check_delay(raw.iteration_delay, "iteration_delay", file, item)?;
        let body = self.convert_items(state, &raw.steps, file)?;
        Ok(LoopDefinition {
            id,
            kind,
            iteration_delay_secs: raw.iteration_delay.unwrap_or(ITERATION_DELAY_SECS),
            body,
        })
    }

    fn convert_step(
        &self,
        raw: RawStep,
        file: &Path,
        item: usize,
    ) -> Result<StepDefinition, ScriptError> {
        let threshold = raw.threshold.unwrap_or(self.defaults.threshold);
        check_threshold(threshold, file, item)?;

        let max_attempts = raw.retries.unwrap_or(self.defaults.retries);
        if max_attempts == 0 {
            return Err(invalid_item(file, item, "retries must be at least 1"));
        }

        check_delay(raw.retry_delay, "retry_delay", file, item)?;
        check_delay(raw.timeout, "timeout", file, item)?;
        check_delay(raw.start_delay, "start_delay", file, item)?;
        check_delay(raw.end_delay, "end_delay", file, item)?;
        if let Some(verify) = &raw.verify {
            check_delay(verify.delay, "verify delay", file, item)?;
        }

        Ok(StepDefinition {
            name: raw.name,
            template: raw.find,
            region: raw.roi,
            threshold,
            action: raw.action.unwrap_or_default(),
            offset: raw.offset,
            retry: RetryPolicy {
                max_attempts,
                retry_delay_secs: raw.retry_delay.unwrap_or(self.defaults.retry_delay),
                timeout_secs: raw.timeout,
            },
            start_delay_secs: raw.start_delay.unwrap_or(START_DELAY_SECS),
            end_delay_secs: raw.end_delay.unwrap_or(self.defaults.end_delay),
            verify: raw.verify.map(|v| VerifyPolicy {
                attempts: v.attempts.unwrap_or(VERIFY_ATTEMPTS),
                delay_secs: v.delay.unwrap_or(VERIFY_DELAY_SECS),
            }),
            on_failure: raw.on_failure,
        })
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn parse_script(file: &Path) -> Result<RawScript, ScriptError> {
    let text = fs::read_to_string(file).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ScriptError::NotFound(file.to_path_buf()),
        _ => ScriptError::Read {
            path: file.to_path_buf(),
            source,
        },
    })?;
    if text.trim().is_empty() {
        return Err(ScriptError::InvalidFile {
            path: file.to_path_buf(),
            message: "empty script file".to_string(),
        });
    }
    serde_yaml_ng::from_str(&text).map_err(|source| ScriptError::Syntax {
        path: file.to_path_buf(),
        source,
    })
}

fn is_script(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Display name for a script: its `name:` key when present and readable,
/// otherwise the file stem.
fn display_name(path: &Path) -> String {
    #[derive(Deserialize)]
    struct NameOnly {
        name: Option<String>,
    }

    fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_yaml_ng::from_str::<NameOnly>(&text).ok())
        .and_then(|only| only.name)
        .unwrap_or_else(|| file_stem(path))
}

fn invalid_item(file: &Path, item: usize, message: impl ToString) -> ScriptError {
    ScriptError::InvalidItem {
        path: file.to_path_buf(),
        item,
        message: message.to_string(),
    }
}

fn check_threshold(threshold: f32, file: &Path, item: usize) -> Result<(), ScriptError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(invalid_item(
            file,
            item,
            format!("threshold must be within 0.0..=1.0, got {threshold}"),
        ))
    }
}

fn check_delay(
    value: Option<f64>,
    field: &str,
    file: &Path,
    item: usize,
) -> Result<(), ScriptError> {
    match value {
        Some(v) if v < 0.0 => Err(invalid_item(
            file,
            item,
            format!("{field} must be non-negative, got {v}"),
        )),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_script(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    fn loader(dir: &TempDir) -> ScriptLoader {
        ScriptLoader::new(dir.path(), StepDefaults::default())
    }

    fn step_at(workflow: &WorkflowDefinition, index: usize) -> &StepDefinition {
        match &workflow.items[index] {
            WorkflowItem::Step(step) => step,
            other => panic!("expected step at {index}, got {other:?}"),
        }
    }

    fn loop_at(workflow: &WorkflowDefinition, index: usize) -> &LoopDefinition {
        match &workflow.items[index] {
            WorkflowItem::Loop(l) => l,
            other => panic!("expected loop at {index}, got {other:?}"),
        }
    }

    #[test]
    fn minimal_step_applies_defaults() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "basic.yaml",
            "steps:\n  - name: open\n    find: chest.png\n",
        );

        let workflow = loader(&dir).load(Path::new("basic.yaml")).unwrap();
        assert_eq!(workflow.name, "basic");
        let step = step_at(&workflow, 0);
        assert_eq!(step.template, "chest.png");
        assert_eq!(step.action, ActionKind::Tap);
        assert!((step.threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(step.retry.max_attempts, 10);
        assert!((step.retry.retry_delay_secs - 1.0).abs() < f64::EPSILON);
        assert_eq!(step.retry.timeout_secs, None);
        assert!((step.start_delay_secs - 0.0).abs() < f64::EPSILON);
        assert!((step.end_delay_secs - 1.0).abs() < f64::EPSILON);
        assert!(step.region.is_none());
        assert!(step.offset.is_none());
        assert!(step.verify.is_none());
        assert!(step.on_failure.is_none());
    }

    #[test]
    fn full_step_fields_parse() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "full.yaml",
            concat!(
                "name: full-run\n",
                "on_failure: restart_workflow\n",
                "steps:\n",
                "  - name: open\n",
                "    find: chest.png\n",
                "    action: long_press\n",
                "    threshold: 0.9\n",
                "    roi: { x: 10, y: 20, width: 100, height: 50 }\n",
                "    offset: { x: 4, y: -6 }\n",
                "    retries: 3\n",
                "    retry_delay: 0.5\n",
                "    timeout: 30\n",
                "    start_delay: 1.5\n",
                "    end_delay: 2\n",
                "    verify: { attempts: 5, delay: 0.25 }\n",
                "    on_failure: skip_step\n",
            ),
        );

        let workflow = loader(&dir).load(Path::new("full.yaml")).unwrap();
        assert_eq!(workflow.name, "full-run");
        assert_eq!(workflow.on_failure, Some(FailurePolicy::RestartWorkflow));
        let step = step_at(&workflow, 0);
        assert_eq!(step.action, ActionKind::LongPress);
        assert_eq!(step.region, Some(Region::new(10, 20, 100, 50).unwrap()));
        assert_eq!(step.offset, Some(Position::new(4, -6)));
        assert_eq!(step.retry.max_attempts, 3);
        assert_eq!(step.retry.timeout_secs, Some(30.0));
        let verify = step.verify.as_ref().unwrap();
        assert_eq!(verify.attempts, 5);
        assert!((verify.delay_secs - 0.25).abs() < f64::EPSILON);
        assert_eq!(step.on_failure, Some(FailurePolicy::SkipStep));
    }

    #[test]
    fn swipe_action_parses_with_parameters() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "swipe.yaml",
            concat!(
                "steps:\n",
                "  - name: scroll\n",
                "    find: list.png\n",
                "    action:\n",
                "      swipe: { dx: 0, dy: -300, duration_ms: 400 }\n",
            ),
        );

        let workflow = loader(&dir).load(Path::new("swipe.yaml")).unwrap();
        let step = step_at(&workflow, 0);
        assert_eq!(
            step.action,
            ActionKind::Swipe {
                dx: 0,
                dy: -300,
                duration_ms: 400
            }
        );
    }

    #[test]
    fn loops_get_sequential_ids_parent_first() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "nested.yaml",
            concat!(
                "steps:\n",
                "  - loop:\n",
                "      iterations: 2\n",
                "      steps:\n",
                "        - loop:\n",
                "            iterations: 3\n",
                "            steps:\n",
                "              - name: inner\n",
                "                find: a.png\n",
                "  - loop:\n",
                "      iterations: 4\n",
                "      steps:\n",
                "        - name: tail\n",
                "          find: b.png\n",
            ),
        );

        let workflow = loader(&dir).load(Path::new("nested.yaml")).unwrap();
        let outer = loop_at(&workflow, 0);
        assert_eq!(outer.id, LoopId(0));
        assert_eq!(outer.kind, LoopKind::Counted { iterations: 2 });
        let inner = match &outer.body[0] {
            WorkflowItem::Loop(l) => l,
            other => panic!("expected nested loop, got {other:?}"),
        };
        assert_eq!(inner.id, LoopId(1));
        assert_eq!(loop_at(&workflow, 1).id, LoopId(2));
    }

    #[test]
    fn until_loop_defaults_break_threshold() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "until.yaml",
            concat!(
                "steps:\n",
                "  - loop:\n",
                "      until: { find: done.png }\n",
                "      iteration_delay: 0.5\n",
                "      steps:\n",
                "        - name: grind\n",
                "          find: go.png\n",
            ),
        );

        let workflow = loader(&dir).load(Path::new("until.yaml")).unwrap();
        let l = loop_at(&workflow, 0);
        assert_eq!(
            l.kind,
            LoopKind::Until {
                template: "done.png".to_string(),
                threshold: 0.8
            }
        );
        assert!((l.iteration_delay_secs - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn loop_with_both_kinds_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "both.yaml",
            concat!(
                "steps:\n",
                "  - loop:\n",
                "      iterations: 2\n",
                "      until: { find: done.png }\n",
                "      steps:\n",
                "        - name: x\n",
                "          find: x.png\n",
            ),
        );

        let err = loader(&dir).load(Path::new("both.yaml")).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidItem { item: 1, .. }));
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn loop_without_kind_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "none.yaml",
            "steps:\n  - loop:\n      steps:\n        - name: x\n          find: x.png\n",
        );

        let err = loader(&dir).load(Path::new("none.yaml")).unwrap_err();
        assert!(err.to_string().contains("either"));
    }

    #[test]
    fn loop_with_zero_iterations_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "zero.yaml",
            "steps:\n  - loop:\n      iterations: 0\n      steps:\n        - name: x\n          find: x.png\n",
        );

        let err = loader(&dir).load(Path::new("zero.yaml")).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn include_splices_items_in_place() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "common/login.yaml",
            "steps:\n  - name: login\n    find: login.png\n",
        );
        write_script(
            dir.path(),
            "main.yaml",
            concat!(
                "steps:\n",
                "  - name: first\n",
                "    find: a.png\n",
                "  - include: common/login.yaml\n",
                "  - name: last\n",
                "    find: b.png\n",
            ),
        );

        let workflow = loader(&dir).load(Path::new("main.yaml")).unwrap();
        assert_eq!(workflow.items.len(), 3);
        assert_eq!(step_at(&workflow, 0).name, "first");
        assert_eq!(step_at(&workflow, 1).name, "login");
        assert_eq!(step_at(&workflow, 2).name, "last");
    }

    #[test]
    fn double_include_keeps_loop_ids_unique() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "lib.yaml",
            concat!(
                "steps:\n",
                "  - loop:\n",
                "      iterations: 2\n",
                "      steps:\n",
                "        - name: work\n",
                "          find: w.png\n",
            ),
        );
        write_script(
            dir.path(),
            "twice.yaml",
            "steps:\n  - include: lib.yaml\n  - include: lib.yaml\n",
        );

        let workflow = loader(&dir).load(Path::new("twice.yaml")).unwrap();
        assert_eq!(workflow.items.len(), 2);
        assert_eq!(loop_at(&workflow, 0).id, LoopId(0));
        assert_eq!(loop_at(&workflow, 1).id, LoopId(1));
    }

    #[test]
    fn include_cycle_is_detected() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "a.yaml", "steps:\n  - include: b.yaml\n");
        write_script(dir.path(), "b.yaml", "steps:\n  - include: a.yaml\n");

        let err = loader(&dir).load(Path::new("a.yaml")).unwrap_err();
        assert!(matches!(err, ScriptError::IncludeCycle(_)));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = loader(&dir).load(Path::new("nope.yaml")).unwrap_err();
        assert!(matches!(err, ScriptError::NotFound(_)));
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "empty.yaml", "\n");
        let err = loader(&dir).load(Path::new("empty.yaml")).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidFile { .. }));
    }

    #[test]
    fn invalid_item_reports_its_index() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "bad.yaml",
            concat!(
                "steps:\n",
                "  - name: fine\n",
                "    find: ok.png\n",
                "  - name: broken\n",
            ),
        );

        let err = loader(&dir).load(Path::new("bad.yaml")).unwrap_err();
        match err {
            ScriptError::InvalidItem { item, message, .. } => {
                assert_eq!(item, 2);
                assert!(message.contains("find"));
            }
            other => panic!("expected InvalidItem, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "thresh.yaml",
            "steps:\n  - name: x\n    find: x.png\n    threshold: 1.5\n",
        );

        let err = loader(&dir).load(Path::new("thresh.yaml")).unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn negative_delay_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "delay.yaml",
            "steps:\n  - name: x\n    find: x.png\n    retry_delay: -1\n",
        );

        let err = loader(&dir).load(Path::new("delay.yaml")).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn discover_lists_scripts_recursively_sorted() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "zeta.yaml", "name: named-zeta\nsteps: []\n");
        write_script(dir.path(), "common/login.yml", "steps: []\n");
        write_script(dir.path(), "alpha.yaml", "steps: []\n");
        write_script(dir.path(), "notes.txt", "not a script\n");

        let entries = loader(&dir).discover().unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("alpha.yaml"),
                PathBuf::from("common/login.yml"),
                PathBuf::from("zeta.yaml"),
            ]
        );
        assert_eq!(entries[0].name, "alpha");
        assert_eq!(entries[2].name, "named-zeta");
    }

    #[test]
    fn discover_missing_dir_is_not_found() {
        let dir = TempDir::new().unwrap();
        let loader = ScriptLoader::new(dir.path().join("absent"), StepDefaults::default());
        assert!(matches!(loader.discover(), Err(ScriptError::NotFound(_))));
    }

    #[test]
    fn config_defaults_override_fallbacks() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "basic.yaml",
            "steps:\n  - name: open\n    find: chest.png\n",
        );
        let defaults = StepDefaults {
            threshold: 0.55,
            retries: 4,
            retry_delay: 0.2,
            end_delay: 0.0,
        };

        let workflow = ScriptLoader::new(dir.path(), defaults)
            .load(Path::new("basic.yaml"))
            .unwrap();
        let step = step_at(&workflow, 0);
        assert!((step.threshold - 0.55).abs() < f32::EPSILON);
        assert_eq!(step.retry.max_attempts, 4);
        assert!((step.retry.retry_delay_secs - 0.2).abs() < f64::EPSILON);
        assert!((step.end_delay_secs - 0.0).abs() < f64::EPSILON);
    }
}

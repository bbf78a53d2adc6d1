//! Workflow execution (`tapflow run`).
//!
//! Loads and flattens the script, wires the capture/match/input backends
//! selected by the configuration, starts a run on the execution controller,
//! and renders progress events until the run ends. A `q` keypress or Ctrl+C
//! requests a cooperative stop.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, Result, bail};
use console::style;
use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tapflow_core::engine::context::ExecutionContext;
use tapflow_core::engine::controller::ExecutionController;
use tapflow_core::engine::flatten::flatten;
use tapflow_core::event::EventBus;
use tapflow_core::ports::{ActionBackend, FrameSource};
use tapflow_core::script::ScriptLoader;
use tapflow_infra::adb::AdbClient;
use tapflow_infra::capture::AdbFrameSource;
use tapflow_infra::debug::{DumpingSource, FrameDump};
use tapflow_infra::input::AdbInput;
use tapflow_infra::matcher::{NccMatcher, TemplateStore};
use tapflow_types::config::{AppConfig, CaptureBackend};
use tapflow_types::defaults::STOP_POLL_INTERVAL;
use tapflow_types::event::ProgressEvent;
use tapflow_types::workflow::{RecoveryAction, RunMode, RunState};

use super::{ModeArg, menu};

pub async fn run(
    config: &AppConfig,
    script: Option<&Path>,
    mode: Option<ModeArg>,
    debug: bool,
    json: bool,
) -> Result<i32> {
    let loader = ScriptLoader::new(&config.run.scripts_dir, config.defaults.clone());

    // Resolve the script and mode, interactively when no script was named.
    let (definition, mode) = match script {
        Some(path) => (
            loader.load(path)?,
            mode.map(RunMode::from).unwrap_or_default(),
        ),
        None => {
            let entries = loader.discover()?;
            let entry = menu::pick_script(&entries)?;
            let definition = loader.load(&entry.path)?;
            let mode = match mode {
                Some(arg) => arg.into(),
                None => menu::pick_mode()?,
            };
            (definition, mode)
        }
    };

    let plan = flatten(&definition.items)?;
    let (source, backend) = wire_backends(config, json).await?;
    let source = if debug {
        let dump = FrameDump::new(&config.run.debug_dir)
            .with_context(|| format!("creating {}", config.run.debug_dir.display()))?;
        Arc::new(DumpingSource::new(source, dump)) as Arc<dyn FrameSource>
    } else {
        source
    };
    let matcher = Arc::new(NccMatcher::new(Arc::new(TemplateStore::new(
        &config.run.templates_dir,
    ))));

    let events = EventBus::new();
    // Attach before starting so RunStarted is never missed.
    let mut stream = events.watch();

    let mut ctx = ExecutionContext::new(source, matcher, backend, events);
    ctx.target = config.target;
    ctx.loop_safety_cap = config.run.loop_safety_cap;
    ctx.cycle_delay_secs = config.run.cycle_delay;

    let controller = ExecutionController::new();
    controller.start(plan, mode, &definition, ctx.clone())?;
    debug!(run_id = %ctx.run_id, workflow = %definition.name, "run started");

    // Ctrl+C falls through as a signal when the terminal is not in raw
    // mode (JSON output, redirected stdout).
    let signal_cancel = ctx.cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let interactive = !json && console::Term::stdout().is_term();
    let raw = interactive && crossterm::terminal::enable_raw_mode().is_ok();
    let done = Arc::new(AtomicBool::new(false));
    let listener = raw.then(|| spawn_key_listener(ctx.cancellation.clone(), done.clone()));

    // Render events until the run reaches a terminal one.
    while let Some(event) = stream.next().await {
        if json {
            emit(raw, &serde_json::to_string(&event)?);
        } else if let Some(line) = describe(&event) {
            emit(raw, &line);
        }
        if event.is_terminal() {
            break;
        }
    }

    let state = controller.wait().await;
    done.store(true, Ordering::Relaxed);
    if let Some(handle) = listener {
        let _ = handle.join();
    }
    if raw {
        let _ = crossterm::terminal::disable_raw_mode();
    }

    if !json {
        println!();
        match state {
            RunState::Completed => println!("  {} Run completed.", style("✓").green()),
            RunState::Cancelled => println!("  {} Stopped.", style("■").yellow()),
            RunState::Failed => println!("  {} Run failed.", style("✗").red()),
            RunState::Idle | RunState::Running => {}
        }
        println!();
    }

    Ok(if state == RunState::Failed { 1 } else { 0 })
}

/// Build the frame source and action backend the configuration selects.
async fn wire_backends(
    config: &AppConfig,
    json: bool,
) -> Result<(Arc<dyn FrameSource>, Arc<dyn ActionBackend>)> {
    match config.capture.backend {
        CaptureBackend::Adb => {
            let client = AdbClient::new(config.adb.binary.clone(), config.adb.device.clone());
            check_device(&client, config.adb.device.as_deref(), json).await?;
            let source = Arc::new(AdbFrameSource::new(client.clone(), config.capture.scale));
            let backend = Arc::new(AdbInput::new(client));
            Ok((source, backend))
        }

        #[cfg(feature = "desktop")]
        CaptureBackend::Screen => {
            let source = Arc::new(tapflow_infra::capture::ScreenSource::new(
                config.capture.scale,
            ));
            let backend = Arc::new(tapflow_infra::input::MouseInput::new());
            Ok((source, backend))
        }

        #[cfg(feature = "desktop")]
        CaptureBackend::Window => {
            let title = config
                .capture
                .window_title
                .clone()
                .context("capture.backend = \"window\" requires capture.window_title")?;
            let source = Arc::new(tapflow_infra::capture::WindowSource::new(
                title,
                config.capture.scale,
            ));
            let backend = Arc::new(tapflow_infra::input::MouseInput::new());
            Ok((source, backend))
        }

        #[cfg(not(feature = "desktop"))]
        other => bail!("capture backend {other:?} requires a build with the desktop feature"),
    }
}

/// Verify the configured device is connected and authorized before a run
/// spends attempts failing to capture from it.
async fn check_device(client: &AdbClient, serial: Option<&str>, json: bool) -> Result<()> {
    let spinner = if json {
        None
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Checking device...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Some(spinner)
    };

    let devices = client.devices().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let devices = devices.context("listing adb devices")?;

    let found = match serial {
        Some(serial) => devices.iter().find(|d| d.serial == serial),
        None => devices.first(),
    };
    match found {
        Some(device) if device.state == "device" => Ok(()),
        Some(device) => bail!("device {} is {}", device.serial, device.state),
        None if serial.is_some() => {
            bail!("device {} is not connected", serial.unwrap_or_default())
        }
        None => bail!("no device connected"),
    }
}

/// Watch for stop keys while the terminal is in raw mode.
///
/// Raw mode swallows SIGINT, so Ctrl+C arrives here as a key event.
fn spawn_key_listener(
    cancel: CancellationToken,
    done: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !done.load(Ordering::Relaxed) && !cancel.is_cancelled() {
            match crossterm::event::poll(STOP_POLL_INTERVAL) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = crossterm::event::read() {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        let ctrl_c = key.code == KeyCode::Char('c')
                            && key.modifiers.contains(KeyModifiers::CONTROL);
                        if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) || ctrl_c {
                            cancel.cancel();
                        }
                    }
                }
                Ok(false) => {}
                Err(_) => break,
            }
        }
    })
}

/// Print one line, honoring raw-mode line endings.
fn emit(raw: bool, line: &str) {
    use std::io::Write as _;
    if raw {
        print!("{line}\r\n");
        let _ = std::io::stdout().flush();
    } else {
        println!("{line}");
    }
}

/// One styled console line per event, or `None` for events that only
/// matter to JSON consumers.
fn describe(event: &ProgressEvent) -> Option<String> {
    Some(match event {
        ProgressEvent::RunStarted {
            workflow,
            mode,
            total_units,
            ..
        } => format!(
            "  {} Running {} ({total_units} units, {mode} mode) {}",
            style("▶").bold(),
            style(workflow).cyan(),
            style("-- press q to stop").dim()
        ),
        ProgressEvent::StepStarted { name, .. } => {
            format!("  {} {}", style("»").dim(), style(name).dim())
        }
        ProgressEvent::StepRetrying {
            name,
            attempt,
            reason,
            ..
        } => format!(
            "  {} {name}: attempt {attempt} did not match ({reason})",
            style("↻").yellow()
        ),
        ProgressEvent::StepCompleted {
            name,
            attempts,
            position,
            confidence,
            ..
        } => {
            let tries = if *attempts > 1 {
                format!(" after {attempts} attempts")
            } else {
                String::new()
            };
            format!(
                "  {} {name} at ({}, {}), confidence {confidence:.2}{tries}",
                style("✓").green(),
                position.x,
                position.y
            )
        }
        ProgressEvent::StepFailed {
            name,
            attempts,
            reason,
            ..
        } => format!(
            "  {} {name} failed after {attempts} attempts: {reason}",
            style("✗").red()
        ),
        ProgressEvent::RecoveryApplied { action, .. } => {
            let action = match action {
                RecoveryAction::Abort => "aborting the run",
                RecoveryAction::SkipStep => "skipping the step",
                RecoveryAction::RestartNearestLoop => "restarting the enclosing loop",
                RecoveryAction::RestartWorkflow => "restarting the workflow",
            };
            format!("  {} {action}", style("⤷").yellow())
        }
        ProgressEvent::LoopIteration {
            loop_id, iteration, ..
        } => format!(
            "  {} {loop_id} iteration {iteration}",
            style("↺").dim()
        ),
        ProgressEvent::LoopExited {
            loop_id,
            iterations,
            ..
        } => format!(
            "  {} {loop_id} done after {iterations} iteration(s)",
            style("↺").dim()
        ),
        ProgressEvent::CycleCompleted { cycle, .. } => {
            format!("  {} cycle {cycle} completed", style("●").dim())
        }
        ProgressEvent::RunCompleted { .. }
        | ProgressEvent::RunFailed { .. }
        | ProgressEvent::RunCancelled { .. }
        | ProgressEvent::LoopEntered { .. } => return None,
    })
}

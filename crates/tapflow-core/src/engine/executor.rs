//! The workflow engine: a state machine interpreting a flattened plan.
//!
//! The engine walks the plan with an instruction pointer and an explicit
//! loop-state stack. Loop continuation and failure recovery are pointer
//! jumps, never recursive descent, so a run can be cancelled or recovered
//! between any two units. All engine state lives on the worker task that
//! calls [`WorkflowEngine::run`]; the cancellation token inside the context
//! is the only signal mutated from outside.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use tapflow_types::error::EngineError;
use tapflow_types::event::ProgressEvent;
use tapflow_types::matching::MatchResult;
use tapflow_types::workflow::{
    FailurePolicy, LoopId, LoopKind, RecoveryAction, RunMode, RunState, RunStatus,
    StepDefinition,
};

use super::context::ExecutionContext;
use super::flatten::{ExecutionPlan, PlanUnit};
use super::loop_state::LoopState;
use super::recovery;
use super::step::{StepOutcome, execute_step};

/// How an interpretation pass ended, internal to the engine.
enum RunEnd {
    Completed,
    Failed(String),
    Cancelled,
}

/// Interprets one flattened plan to completion on the calling task.
///
/// Created by the execution controller, consumed by `run`. Status snapshots
/// go out through the watch channel; progress events through the context's
/// bus. The final [`RunState`] is both returned and published.
pub struct WorkflowEngine {
    plan: ExecutionPlan,
    mode: RunMode,
    workflow: String,
    workflow_policy: Option<FailurePolicy>,
    ctx: ExecutionContext,
    status: watch::Sender<RunStatus>,
}

impl WorkflowEngine {
    pub fn new(
        plan: ExecutionPlan,
        mode: RunMode,
        workflow: String,
        workflow_policy: Option<FailurePolicy>,
        ctx: ExecutionContext,
        status: watch::Sender<RunStatus>,
    ) -> Self {
        Self {
            plan,
            mode,
            workflow,
            workflow_policy,
            ctx,
            status,
        }
    }

    /// Drive the plan to a terminal state.
    pub async fn run(self) -> RunState {
        info!(
            run_id = %self.ctx.run_id,
            workflow = %self.workflow,
            mode = %self.mode,
            units = self.plan.len(),
            "run started"
        );
        self.set_status(RunState::Running, Some(0));
        self.ctx.events.publish(ProgressEvent::RunStarted {
            run_id: self.ctx.run_id,
            workflow: self.workflow.clone(),
            mode: self.mode,
            total_units: self.plan.len(),
        });

        let end = self.interpret().await;

        let state = match end {
            RunEnd::Completed => {
                info!(run_id = %self.ctx.run_id, "run completed");
                self.ctx.events.publish(ProgressEvent::RunCompleted {
                    run_id: self.ctx.run_id,
                });
                RunState::Completed
            }
            RunEnd::Failed(error) => {
                warn!(run_id = %self.ctx.run_id, %error, "run failed");
                self.ctx.events.publish(ProgressEvent::RunFailed {
                    run_id: self.ctx.run_id,
                    error,
                });
                RunState::Failed
            }
            RunEnd::Cancelled => {
                info!(run_id = %self.ctx.run_id, "run cancelled");
                self.ctx.events.publish(ProgressEvent::RunCancelled {
                    run_id: self.ctx.run_id,
                });
                RunState::Cancelled
            }
        };
        self.set_status(state, None);
        state
    }

    fn set_status(&self, state: RunState, current_unit: Option<usize>) {
        // send_replace updates the snapshot even with no receiver attached.
        self.status.send_replace(RunStatus {
            state,
            current_unit,
        });
    }

    /// The interpretation loop: one instruction pointer, one loop stack.
    async fn interpret(&self) -> RunEnd {
        let mut pointer = 0usize;
        let mut stack: Vec<LoopState> = Vec::new();
        let mut cycle = 0u64;

        loop {
            if self.ctx.is_cancelled() {
                return RunEnd::Cancelled;
            }

            let Some(unit) = self.plan.unit(pointer) else {
                match self.mode {
                    RunMode::Once => return RunEnd::Completed,
                    RunMode::Loop => {
                        // The whole plan is the body of an implicit unbounded
                        // outer loop.
                        cycle += 1;
                        debug!(run_id = %self.ctx.run_id, cycle, "cycle completed");
                        self.ctx.events.publish(ProgressEvent::CycleCompleted {
                            run_id: self.ctx.run_id,
                            cycle,
                        });
                        if !self.ctx.sleep(self.ctx.cycle_delay()).await {
                            return RunEnd::Cancelled;
                        }
                        stack.clear();
                        pointer = 0;
                        continue;
                    }
                }
            };
            self.set_status(RunState::Running, Some(pointer));

            match unit {
                PlanUnit::Step(step) => {
                    match self.run_step(step, pointer, &mut stack).await {
                        StepResolution::Advance => pointer += 1,
                        StepResolution::Jump(target) => pointer = target,
                        StepResolution::End(end) => return end,
                    }
                }
                PlanUnit::LoopEnter(id) => {
                    stack.push(LoopState::new(*id));
                    self.ctx.events.publish(ProgressEvent::LoopEntered {
                        run_id: self.ctx.run_id,
                        unit: pointer,
                        loop_id: *id,
                    });
                    pointer += 1;
                }
                PlanUnit::LoopExit(id) => match self.close_iteration(*id, pointer, &mut stack).await {
                    LoopResolution::Repeat(target) => pointer = target,
                    LoopResolution::Done => pointer += 1,
                    LoopResolution::End(end) => return end,
                },
            }
        }
    }

    /// Execute the step at `pointer` and resolve its outcome, applying the
    /// recovery decision on failure.
    async fn run_step(
        &self,
        step: &StepDefinition,
        pointer: usize,
        stack: &mut Vec<LoopState>,
    ) -> StepResolution {
        match execute_step(step, &self.ctx, pointer).await {
            StepOutcome::Success { .. } => StepResolution::Advance,
            StepOutcome::Cancelled => StepResolution::End(RunEnd::Cancelled),
            StepOutcome::Failure { reason, attempts } => {
                if let Some(top) = stack.last_mut() {
                    top.record_failure();
                }
                let action = match recovery::decide(
                    step.on_failure,
                    self.workflow_policy,
                    stack.len(),
                ) {
                    Ok(action) => action,
                    Err(error) => return StepResolution::End(RunEnd::Failed(error.to_string())),
                };
                debug!(
                    run_id = %self.ctx.run_id,
                    step = %step.name,
                    attempts,
                    ?action,
                    "applying recovery"
                );
                self.ctx.events.publish(ProgressEvent::RecoveryApplied {
                    run_id: self.ctx.run_id,
                    unit: pointer,
                    action,
                });
                match action {
                    RecoveryAction::Abort => StepResolution::End(RunEnd::Failed(reason.to_string())),
                    RecoveryAction::SkipStep => StepResolution::Advance,
                    RecoveryAction::RestartNearestLoop => {
                        // decide() only returns this with a non-empty stack.
                        let Some(top) = stack.last_mut() else {
                            return StepResolution::End(RunEnd::Failed(
                                EngineError::Configuration(
                                    "restart_loop resolved with an empty loop stack".to_string(),
                                )
                                .to_string(),
                            ));
                        };
                        top.reset();
                        match self.plan.loop_info(top.loop_id) {
                            Some(info) => StepResolution::Jump(info.enter + 1),
                            None => StepResolution::End(RunEnd::Failed(
                                EngineError::Configuration(format!(
                                    "loop {} missing from the plan",
                                    top.loop_id
                                ))
                                .to_string(),
                            )),
                        }
                    }
                    RecoveryAction::RestartWorkflow => {
                        stack.clear();
                        StepResolution::Jump(0)
                    }
                }
            }
        }
    }

    /// Handle a `LoopExit` marker: record the finished iteration, then either
    /// jump back for another or fall through past the loop.
    async fn close_iteration(
        &self,
        id: LoopId,
        pointer: usize,
        stack: &mut Vec<LoopState>,
    ) -> LoopResolution {
        let Some(info) = self.plan.loop_info(id) else {
            return LoopResolution::End(RunEnd::Failed(
                EngineError::Configuration(format!("loop {id} missing from the plan")).to_string(),
            ));
        };
        // A well-nested plan always has the exiting loop on top; anything
        // else means the plan or the jump logic is corrupt.
        let Some(state) = stack.last_mut().filter(|top| top.loop_id == id) else {
            return LoopResolution::End(RunEnd::Failed(
                EngineError::Configuration(format!(
                    "loop exit {id} does not match the active loop stack"
                ))
                .to_string(),
            ));
        };
        state.advance();
        let completed = state.iteration;

        let more = match &info.kind {
            LoopKind::Counted { iterations } => state.wants_more(*iterations),
            LoopKind::Until {
                template,
                threshold,
            } => {
                if state.hit_safety_cap(self.ctx.loop_safety_cap) {
                    return LoopResolution::End(RunEnd::Failed(
                        EngineError::LoopSafetyLimitExceeded {
                            loop_id: id,
                            iterations: completed,
                        }
                        .to_string(),
                    ));
                }
                match self.probe_until(template, *threshold).await {
                    Probe::Found => false,
                    Probe::Absent => true,
                    Probe::Cancelled => return LoopResolution::End(RunEnd::Cancelled),
                }
            }
        };

        if more {
            self.ctx.events.publish(ProgressEvent::LoopIteration {
                run_id: self.ctx.run_id,
                loop_id: id,
                iteration: completed + 1,
            });
            if !self.ctx.sleep(info.iteration_delay()).await {
                return LoopResolution::End(RunEnd::Cancelled);
            }
            LoopResolution::Repeat(info.enter + 1)
        } else {
            debug!(run_id = %self.ctx.run_id, loop_id = %id, completed, "loop finished");
            self.ctx.events.publish(ProgressEvent::LoopExited {
                run_id: self.ctx.run_id,
                unit: pointer,
                loop_id: id,
                iterations: completed,
            });
            stack.pop();
            LoopResolution::Done
        }
    }

    /// One continuation probe for an `until` loop: does its template show in
    /// the current full frame? A probe that errors is treated as "not yet"
    /// rather than failing the run; the safety cap bounds how long that can
    /// go on.
    async fn probe_until(&self, template: &str, threshold: f32) -> Probe {
        if self.ctx.is_cancelled() {
            return Probe::Cancelled;
        }
        let frame = match self.ctx.source.capture(None).await {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, template, "until probe capture failed, continuing loop");
                return Probe::Absent;
            }
        };
        match self.ctx.matcher.find(&frame, template, threshold).await {
            Ok(result @ MatchResult::Found { .. }) if result.passes(threshold) => Probe::Found,
            Ok(_) => Probe::Absent,
            Err(error) => {
                warn!(%error, template, "until probe match failed, continuing loop");
                Probe::Absent
            }
        }
    }
}

enum Probe {
    Found,
    Absent,
    Cancelled,
}

enum StepResolution {
    Advance,
    Jump(usize),
    End(RunEnd),
}

enum LoopResolution {
    Repeat(usize),
    Done,
    End(RunEnd),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tapflow_types::workflow::WorkflowItem;

    use crate::engine::flatten::flatten;
    use crate::engine::testing::{
        MockBackend, MockMatcher, MockSource, counted_loop, found, no_match, quick_step,
        until_loop,
    };
    use crate::event::EventBus;

    struct Harness {
        matcher: Arc<MockMatcher>,
        backend: Arc<MockBackend>,
        ctx: ExecutionContext,
        status: watch::Sender<RunStatus>,
    }

    fn harness() -> Harness {
        let matcher = Arc::new(MockMatcher::new());
        let backend = Arc::new(MockBackend::new());
        let ctx = ExecutionContext::new(
            Arc::new(MockSource::blank(640, 480)),
            matcher.clone(),
            backend.clone(),
            EventBus::new(),
        );
        let (status, _) = watch::channel(RunStatus::idle());
        Harness {
            matcher,
            backend,
            ctx,
            status,
        }
    }

    fn engine_for(h: &Harness, items: &[WorkflowItem], mode: RunMode) -> WorkflowEngine {
        engine_with_policy(h, items, mode, None)
    }

    fn engine_with_policy(
        h: &Harness,
        items: &[WorkflowItem],
        mode: RunMode,
        workflow_policy: Option<FailurePolicy>,
    ) -> WorkflowEngine {
        WorkflowEngine::new(
            flatten(items).unwrap(),
            mode,
            "test".to_string(),
            workflow_policy,
            h.ctx.clone(),
            h.status.clone(),
        )
    }

    fn step_item(name: &str) -> WorkflowItem {
        WorkflowItem::Step(quick_step(name))
    }

    /// Names of the steps that performed actions, in execution order.
    fn acted_order(h: &Harness) -> usize {
        h.backend.performed().len()
    }

    #[tokio::test]
    async fn empty_plan_completes_immediately() {
        let h = harness();
        let engine = engine_for(&h, &[], RunMode::Once);
        assert_eq!(engine.run().await, RunState::Completed);
        assert_eq!(h.status.borrow().state, RunState::Completed);
    }

    #[tokio::test]
    async fn sequential_steps_complete_in_order() {
        let h = harness();
        h.matcher.always("a.png", found(1, 1, 0.9));
        h.matcher.always("b.png", found(2, 2, 0.9));
        let engine = engine_for(&h, &[step_item("a"), step_item("b")], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);
        assert_eq!(acted_order(&h), 2);
    }

    #[tokio::test]
    async fn counted_loop_runs_its_body_exactly_n_times() {
        let h = harness();
        h.matcher.always("b.png", found(2, 2, 0.9));
        let engine = engine_for(&h, &[counted_loop(0, 3, vec![step_item("b")])], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);
        assert_eq!(acted_order(&h), 3);
    }

    #[tokio::test]
    async fn single_iteration_loop_runs_once() {
        let h = harness();
        h.matcher.always("b.png", found(2, 2, 0.9));
        let engine = engine_for(&h, &[counted_loop(0, 1, vec![step_item("b")])], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);
        assert_eq!(acted_order(&h), 1);
    }

    #[tokio::test]
    async fn nested_counted_loops_multiply() {
        let h = harness();
        h.matcher.always("b.png", found(2, 2, 0.9));
        let inner = counted_loop(1, 3, vec![step_item("b")]);
        let engine = engine_for(&h, &[counted_loop(0, 2, vec![inner])], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);
        assert_eq!(acted_order(&h), 6);
    }

    #[tokio::test]
    async fn step_then_counted_loop_executes_a_b_b() {
        // Spec scenario: [A, Loop(2){B}], once -> order A,B,B, Completed.
        let h = harness();
        h.matcher.always("a.png", found(1, 1, 0.9));
        h.matcher.always("b.png", found(2, 2, 0.9));
        let engine = engine_for(
            &h,
            &[step_item("a"), counted_loop(0, 2, vec![step_item("b")])],
            RunMode::Once,
        );

        assert_eq!(engine.run().await, RunState::Completed);
        let templates: Vec<String> = h.matcher.calls().into_iter().map(|(t, _)| t).collect();
        assert_eq!(templates, vec!["a.png", "b.png", "b.png"]);
    }

    #[tokio::test]
    async fn default_policy_aborts_the_run() {
        // Spec scenario: [A max 2 attempts, never matches, Abort] -> Failed,
        // exactly 2 attempts.
        let h = harness();
        let mut a = quick_step("a");
        a.retry.max_attempts = 2;
        let engine = engine_for(&h, &[WorkflowItem::Step(a)], RunMode::Once);
        let mut rx = h.ctx.events.watch();

        assert_eq!(engine.run().await, RunState::Failed);

        let mut failed_attempts = None;
        for event in rx.drain() {
            if let ProgressEvent::StepFailed { attempts, .. } = event {
                failed_attempts = Some(attempts);
            }
        }
        assert_eq!(failed_attempts, Some(2));
    }

    #[tokio::test]
    async fn skip_step_policy_continues_the_run() {
        let h = harness();
        let mut a = quick_step("a");
        a.retry.max_attempts = 1;
        a.on_failure = Some(FailurePolicy::SkipStep);
        h.matcher.always("b.png", found(2, 2, 0.9));
        let engine = engine_for(&h, &[WorkflowItem::Step(a), step_item("b")], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);
        assert_eq!(acted_order(&h), 1); // only b acted
    }

    #[tokio::test]
    async fn workflow_policy_applies_when_the_step_has_none() {
        let h = harness();
        let mut a = quick_step("a");
        a.retry.max_attempts = 1;
        let engine = engine_with_policy(
            &h,
            &[WorkflowItem::Step(a)],
            RunMode::Once,
            Some(FailurePolicy::SkipStep),
        );

        assert_eq!(engine.run().await, RunState::Completed);
    }

    #[tokio::test]
    async fn restart_loop_jumps_back_to_the_loop_start() {
        let h = harness();
        // b succeeds, then c fails once with restart_loop, then both succeed.
        h.matcher.always("b.png", found(1, 1, 0.9));
        h.matcher.enqueue("c.png", no_match());
        h.matcher.always("c.png", found(2, 2, 0.9));

        let mut c = quick_step("c");
        c.retry.max_attempts = 1;
        c.on_failure = Some(FailurePolicy::RestartLoop);
        let engine = engine_for(
            &h,
            &[counted_loop(
                0,
                1,
                vec![step_item("b"), WorkflowItem::Step(c)],
            )],
            RunMode::Once,
        );

        assert_eq!(engine.run().await, RunState::Completed);
        // b acted twice (restart replays it), c once after its retry.
        let templates: Vec<String> = h.matcher.calls().into_iter().map(|(t, _)| t).collect();
        assert_eq!(templates, vec!["b.png", "c.png", "b.png", "c.png"]);
    }

    #[tokio::test]
    async fn restart_loop_outside_any_loop_fails_the_run() {
        let h = harness();
        let mut a = quick_step("a");
        a.retry.max_attempts = 1;
        a.on_failure = Some(FailurePolicy::RestartLoop);
        let engine = engine_for(&h, &[WorkflowItem::Step(a)], RunMode::Once);
        let mut rx = h.ctx.events.watch();

        assert_eq!(engine.run().await, RunState::Failed);

        let mut error = None;
        for event in rx.drain() {
            if let ProgressEvent::RunFailed { error: e, .. } = event {
                error = Some(e);
            }
        }
        assert!(error.unwrap().contains("restart_loop"));
    }

    #[tokio::test]
    async fn restart_workflow_replays_from_the_first_unit() {
        let h = harness();
        h.matcher.enqueue("a.png", found(1, 1, 0.9)); // first pass succeeds
        h.matcher.enqueue("b.png", no_match()); // b fails -> restart
        h.matcher.always("a.png", found(1, 1, 0.9));
        h.matcher.always("b.png", found(2, 2, 0.9));

        let mut b = quick_step("b");
        b.retry.max_attempts = 1;
        b.on_failure = Some(FailurePolicy::RestartWorkflow);
        let engine = engine_for(&h, &[step_item("a"), WorkflowItem::Step(b)], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);
        let templates: Vec<String> = h.matcher.calls().into_iter().map(|(t, _)| t).collect();
        assert_eq!(templates, vec!["a.png", "b.png", "a.png", "b.png"]);
    }

    #[tokio::test]
    async fn until_loop_stops_when_the_probe_finds_its_template() {
        let h = harness();
        h.matcher.always("b.png", found(1, 1, 0.9));
        // Probe misses twice, then the banner appears.
        h.matcher.enqueue("done.png", no_match());
        h.matcher.enqueue("done.png", no_match());
        h.matcher.enqueue("done.png", found(9, 9, 0.95));
        let engine = engine_for(&h, &[until_loop(0, "done.png", vec![step_item("b")])], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);
        assert_eq!(acted_order(&h), 3); // body ran once per probe miss + initial
    }

    #[tokio::test]
    async fn until_probe_below_threshold_continues_the_loop() {
        let h = harness();
        h.matcher.always("b.png", found(1, 1, 0.9));
        // until_loop's threshold is 0.8; 0.5 must not end the loop.
        h.matcher.enqueue("done.png", found(9, 9, 0.5));
        h.matcher.enqueue("done.png", found(9, 9, 0.95));
        let engine = engine_for(&h, &[until_loop(0, "done.png", vec![step_item("b")])], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);
        assert_eq!(acted_order(&h), 2);
    }

    #[tokio::test]
    async fn until_loop_trips_the_safety_cap() {
        let h = harness();
        h.matcher.always("b.png", found(1, 1, 0.9));
        // Probe never finds the banner.
        let mut ctx = h.ctx.clone();
        ctx.loop_safety_cap = 4;
        let engine = WorkflowEngine::new(
            flatten(&[until_loop(0, "done.png", vec![step_item("b")])]).unwrap(),
            RunMode::Once,
            "test".to_string(),
            None,
            ctx,
            h.status.clone(),
        );
        let mut rx = h.ctx.events.watch();

        assert_eq!(engine.run().await, RunState::Failed);
        assert_eq!(acted_order(&h), 4);

        let mut error = None;
        for event in rx.drain() {
            if let ProgressEvent::RunFailed { error: e, .. } = event {
                error = Some(e);
            }
        }
        assert!(error.unwrap().contains("safety limit"));
    }

    #[tokio::test]
    async fn until_probe_error_counts_as_continue() {
        let h = harness();
        h.matcher.always("b.png", found(1, 1, 0.9));
        // Probe 1 errors out, probe 2 ends the loop. The error must extend
        // the loop, not fail the run.
        h.matcher.enqueue(
            "done.png",
            Err(tapflow_types::error::StepFailure::TemplateUnavailable(
                "corrupt file".to_string(),
            )),
        );
        h.matcher.enqueue("done.png", found(9, 9, 0.95));
        let engine = engine_for(&h, &[until_loop(0, "done.png", vec![step_item("b")])], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);
        assert_eq!(acted_order(&h), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_mode_cycles_until_cancelled() {
        let h = harness();
        h.matcher.always("a.png", found(1, 1, 0.9));
        let mut ctx = h.ctx.clone();
        ctx.cycle_delay_secs = 1.0;
        let engine = WorkflowEngine::new(
            flatten(&[step_item("a")]).unwrap(),
            RunMode::Loop,
            "test".to_string(),
            None,
            ctx.clone(),
            h.status.clone(),
        );

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            canceller.cancel();
        });

        assert_eq!(engine.run().await, RunState::Cancelled);
        // Cycles at t=0,1,2,3; the t=3 cycle's delay is interrupted.
        assert_eq!(acted_order(&h), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_a_retry_sleep_cancels_the_run() {
        let h = harness();
        let mut a = quick_step("a");
        a.retry.retry_delay_secs = 30.0;
        let engine = engine_for(&h, &[WorkflowItem::Step(a)], RunMode::Once);

        let canceller = h.ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        assert_eq!(engine.run().await, RunState::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(h.status.borrow().state, RunState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn iteration_delay_paces_loop_repeats() {
        let h = harness();
        h.matcher.always("b.png", found(1, 1, 0.9));
        let item = match counted_loop(0, 3, vec![step_item("b")]) {
            WorkflowItem::Loop(mut def) => {
                def.iteration_delay_secs = 2.0;
                WorkflowItem::Loop(def)
            }
            other => other,
        };
        let engine = engine_for(&h, &[item], RunMode::Once);

        let started = tokio::time::Instant::now();
        assert_eq!(engine.run().await, RunState::Completed);
        // Two jump-backs, each preceded by one iteration delay.
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn run_events_bracket_the_interpretation() {
        let h = harness();
        h.matcher.always("a.png", found(1, 1, 0.9));
        let mut rx = h.ctx.events.watch();
        let engine = engine_for(&h, &[counted_loop(0, 2, vec![step_item("a")])], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);

        let events = rx.drain();
        assert!(matches!(events.first(), Some(ProgressEvent::RunStarted { total_units: 3, .. })));
        assert!(matches!(events.last(), Some(ProgressEvent::RunCompleted { .. })));
        assert!(events.iter().any(|e| matches!(e, ProgressEvent::LoopEntered { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::LoopIteration { iteration: 2, .. }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::LoopExited { iterations: 2, .. }
        )));
    }

    #[tokio::test]
    async fn status_tracks_the_current_unit_while_running() {
        let h = harness();
        h.matcher.always("a.png", found(1, 1, 0.9));
        let mut status_rx = h.status.subscribe();
        let engine = engine_for(&h, &[step_item("a"), step_item("a")], RunMode::Once);

        assert_eq!(engine.run().await, RunState::Completed);

        // The last snapshot is terminal with no current unit.
        let last = *status_rx.borrow_and_update();
        assert_eq!(last.state, RunState::Completed);
        assert_eq!(last.current_unit, None);
    }
}

//! Test doubles for the collaborator ports, shared by the engine tests.
//!
//! `MockMatcher` is scripted per template: tests enqueue the exact sequence
//! of results a template should yield, so retry counts and loop probes are
//! fully deterministic. `MockSource` serves uniform frames and `MockBackend`
//! records every action it is asked to perform.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tapflow_types::error::StepFailure;
use tapflow_types::frame::Frame;
use tapflow_types::geometry::{Calibration, Position, Region};
use tapflow_types::matching::MatchResult;
use tapflow_types::workflow::{
    ActionKind, LoopDefinition, LoopId, LoopKind, RetryPolicy, StepDefinition, WorkflowItem,
};

use crate::ports::{ActionBackend, FrameSource, TemplateMatcher};

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Frame source serving uniform gray frames, with optional scripted failures.
pub(crate) struct MockSource {
    width: u32,
    height: u32,
    calibration: Calibration,
    captures: AtomicUsize,
    failures: Mutex<VecDeque<StepFailure>>,
}

impl MockSource {
    pub(crate) fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calibration: Calibration::default(),
            captures: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// Queue a failure returned by the next capture, before any frame.
    pub(crate) fn push_failure(&self, failure: StepFailure) {
        self.failures.lock().unwrap().push_back(failure);
    }

    pub(crate) fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl FrameSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn capture<'a>(
        &'a self,
        region: Option<Region>,
    ) -> Pin<Box<dyn Future<Output = Result<Frame, StepFailure>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(failure) = self.failures.lock().unwrap().pop_front() {
                return Err(failure);
            }
            self.captures.fetch_add(1, Ordering::SeqCst);
            let frame = Frame::new(
                self.width,
                self.height,
                vec![0x80; (self.width * self.height) as usize],
            )
            .map_err(|e| StepFailure::CaptureUnavailable(e.to_string()))?;
            match region {
                Some(region) => frame
                    .crop(region)
                    .map_err(|e| StepFailure::CaptureUnavailable(e.to_string())),
                None => Ok(frame),
            }
        })
    }

    fn calibration(&self) -> Calibration {
        self.calibration
    }
}

// ---------------------------------------------------------------------------
// MockMatcher
// ---------------------------------------------------------------------------

type MatchOutcome = Result<MatchResult, StepFailure>;

/// Matcher scripted per template name.
///
/// `enqueue` results are consumed one per call; when a template's queue is
/// empty the sticky `always` result (or `NoMatch`) is returned.
pub(crate) struct MockMatcher {
    queued: Mutex<HashMap<String, VecDeque<MatchOutcome>>>,
    sticky: Mutex<HashMap<String, MatchOutcome>>,
    calls: Mutex<Vec<(String, f32)>>,
}

impl MockMatcher {
    pub(crate) fn new() -> Self {
        Self {
            queued: Mutex::new(HashMap::new()),
            sticky: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn enqueue(&self, template: &str, outcome: MatchOutcome) {
        self.queued
            .lock()
            .unwrap()
            .entry(template.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Fixed response once a template's queue is drained.
    pub(crate) fn always(&self, template: &str, outcome: MatchOutcome) {
        self.sticky
            .lock()
            .unwrap()
            .insert(template.to_string(), outcome);
    }

    /// Every `(template, threshold)` pair the engine asked for, in order.
    pub(crate) fn calls(&self) -> Vec<(String, f32)> {
        self.calls.lock().unwrap().clone()
    }
}

/// Shorthand for a qualifying match at a position.
pub(crate) fn found(x: i32, y: i32, confidence: f32) -> MatchOutcome {
    Ok(MatchResult::found(Position::new(x, y), confidence))
}

/// Shorthand for a miss.
pub(crate) fn no_match() -> MatchOutcome {
    Ok(MatchResult::NoMatch)
}

impl TemplateMatcher for MockMatcher {
    fn find<'a>(
        &'a self,
        _frame: &'a Frame,
        template: &'a str,
        threshold: f32,
    ) -> Pin<Box<dyn Future<Output = Result<MatchResult, StepFailure>> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((template.to_string(), threshold));
            if let Some(outcome) = self
                .queued
                .lock()
                .unwrap()
                .get_mut(template)
                .and_then(|queue| queue.pop_front())
            {
                return outcome;
            }
            match self.sticky.lock().unwrap().get(template) {
                Some(outcome) => outcome.clone(),
                None => Ok(MatchResult::NoMatch),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// MockBackend
// ---------------------------------------------------------------------------

/// Action backend that records what it was asked to do.
pub(crate) struct MockBackend {
    performed: Mutex<Vec<(ActionKind, Position)>>,
    prepares: AtomicUsize,
    failures: Mutex<VecDeque<StepFailure>>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            performed: Mutex::new(Vec::new()),
            prepares: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a failure returned by the next perform call.
    pub(crate) fn push_failure(&self, failure: StepFailure) {
        self.failures.lock().unwrap().push_back(failure);
    }

    pub(crate) fn performed(&self) -> Vec<(ActionKind, Position)> {
        self.performed.lock().unwrap().clone()
    }

    pub(crate) fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }
}

impl ActionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn prepare<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepFailure>> + Send + 'a>> {
        Box::pin(async move {
            self.prepares.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn perform<'a>(
        &'a self,
        action: &'a ActionKind,
        position: Position,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepFailure>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(failure) = self.failures.lock().unwrap().pop_front() {
                return Err(failure);
            }
            self.performed.lock().unwrap().push((*action, position));
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Definition builders & event draining
// ---------------------------------------------------------------------------

/// A step with zero delays and a short retry budget, for fast tests.
pub(crate) fn quick_step(name: &str) -> StepDefinition {
    StepDefinition {
        name: name.to_string(),
        template: format!("{name}.png"),
        region: None,
        threshold: 0.7,
        action: ActionKind::Tap,
        offset: None,
        retry: RetryPolicy {
            max_attempts: 3,
            retry_delay_secs: 0.0,
            timeout_secs: None,
        },
        start_delay_secs: 0.0,
        end_delay_secs: 0.0,
        verify: None,
        on_failure: None,
    }
}

pub(crate) fn counted_loop(id: u32, iterations: u32, body: Vec<WorkflowItem>) -> WorkflowItem {
    WorkflowItem::Loop(LoopDefinition {
        id: LoopId(id),
        kind: LoopKind::Counted { iterations },
        iteration_delay_secs: 0.0,
        body,
    })
}

pub(crate) fn until_loop(id: u32, template: &str, body: Vec<WorkflowItem>) -> WorkflowItem {
    WorkflowItem::Loop(LoopDefinition {
        id: LoopId(id),
        kind: LoopKind::Until {
            template: template.to_string(),
            threshold: 0.8,
        },
        iteration_delay_secs: 0.0,
        body,
    })
}

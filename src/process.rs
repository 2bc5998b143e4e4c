//! Step/unit execution for the generation run. A process is an ordered list
//! of named steps; the units of one step run concurrently, steps themselves
//! are strictly sequential. Results stream over a bounded channel in step
//! order; unit order within a step follows completion.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::debug;
use serde::Serialize;

use crate::errors::{Error, Result};

const RESULT_CHANNEL_SLOTS: usize = 512;

/// Cancellation token handed to every unit. Units are expected to check it
/// at coarse boundaries: before parsing, before emitting, before each type
/// walk.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Context {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Error out when the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::cancelled("abort"));
        }
        Ok(())
    }
}

pub type Unit = Box<dyn FnOnce(&Context) -> Result<String> + Send + Sync + 'static>;

struct Step {
    no: usize,
    name: String,
    units: Vec<Unit>,
}

/// One event on the result stream.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub step_no: usize,
    pub step_num: usize,
    pub step_name: String,
    pub unit_no: usize,
    pub unit_num: usize,
    pub data: Option<String>,
    pub error: Option<Error>,
}

impl ProcessResult {
    pub fn succeed(&self) -> bool {
        self.error.is_none()
    }

    pub fn aborted(&self) -> bool {
        self.error.as_ref().is_some_and(Error::is_cancelled)
    }
}

impl fmt::Display for ProcessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &self.error {
            None => "√".to_string(),
            Some(err) if err.is_cancelled() => "aborted".to_string(),
            Some(err) => format!("x {err}"),
        };
        write!(
            f,
            "[{}/{}] {} [{}/{}] {}",
            self.step_no, self.step_num, self.step_name, self.unit_no, self.unit_num, status
        )
    }
}

#[derive(Default)]
pub struct Process {
    steps: Vec<Step>,
    units: usize,
    context: Context,
    closed: Option<Receiver<()>>,
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("steps", &self.steps.len())
            .field("units", &self.units)
            .field("context", &self.context)
            .finish()
    }
}

impl Process {
    pub fn new() -> Self {
        Process {
            steps: Vec::new(),
            units: 0,
            context: Context::new(),
            closed: None,
        }
    }

    pub fn add(&mut self, name: impl Into<String>, units: Vec<Unit>) {
        self.units += units.len();
        self.steps.push(Step {
            no: self.steps.len() + 1,
            name: name.into(),
            units,
        });
    }

    pub fn steps(&self) -> usize {
        self.steps.len()
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn context(&self) -> Context {
        self.context.clone()
    }

    /// Launch the driver thread and hand back the result stream. The stream
    /// closes once every step has reported or the run was aborted.
    pub fn start(&mut self) -> Receiver<ProcessResult> {
        let (result_tx, result_rx) = bounded::<ProcessResult>(RESULT_CHANNEL_SLOTS);
        let (closed_tx, closed_rx) = bounded::<()>(1);
        self.closed = Some(closed_rx);
        let steps = std::mem::take(&mut self.steps);
        let step_num = steps.len();
        let context = self.context.clone();
        thread::spawn(move || {
            drive(steps, step_num, context, result_tx);
            drop(closed_tx);
        });
        result_rx
    }

    /// Fire the cancellation token, then wait up to `timeout` for in-flight
    /// units to return.
    pub fn abort(&self, timeout: Duration) -> Result<()> {
        self.context.cancel();
        let Some(closed) = &self.closed else {
            return Ok(());
        };
        match closed.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(Error::cancelled("abort timeout")),
        }
    }
}

fn drive(steps: Vec<Step>, step_num: usize, context: Context, results: Sender<ProcessResult>) {
    for step in steps {
        debug!("process step '{}' begins", step.name);
        let unit_num = step.units.len();
        let (done_tx, done_rx) = bounded::<Result<String>>(unit_num.max(1));
        let mut spawned = 0usize;
        for unit in step.units {
            if context.is_cancelled() {
                // not started at all, report straight away
                let _ = done_tx.send(Err(Error::cancelled("abort")));
                spawned += 1;
                continue;
            }
            let unit_context = context.clone();
            let unit_done = done_tx.clone();
            thread::spawn(move || {
                let outcome = unit(&unit_context);
                let _ = unit_done.send(outcome);
            });
            spawned += 1;
        }
        drop(done_tx);
        for unit_no in 1..=spawned {
            let outcome = match done_rx.recv() {
                Ok(outcome) => outcome,
                Err(_) => break,
            };
            let result = match outcome {
                Ok(data) => ProcessResult {
                    step_no: step.no,
                    step_num,
                    step_name: step.name.clone(),
                    unit_no,
                    unit_num,
                    data: Some(data),
                    error: None,
                },
                Err(err) => ProcessResult {
                    step_no: step.no,
                    step_num,
                    step_name: step.name.clone(),
                    unit_no,
                    unit_num,
                    data: None,
                    error: Some(err),
                },
            };
            if results.send(result).is_err() {
                return;
            }
        }
        if context.is_cancelled() {
            // later steps never start once the token fired
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(no: usize) -> Unit {
        Box::new(move |ctx: &Context| {
            ctx.check()?;
            if no % 2 == 1 {
                return Err(Error::internal("failed"));
            }
            thread::sleep(Duration::from_millis(20));
            Ok(format!("unit {no} done"))
        })
    }

    #[test]
    fn runs_steps_in_order_and_reports_every_unit() {
        let mut process = Process::new();
        process.add("first", vec![unit(0), unit(2), unit(1)]);
        process.add("second", vec![unit(4)]);
        assert_eq!(process.steps(), 2);
        assert_eq!(process.units(), 4);
        let results: Vec<ProcessResult> = process.start().iter().collect();
        assert_eq!(results.len(), 4);
        // strict step ordering
        let step_nos: Vec<usize> = results.iter().map(|r| r.step_no).collect();
        let mut sorted = step_nos.clone();
        sorted.sort_unstable();
        assert_eq!(step_nos, sorted);
        assert_eq!(results.iter().filter(|r| !r.succeed()).count(), 1);
        assert!(results.last().unwrap().succeed());
    }

    #[test]
    fn unit_errors_do_not_stop_later_steps() {
        let mut process = Process::new();
        process.add("first", vec![unit(1)]);
        process.add("second", vec![unit(2)]);
        let results: Vec<ProcessResult> = process.start().iter().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].step_name, "second");
        assert!(results[1].succeed());
    }

    #[test]
    fn abort_stops_following_steps_within_timeout() {
        let mut process = Process::new();
        let slow: Vec<Unit> = (0..4)
            .map(|_| {
                Box::new(move |ctx: &Context| {
                    for _ in 0..50 {
                        ctx.check()?;
                        thread::sleep(Duration::from_millis(10));
                    }
                    Ok("slept".to_string())
                }) as Unit
            })
            .collect();
        process.add("services: parsing", slow);
        process.add("services: writing", vec![unit(0)]);
        let results = process.start();
        thread::sleep(Duration::from_millis(30));
        process.abort(Duration::from_secs(2)).unwrap();
        let collected: Vec<ProcessResult> = results.iter().collect();
        assert!(!collected.is_empty());
        assert!(collected.iter().all(|r| r.step_name == "services: parsing"));
        assert!(collected.iter().any(ProcessResult::aborted));
    }

    #[test]
    fn result_renders_status_glyphs() {
        let ok = ProcessResult {
            step_no: 1,
            step_num: 3,
            step_name: "services: parsing".to_string(),
            unit_no: 2,
            unit_num: 10,
            data: Some("done".to_string()),
            error: None,
        };
        assert_eq!(ok.to_string(), "[1/3] services: parsing [2/10] √");
        let aborted = ProcessResult {
            error: Some(Error::cancelled("abort")),
            ..ok.clone()
        };
        assert_eq!(aborted.to_string(), "[1/3] services: parsing [2/10] aborted");
    }
}

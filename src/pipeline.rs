//! Step-by-step execution of a declared operation sequence.
//!
//! The executor threads a `(raster, results)` pair through the steps:
//!
//! ```text
//! for each step:
//!     lookup name     --unknown-->  Skipped diagnostic, raster unchanged
//!     validate params --invalid-->  Invalid diagnostic, raster unchanged
//!     apply           --error---->  Failed diagnostic,  raster unchanged
//!     ok: replace raster if the handler returned one, record attributes
//! ```
//!
//! No step-local problem ever stops the sequence; every step yields exactly one
//! [`StepResult`]. Conditions that do stop a job (the source cannot be read,
//! the result cannot be written) live outside the executor, in
//! [`crate::job`]. A caller that holds a [`Pipeline`] while doing that I/O
//! marks it [`PipelineState::Aborted`] when it gives up before completion.

use crate::ops::{self, Attributes, ExecEnv, ParamError, Params, StepError, Value};
use crate::raster::Raster;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// A named operation with its raw parameters, as declared in a request.
///
/// Deserializes from either `{"name": "rotate", "params": {...}}` or the
/// pair form `["rotate", {...}]`. Missing params mean an empty mapping.
/// Params that are present but not an object (`null`, an array) are kept as
/// a validation error and reported when the step runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawStep")]
pub struct StepSpec {
    pub name: String,
    pub params: Params,
    malformed: Option<ParamError>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStep {
    Object {
        name: String,
        #[serde(default = "empty_params")]
        params: Value,
    },
    Pair(String, Value),
    Bare(String),
}

fn empty_params() -> Value {
    Value::Map(BTreeMap::new())
}

impl From<RawStep> for StepSpec {
    fn from(raw: RawStep) -> Self {
        let (name, params) = match raw {
            RawStep::Object { name, params } | RawStep::Pair(name, params) => (name, params),
            RawStep::Bare(name) => return StepSpec::new(name),
        };
        match Params::try_from(params) {
            Ok(params) => StepSpec {
                name,
                params,
                malformed: None,
            },
            Err(e) => StepSpec {
                name,
                params: Params::new(),
                malformed: Some(e),
            },
        }
    }
}

impl StepSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
            malformed: None,
        }
    }

    /// The parameter mapping, or the reason the declared params were unusable.
    pub fn checked_params(&self) -> Result<&Params, ParamError> {
        match &self.malformed {
            Some(e) => Err(e.clone()),
            None => Ok(&self.params),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("invalid step '{input}': {reason}")]
pub struct StepSyntaxError {
    pub input: String,
    pub reason: String,
}

/// Parse the compact command-line step syntax `name[:key=value,...]`.
///
/// Values are typed by shape: `true`/`false` become booleans, integers and
/// floats become numbers, anything else stays a string.
///
/// ```
/// use imgpipe::pipeline::StepSpec;
/// let step: StepSpec = "resize:target_width=200,target_height=100".parse().unwrap();
/// assert_eq!(step.name, "resize");
/// assert_eq!(step.params.len(), 2);
/// ```
impl FromStr for StepSpec {
    type Err = StepSyntaxError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| StepSyntaxError {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        let (name, rest) = match input.split_once(':') {
            Some((name, rest)) => (name.trim(), Some(rest)),
            None => (input.trim(), None),
        };
        if name.is_empty() {
            return Err(fail("missing operation name"));
        }
        let mut step = StepSpec::new(name);
        for pair in rest.into_iter().flat_map(|r| r.split(',')) {
            if pair.trim().is_empty() {
                continue;
            }
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| fail("parameters must be key=value"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(fail("empty parameter name"));
            }
            step.params.insert(key, parse_scalar(raw.trim()));
        }
        Ok(step)
    }
}

fn parse_scalar(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else if let Ok(n) = raw.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else {
        Value::Str(raw.to_string())
    }
}

/// How a single step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    /// Name did not resolve to an operation.
    Skipped,
    /// Parameters failed validation.
    Invalid,
    /// Handler reported an error while running.
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepStatus::Ok => "ok",
            StepStatus::Skipped => "skipped",
            StepStatus::Invalid => "invalid",
            StepStatus::Failed => "failed",
        })
    }
}

/// One entry of a pipeline outcome. Never carries pixel data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub index: usize,
    pub operation: String,
    pub status: StepStatus,
    #[serde(flatten)]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    fn ok(index: usize, operation: &str, attributes: Attributes) -> Self {
        Self {
            index,
            operation: operation.to_string(),
            status: StepStatus::Ok,
            attributes,
            error: None,
        }
    }

    fn diagnostic(index: usize, operation: &str, error: &StepError) -> Self {
        let status = match error {
            StepError::UnknownOperation(_) => StepStatus::Skipped,
            StepError::Validation(_) => StepStatus::Invalid,
            StepError::Execution(_) => StepStatus::Failed,
        };
        Self {
            index,
            operation: operation.to_string(),
            status,
            attributes: Attributes::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == StepStatus::Ok
    }
}

/// Final raster plus one result per declared step, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub raster: Raster,
    pub results: Vec<StepResult>,
}

impl PipelineOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Executes step sequences against the operation registry.
pub struct Pipeline<'a> {
    env: ExecEnv<'a>,
    state: PipelineState,
}

impl<'a> Pipeline<'a> {
    pub fn new(env: ExecEnv<'a>) -> Self {
        Self {
            env,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Mark the run as stopped by a fatal condition outside the executor.
    ///
    /// A completed run stays completed.
    pub fn abort(&mut self) {
        if self.state != PipelineState::Completed {
            self.state = PipelineState::Aborted;
        }
    }

    /// Run `steps` in order starting from `raster`.
    pub fn execute(&mut self, raster: Raster, steps: &[StepSpec]) -> PipelineOutcome {
        self.state = PipelineState::Running;
        let env = self.env;
        let (raster, results) = steps.iter().enumerate().fold(
            (raster, Vec::with_capacity(steps.len())),
            |(raster, mut results), (index, step)| {
                let (replacement, result) = execute_step(&raster, index, step, &env);
                results.push(result);
                (replacement.unwrap_or(raster), results)
            },
        );
        self.state = PipelineState::Completed;
        PipelineOutcome { raster, results }
    }
}

/// Convenience wrapper: run `steps` with a fresh [`Pipeline`].
pub fn run(raster: Raster, steps: &[StepSpec], env: ExecEnv<'_>) -> PipelineOutcome {
    Pipeline::new(env).execute(raster, steps)
}

fn execute_step(
    raster: &Raster,
    index: usize,
    step: &StepSpec,
    env: &ExecEnv<'_>,
) -> (Option<Raster>, StepResult) {
    let attempt = ops::lookup(&step.name).and_then(|kind| {
        let operation = kind.validate(step.checked_params()?, env)?;
        operation.apply(raster, env)
    });
    match attempt {
        Ok(applied) => {
            let (w, h) = applied
                .raster
                .as_ref()
                .map_or(raster.dimensions(), Raster::dimensions);
            info!(step = index, operation = %step.name, width = w, height = h, "step applied");
            (
                applied.raster,
                StepResult::ok(index, &step.name, applied.attributes),
            )
        }
        Err(error) => {
            warn!(step = index, operation = %step.name, %error, "step did not apply");
            (None, StepResult::diagnostic(index, &step.name, &error))
        }
    }
}

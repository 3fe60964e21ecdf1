//! Execution plans
//!
//! A plan is a linear chain of steps; branching constructs (parallel
//! fan-out, subquery targets) hold whole sub-plans inside a step.

use serde::Serialize;

use super::context::ExecutionContext;
use super::errors::ExecResult;
use super::step::{ExecutionStep, StepStatsSnapshot};
use super::steps::StepKind;
use super::stream::ExecutionStream;

/// Introspection record for one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDescription {
    pub id: usize,
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StepStatsSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_plans: Vec<Vec<StepDescription>>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    tail: Option<Box<ExecutionStep>>,
    next_id: usize,
    profiling: bool,
}

impl ExecutionPlan {
    pub fn new(profiling: bool) -> Self {
        Self {
            tail: None,
            next_id: 0,
            profiling,
        }
    }

    pub fn is_profiling(&self) -> bool {
        self.profiling
    }

    /// Appends a step that pulls from the current tail
    pub fn chain(&mut self, kind: StepKind) {
        let step = ExecutionStep::new(self.next_id, kind, self.profiling);
        self.next_id += 1;
        self.tail = Some(Box::new(match self.tail.take() {
            Some(prev) => step.with_prev(*prev),
            None => step,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.tail.is_none()
    }

    pub fn tail(&self) -> Option<&ExecutionStep> {
        self.tail.as_deref()
    }

    /// Steps from the source to the tail
    pub fn steps(&self) -> Vec<&ExecutionStep> {
        let mut steps = Vec::new();
        let mut cursor = self.tail.as_deref();
        while let Some(step) = cursor {
            steps.push(step);
            cursor = step.prev();
        }
        steps.reverse();
        steps
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps().iter().map(|s| s.name()).collect()
    }

    /// True when some step of this plan or of a nested sub-plan matches
    pub fn any_step(&self, predicate: &dyn Fn(&StepKind) -> bool) -> bool {
        self.steps().iter().any(|s| {
            predicate(s.kind()) || s.kind().sub_plans().iter().any(|p| p.any_step(predicate))
        })
    }

    /// Starts the whole chain; an empty plan yields no rows
    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        match &self.tail {
            Some(tail) => tail.start(ctx),
            None => Ok(ExecutionStream::empty()),
        }
    }

    pub fn describe(&self) -> Vec<StepDescription> {
        self.steps()
            .into_iter()
            .map(|step| StepDescription {
                id: step.id(),
                name: step.name(),
                details: step.kind().details(),
                stats: step.is_profiling().then(|| step.stats().snapshot()),
                sub_plans: step.kind().sub_plans().iter().map(ExecutionPlan::describe).collect(),
            })
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.describe()).unwrap_or(serde_json::Value::Null)
    }

    /// Human-readable plan, one `+ Step` line per step
    pub fn pretty_print(&self, indent: usize) -> String {
        let mut out = String::new();
        write_steps(&self.describe(), indent, &mut out);
        out
    }
}

fn write_steps(steps: &[StepDescription], indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    for step in steps {
        out.push_str(&pad);
        out.push_str("+ ");
        out.push_str(step.name);
        if let Some(stats) = &step.stats {
            out.push_str(&format!(" ({} rows, {}us)", stats.rows, stats.elapsed_micros));
        }
        out.push('\n');
        if let Some(details) = &step.details {
            for line in details.lines() {
                out.push_str(&pad);
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        for (i, sub) in step.sub_plans.iter().enumerate() {
            out.push_str(&format!("{}  branch {}:\n", pad, i));
            write_steps(sub, indent + 4, out);
        }
    }
}

impl std::fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pretty_print(0))
    }
}

//! The type-erased job record.
//!
//! A job is a boxed closure plus scheduling metadata. The scheduler never
//! learns the concrete type of the work it runs; captured data moves into
//! the closure, which ties its lifetime to the job's execution.

use std::fmt;
use std::sync::Arc;

use crate::scheduler::counter::Counter;

pub(crate) enum JobTask {
    Run(Box<dyn FnOnce() + Send + 'static>),
    /// Placeholder with no work. In a batch it marks the shared counter done
    /// immediately and is skipped; submitted alone it is ignored.
    Completed,
}

/// A unit of work submitted to the scheduler.
///
/// Immutable once queued. The optional [`Counter`] attachments drive fan-out
/// (`with_counter`) and dependency gating (`after`).
pub struct Job {
    pub(crate) task: JobTask,
    pub(crate) name: &'static str,
    pub(crate) counter: Option<Arc<Counter>>,
    pub(crate) dependency: Option<Arc<Counter>>,
}

impl Job {
    /// Create a job from a closure.
    pub fn new(name: &'static str, f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            task: JobTask::Run(Box::new(f)),
            name,
            counter: None,
            dependency: None,
        }
    }

    /// Create a pre-completed placeholder job.
    pub fn completed(name: &'static str) -> Self {
        Self {
            task: JobTask::Completed,
            name,
            counter: None,
            dependency: None,
        }
    }

    /// Attach a completion counter.
    ///
    /// The counter is incremented at submission time, before the job can
    /// possibly run, and decremented once after the job executes.
    pub fn with_counter(mut self, counter: &Arc<Counter>) -> Self {
        self.counter = Some(Arc::clone(counter));
        self
    }

    /// Defer this job until `dependency` reaches zero.
    pub fn after(mut self, dependency: &Arc<Counter>) -> Self {
        self.dependency = Some(Arc::clone(dependency));
        self
    }

    /// Diagnostic name, shown in stall and deadlock logs.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("completed", &matches!(self.task, JobTask::Completed))
            .field("has_counter", &self.counter.is_some())
            .field("has_dependency", &self.dependency.is_some())
            .finish()
    }
}

//! A scriptable backend that records every call.

use crate::backend::{
    ApplyRequest, ApplyResult, Backend, BackendKind, BackendRegistry, DestroyRequest, TaskWorkdir,
};
use crate::context::{OutputItem, TaskOutputs};
use crate::core::{BackendState, TaskInput};
use crate::errors::BackendError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Which backend operation was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// [`Backend::apply`].
    Apply,
    /// [`Backend::destroy`].
    Destroy,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    /// Operation.
    pub kind: CallKind,
    /// Task name.
    pub task: String,
    /// Inputs as received.
    pub inputs: Vec<TaskInput>,
    /// Previous state as received.
    pub previous: BackendState,
    /// Working directory used, when workdirs are enabled.
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct Script {
    outputs: HashMap<String, TaskOutputs>,
    apply_failures: HashMap<String, String>,
    destroy_failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    workdirs: bool,
}

#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<BackendCall>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Backend fake for pipeline tests.
///
/// Clones share the script and the call log, so a test can keep one clone
/// for assertions after registering another.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    script: Arc<Mutex<Script>>,
    recorder: Arc<Mutex<Recorder>>,
}

impl RecordingBackend {
    /// Creates a backend where every call succeeds without outputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `task` produce the given plain outputs.
    #[must_use]
    pub fn with_outputs(self, task: &str, outputs: &[(&str, &str)]) -> Self {
        {
            let mut script = self.script.lock();
            let entry = script.outputs.entry(task.to_string()).or_default();
            for (key, value) in outputs {
                entry.insert((*key).to_string(), OutputItem::new(*value));
            }
        }
        self
    }

    /// Makes `task` produce one sensitive output.
    #[must_use]
    pub fn with_sensitive_output(self, task: &str, key: &str, value: &str) -> Self {
        self.script
            .lock()
            .outputs
            .entry(task.to_string())
            .or_default()
            .insert(key.to_string(), OutputItem::new(value).sensitive());
        self
    }

    /// Makes applying `task` fail with `message`.
    #[must_use]
    pub fn with_apply_failure(self, task: &str, message: &str) -> Self {
        self.script
            .lock()
            .apply_failures
            .insert(task.to_string(), message.to_string());
        self
    }

    /// Makes destroying `task` fail with `message`.
    #[must_use]
    pub fn with_destroy_failure(self, task: &str, message: &str) -> Self {
        self.script
            .lock()
            .destroy_failures
            .insert(task.to_string(), message.to_string());
        self
    }

    /// Delays every call for `task`.
    #[must_use]
    pub fn with_delay(self, task: &str, delay: Duration) -> Self {
        self.script.lock().delays.insert(task.to_string(), delay);
        self
    }

    /// Creates a [`TaskWorkdir`] under the request's root for every call.
    #[must_use]
    pub fn with_workdirs(self) -> Self {
        self.script.lock().workdirs = true;
        self
    }

    /// Returns a registry with this backend as the terraform implementation.
    #[must_use]
    pub fn registry(&self) -> BackendRegistry {
        BackendRegistry::new().with_backend(BackendKind::Terraform, Arc::new(self.clone()))
    }

    /// Returns every call in start order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.recorder.lock().calls.clone()
    }

    /// Returns the tasks applied, in start order.
    #[must_use]
    pub fn applied(&self) -> Vec<String> {
        self.tasks(CallKind::Apply)
    }

    /// Returns the tasks destroyed, in start order.
    #[must_use]
    pub fn destroyed(&self) -> Vec<String> {
        self.tasks(CallKind::Destroy)
    }

    /// Returns the largest number of calls observed running at once.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.recorder.lock().max_in_flight
    }

    fn tasks(&self, kind: CallKind) -> Vec<String> {
        self.recorder
            .lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.task.clone())
            .collect()
    }

    async fn track(
        &self,
        kind: CallKind,
        task: &str,
        inputs: &[TaskInput],
        previous: &BackendState,
        workdir_root: &Path,
    ) -> Result<(), BackendError> {
        let (delay, workdirs) = {
            let script = self.script.lock();
            (script.delays.get(task).copied(), script.workdirs)
        };
        let workdir = if workdirs {
            let dir = TaskWorkdir::create(workdir_root, task)?;
            let inputs_json = serde_json::to_vec(inputs)
                .map_err(|e| BackendError::Workdir(e.to_string()))?;
            std::fs::write(dir.join("inputs.json"), inputs_json)
                .map_err(|e| BackendError::Workdir(e.to_string()))?;
            Some(dir)
        } else {
            None
        };

        {
            let mut recorder = self.recorder.lock();
            recorder.calls.push(BackendCall {
                kind,
                task: task.to_string(),
                inputs: inputs.to_vec(),
                previous: previous.clone(),
                workdir: workdir.as_ref().map(|d| d.path().to_path_buf()),
            });
            recorder.in_flight += 1;
            recorder.max_in_flight = recorder.max_in_flight.max(recorder.in_flight);
        }

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.recorder.lock().in_flight -= 1;
        workdir.map_or(Ok(()), TaskWorkdir::close)
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn apply(&self, request: ApplyRequest) -> Result<ApplyResult, BackendError> {
        self.track(
            CallKind::Apply,
            &request.task,
            &request.inputs,
            &request.previous,
            &request.workdir_root,
        )
        .await?;

        let script = self.script.lock();
        if let Some(message) = script.apply_failures.get(&request.task) {
            return Err(BackendError::execution(message.clone()));
        }
        Ok(ApplyResult {
            outputs: script.outputs.get(&request.task).cloned().unwrap_or_default(),
            state: BackendState::new(format!("state:{}", request.task), Vec::new()),
        })
    }

    async fn destroy(&self, request: DestroyRequest) -> Result<(), BackendError> {
        self.track(
            CallKind::Destroy,
            &request.task,
            &request.inputs,
            &request.previous,
            &request.workdir_root,
        )
        .await?;

        match self.script.lock().destroy_failures.get(&request.task) {
            Some(message) => Err(BackendError::execution(message.clone())),
            None => Ok(()),
        }
    }
}

//! Request script execution.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use rhai::Engine;
use tokio::sync::Semaphore;

use crate::config::ScriptConfig;
use crate::runtime::{RequestContext, SleepClient};
use crate::script::bindings::{Bindings, ScriptOutput, ScriptState};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("no script at {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read script {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("script failed: {0}")]
    Eval(String),

    #[error("process timed out")]
    ProcessTimeout,

    #[error("execution cancelled")]
    Cancelled,

    #[error("too many scripts running")]
    Busy,

    #[error("script task failed: {0}")]
    Join(String),
}

/// Runs a vhost's index script for a request.
///
/// A script keeps its blocking thread for its whole run, sleeps included,
/// so runs are capped at `max_concurrent`.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    sleeper: SleepClient,
    config: ScriptConfig,
    process_timeout: Duration,
    slots: Arc<Semaphore>,
}

impl ScriptRunner {
    pub fn new(sleeper: SleepClient, config: ScriptConfig, process_timeout: Duration) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            sleeper,
            config,
            process_timeout,
            slots,
        }
    }

    /// Script slots not currently taken.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Script executed for a document root.
    pub fn script_path(&self, root: &Path) -> PathBuf {
        if root.is_file() {
            root.to_path_buf()
        } else {
            root.join(&self.config.index_file)
        }
    }

    /// Run the script on the blocking pool and collect its output.
    pub async fn run(&self, context: Arc<RequestContext>) -> Result<ScriptOutput, ScriptError> {
        let permit = self.slots.clone().try_acquire_owned().map_err(|_| {
            tracing::warn!(request_id = %context.request_id(), "Script slots exhausted");
            ScriptError::Busy
        })?;
        let script = self.script_path(context.document_root());
        let runner = self.clone();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            runner.execute(&script, context)
        })
            .await
            .map_err(|e| ScriptError::Join(e.to_string()))?
    }

    fn execute(&self, script: &Path, context: Arc<RequestContext>) -> Result<ScriptOutput, ScriptError> {
        if !script.is_file() {
            return Err(ScriptError::NotFound(script.to_path_buf()));
        }
        let source = std::fs::read_to_string(script).map_err(|source| ScriptError::Io {
            path: script.to_path_buf(),
            source,
        })?;

        let state = Rc::new(RefCell::new(ScriptState::default()));
        let mut engine = Engine::new();
        engine.set_max_operations(self.config.max_operations);
        Bindings {
            context: context.clone(),
            sleeper: self.sleeper.clone(),
            process_timeout: self.process_timeout,
            state: state.clone(),
        }
        .register(&mut engine);

        tracing::debug!(
            execution = %context.id(),
            request_id = %context.request_id(),
            script = %script.display(),
            "Running script"
        );

        let result = engine.run(&source);
        drop(engine);

        let mut state = state.borrow_mut();
        match result {
            Ok(()) => Ok(std::mem::take(&mut state.output)),
            Err(_) if state.cancelled => Err(ScriptError::Cancelled),
            Err(_) if state.timed_out => Err(ScriptError::ProcessTimeout),
            Err(e) => Err(ScriptError::Eval(e.to_string())),
        }
    }
}

//! Functions exposed to request scripts.
//!
//! # Responsibilities
//! - Collect the response a script builds (status, headers, body)
//! - Route `sleep` through the wake loop
//! - Give scripts read access to files under their document root
//!
//! # Design Decisions
//! - Bindings share one `ScriptState` through `Rc<RefCell<_>>`; the engine
//!   and its closures never leave the blocking thread that runs the script
//! - A cancelled sleep fails the script; the runner reports it as cancelled,
//!   not as a script error

use std::cell::RefCell;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use rhai::{Dynamic, Engine, EvalAltResult, INT};

use crate::runtime::{RequestContext, SleepClient, SleepOutcome};

pub const PROCESS_TIMEOUT_MESSAGE: &str = "Process Time Out!";

const DEFAULT_RANDOM_LEN: INT = 32;
const MAX_RANDOM_LEN: INT = 4096;

/// Response under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Default for ScriptOutput {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: String::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScriptState {
    pub output: ScriptOutput,
    pub cancelled: bool,
    pub timed_out: bool,
}

/// Everything the bindings need from outside the engine.
pub(crate) struct Bindings {
    pub context: Arc<RequestContext>,
    pub sleeper: SleepClient,
    pub process_timeout: Duration,
    pub state: Rc<RefCell<ScriptState>>,
}

impl Bindings {
    pub fn register(self, engine: &mut Engine) {
        let Bindings {
            context,
            sleeper,
            process_timeout,
            state,
        } = self;

        {
            let context = context.clone();
            let sleeper = sleeper.clone();
            let state = state.clone();
            engine.register_fn("sleep", move |ms: INT| -> Result<(), Box<EvalAltResult>> {
                suspend(&context, &sleeper, &state, ms)
            });
        }
        {
            let context = context.clone();
            let state = state.clone();
            engine.register_fn("sleep", move |ms: rhai::FLOAT| -> Result<(), Box<EvalAltResult>> {
                suspend(&context, &sleeper, &state, ms as INT)
            });
        }

        {
            let state = state.clone();
            engine.register_fn("echo", move |value: Dynamic| {
                state.borrow_mut().output.body.push_str(&value.to_string());
            });
        }
        {
            let state = state.clone();
            engine.register_fn("header", move |name: &str, value: &str| {
                set_header(&mut state.borrow_mut().output.headers, name, value);
            });
        }
        {
            let state = state.clone();
            engine.register_fn("clear_header", move || {
                state.borrow_mut().output.headers.clear();
            });
        }
        {
            let state = state.clone();
            engine.register_fn("status", move |code: INT| -> Result<(), Box<EvalAltResult>> {
                match u16::try_from(code) {
                    Ok(code) if (100..=999).contains(&code) => {
                        state.borrow_mut().output.status = code;
                        Ok(())
                    }
                    _ => Err(format!("invalid status code {code}").into()),
                }
            });
        }
        {
            let state = state.clone();
            let context = context.clone();
            engine.register_fn("check_timeout", move || -> Result<(), Box<EvalAltResult>> {
                if context.elapsed() > process_timeout {
                    context.set_keepalive(false);
                    state.borrow_mut().timed_out = true;
                    return Err(PROCESS_TIMEOUT_MESSAGE.into());
                }
                Ok(())
            });
        }

        {
            let context = context.clone();
            engine.register_fn("file_exists", move |path: &str| {
                resolve_in_root(context.document_root(), path)
                    .map(|full| full.exists())
                    .unwrap_or(false)
            });
        }
        {
            let context = context.clone();
            engine.register_fn("readfile", move |path: &str| -> Dynamic {
                let Some(full) = resolve_in_root(context.document_root(), path) else {
                    return Dynamic::UNIT;
                };
                match std::fs::read_to_string(&full) {
                    Ok(content) => Dynamic::from(content),
                    Err(e) => {
                        tracing::debug!(path = %full.display(), error = %e, "readfile failed");
                        Dynamic::UNIT
                    }
                }
            });
        }

        engine.register_fn("random_string", || -> Dynamic {
            random_string(DEFAULT_RANDOM_LEN).map_or(Dynamic::UNIT, Dynamic::from)
        });
        engine.register_fn("random_string", |len: INT| -> Dynamic {
            random_string(len).map_or(Dynamic::UNIT, Dynamic::from)
        });

        {
            let context = context.clone();
            engine.register_fn("host", move || -> Dynamic {
                context.host().map_or(Dynamic::UNIT, |host| Dynamic::from(host.to_string()))
            });
        }
        engine.register_fn("document_root", move || {
            context.document_root().display().to_string()
        });
    }
}

fn suspend(
    context: &RequestContext,
    sleeper: &SleepClient,
    state: &RefCell<ScriptState>,
    ms: INT,
) -> Result<(), Box<EvalAltResult>> {
    match sleeper.sleep_blocking(context.execution(), ms) {
        SleepOutcome::Cancelled => {
            state.borrow_mut().cancelled = true;
            Err("execution cancelled while sleeping".into())
        }
        _ => Ok(()),
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(existing) => existing.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// Directory that relative script paths are resolved against.
///
/// A root that is itself a file (the default route script) resolves
/// against its parent directory.
pub fn base_dir(root: &Path) -> &Path {
    if root.is_file() {
        root.parent().unwrap_or(root)
    } else {
        root
    }
}

/// Join `relative` under the document root, refusing parent traversal.
pub fn resolve_in_root(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(base_dir(root).join(relative))
}

/// Alphanumeric string of `len` characters. Lengths below one fall back to
/// the default; lengths above the limit yield nothing.
pub fn random_string(len: INT) -> Option<String> {
    let len = if len < 1 { DEFAULT_RANDOM_LEN } else { len };
    if len > MAX_RANDOM_LEN {
        return None;
    }
    Some(
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len as usize)
            .map(char::from)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_string_lengths() {
        assert_eq!(random_string(0).unwrap().len(), 32);
        assert_eq!(random_string(-3).unwrap().len(), 32);
        assert_eq!(random_string(7).unwrap().len(), 7);
        assert_eq!(random_string(4096).unwrap().len(), 4096);
        assert!(random_string(4097).is_none());
        assert!(random_string(16).unwrap().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_resolve_refuses_traversal() {
        let root = Path::new("/nonexistent/site");
        assert_eq!(
            resolve_in_root(root, "data/a.txt"),
            Some(PathBuf::from("/nonexistent/site/data/a.txt"))
        );
        assert_eq!(
            resolve_in_root(root, "/a.txt"),
            Some(PathBuf::from("/nonexistent/site/a.txt"))
        );
        assert_eq!(resolve_in_root(root, "../etc/passwd"), None);
        assert_eq!(resolve_in_root(root, "a/../../b"), None);
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut headers = Vec::new();
        set_header(&mut headers, "Content-Type", "text/plain");
        set_header(&mut headers, "x-a", "1");
        set_header(&mut headers, "content-type", "text/html");
        assert_eq!(
            headers,
            vec![
                ("Content-Type".to_string(), "text/html".to_string()),
                ("x-a".to_string(), "1".to_string()),
            ]
        );
    }
}

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::anyhow;
use sweepdag::config::{ExecutorSection, RawSweepFile, SweepEntry, SweepFile, TaskTemplate};
use sweepdag::dag::{Action, ActionResult, Graph, create_graph};
use sweepdag::errors::Result;
use sweepdag::types::StrategyKind;

/// Shared record of action invocations, in the order they started.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|n| *n == name).count()
    }

    pub fn was_called(&self, name: &str) -> bool {
        self.count(name) > 0
    }

    /// Index of the first invocation of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for name in self.calls.lock().unwrap().iter() {
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Blocking action that succeeds with `"<name>-out"`.
pub fn ok(log: &CallLog, name: &str) -> Action {
    let log = log.clone();
    let name = name.to_string();
    Action::blocking(move || {
        log.record(&name);
        Ok(format!("{name}-out"))
    })
}

/// Blocking action that always fails.
pub fn fail(log: &CallLog, name: &str) -> Action {
    let log = log.clone();
    let name = name.to_string();
    Action::blocking(move || {
        log.record(&name);
        Err(anyhow!("{name} failed"))
    })
}

/// Blocking action that panics.
pub fn panicking(log: &CallLog, name: &str) -> Action {
    let log = log.clone();
    let name = name.to_string();
    Action::blocking(move || {
        log.record(&name);
        panic!("{name} exploded");
    })
}

/// Blocking action that fails its first `failures` invocations, then
/// succeeds.
pub fn flaky(log: &CallLog, name: &str, failures: usize) -> Action {
    let log = log.clone();
    let name = name.to_string();
    let attempts = Arc::new(AtomicUsize::new(0));
    Action::blocking(move || {
        log.record(&name);
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < failures {
            Err(anyhow!("{name} failed on attempt {}", attempt + 1))
        } else {
            Ok(format!("{name}-out"))
        }
    })
}

/// Async action that sleeps `ms` milliseconds before succeeding.
pub fn sleepy(log: &CallLog, name: &str, ms: u64) -> Action {
    let log = log.clone();
    let name = name.to_string();
    Action::future(move || {
        let log = log.clone();
        let name = name.clone();
        async move {
            log.record(&name);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(format!("{name}-out"))
        }
    })
}

/// Async action that sleeps `ms` milliseconds and then fails.
pub fn sleepy_fail(log: &CallLog, name: &str, ms: u64) -> Action {
    let log = log.clone();
    let name = name.to_string();
    Action::future(move || {
        let log = log.clone();
        let name = name.clone();
        async move {
            log.record(&name);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Err(anyhow!("{name} failed"))
        }
    })
}

/// Future that completes at once but panics when dropped.
struct PanicOnDrop {
    log: CallLog,
    name: String,
}

impl Future for PanicOnDrop {
    type Output = ActionResult;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.log.record(&self.name);
        Poll::Ready(Ok(format!("{}-out", self.name)))
    }
}

impl Drop for PanicOnDrop {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            panic!("{} blew up while being dropped", self.name);
        }
    }
}

/// Async action whose future panics after the action already returned,
/// outside the action's own panic capture. Spawned on a runtime, the task
/// cannot be joined.
pub fn panics_on_drop(log: &CallLog, name: &str) -> Action {
    let log = log.clone();
    let name = name.to_string();
    Action::future(move || PanicOnDrop {
        log: log.clone(),
        name: name.clone(),
    })
}

/// Tracks how many probed actions run at the same time.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_seen(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Blocking action that holds a probe slot for `ms` milliseconds.
pub fn probed(probe: &ConcurrencyProbe, log: &CallLog, name: &str, ms: u64) -> Action {
    let probe = probe.clone();
    let log = log.clone();
    let name = name.to_string();
    Action::blocking(move || {
        probe.enter();
        log.record(&name);
        std::thread::sleep(Duration::from_millis(ms));
        probe.exit();
        Ok(format!("{name}-out"))
    })
}

/// Builder for graphs: `(name, action, deps)` triples fed to `create_graph`.
#[derive(Default)]
pub struct GraphBuilder {
    actions: Vec<(String, Action)>,
    deps: Vec<(String, Vec<String>)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, name: &str, action: Action, deps: &[&str]) -> Self {
        self.actions.push((name.to_string(), action));
        if !deps.is_empty() {
            self.deps.push((
                name.to_string(),
                deps.iter().map(|d| d.to_string()).collect(),
            ));
        }
        self
    }

    /// Declare dependencies without adding an action.
    pub fn deps(mut self, name: &str, deps: &[&str]) -> Self {
        self.deps.push((
            name.to_string(),
            deps.iter().map(|d| d.to_string()).collect(),
        ));
        self
    }

    pub fn build(self) -> Result<Graph> {
        create_graph(self.actions, self.deps)
    }
}

/// Typed empty dependency list for `create_graph`.
pub fn no_deps() -> Vec<(String, Vec<String>)> {
    Vec::new()
}

/// Builder for `SweepFile` to simplify test setup.
pub struct SweepFileBuilder {
    raw: RawSweepFile,
}

impl SweepFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawSweepFile {
                executor: ExecutorSection::default(),
                task: BTreeMap::new(),
                sweep: Vec::new(),
            },
        }
    }

    pub fn task(mut self, name: &str, cmd: &str, after: &[&str]) -> Self {
        self.raw.task.insert(
            name.to_string(),
            TaskTemplate {
                cmd: cmd.to_string(),
                after: after.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    pub fn sweep(mut self, name: &str, vars: &[(&str, &str)]) -> Self {
        self.raw.sweep.push(SweepEntry {
            name: name.to_string(),
            vars: vars
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self
    }

    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.raw.executor.strategy = strategy;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.raw.executor.workers = Some(workers);
        self
    }

    pub fn retries(mut self, retries: usize) -> Self {
        self.raw.executor.retries = retries;
        self
    }

    pub fn raw(self) -> RawSweepFile {
        self.raw
    }

    pub fn build(self) -> Result<SweepFile> {
        SweepFile::try_from(self.raw)
    }
}

impl Default for SweepFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

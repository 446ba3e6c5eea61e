//! The analysis scheduler.
//!
//! A single dispatcher thread owns all in-flight runs. It receives
//! `(uri, version)` work items from the host and progress events from the
//! worker pool, and is the only place runs are created, finished or
//! discarded:
//!
//! ```text
//! host ──WorkItem──▶ dispatcher ──parse job──▶ pool ──Parsed──▶ dispatcher
//!                        │                                         │
//!                        │◀──Started/Finished── pool ◀──rule tasks─┘
//!                        ▼
//!              merge → commit → Publication
//! ```
//!
//! Nothing is cancelled preemptively. A run for an older version keeps
//! going until its tasks return; its results are dropped when the run is
//! superseded or when the version check at commit fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bsl_linter::{Diagnostic, RuleSet};
use bsl_syntax::{Parse, SyntaxProvider};
use bsl_types::{DocumentUri, DocumentVersion, FileScope};
use crossbeam_channel::{never, select, tick, Receiver, Sender};
use parking_lot::RwLock;
use threadpool::ThreadPool;

use crate::document::DocumentStore;
use crate::merge::{merge, stamp_anchors};
use crate::task::{parse_contained, Event, RunId, Task};
use crate::{EngineOptions, Publication};

/// Request to analyze `uri` as of `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkItem {
    pub(crate) uri: DocumentUri,
    pub(crate) version: DocumentVersion,
}

/// State shared between the host and the dispatcher.
#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) store: Arc<DocumentStore>,
    pub(crate) rules: Arc<RwLock<Arc<RuleSet>>>,
    pub(crate) provider: Arc<dyn SyntaxProvider>,
}

/// Handle to the running dispatcher.
pub(crate) struct Scheduler {
    work: Option<Sender<WorkItem>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub(crate) fn start(
        shared: Shared,
        options: &EngineOptions,
        publications: Sender<Publication>,
    ) -> std::io::Result<Self> {
        let (work_tx, work_rx) = crossbeam_channel::bounded(options.queue_capacity.max(1));
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        let dispatcher = Dispatcher {
            shared,
            pool: ThreadPool::with_name("bsl-analysis".to_string(), options.workers.max(1)),
            events: events_tx,
            publications,
            runs: HashMap::new(),
            next_run: 0,
            task_timeout: options.task_timeout,
        };
        let handle = std::thread::Builder::new()
            .name("bsl-dispatcher".to_string())
            .spawn(move || dispatcher.run(&work_rx, &events_rx))?;

        tracing::debug!(
            workers = options.workers,
            queue = options.queue_capacity,
            "scheduler started"
        );
        Ok(Self {
            work: Some(work_tx),
            dispatcher: Some(handle),
        })
    }

    /// Queue `uri` for analysis. Blocks only while the work queue is full.
    pub(crate) fn enqueue(&self, uri: DocumentUri, version: DocumentVersion) {
        let Some(work) = &self.work else {
            tracing::debug!(%uri, "scheduler stopped, ignoring work item");
            return;
        };
        if work.send(WorkItem { uri, version }).is_err() {
            tracing::error!("dispatcher is gone, analysis request dropped");
        }
    }

    /// Stop accepting work, let the dispatcher drain the pool and join it.
    ///
    /// Returns `false` if the scheduler was already stopped.
    pub(crate) fn shutdown(&mut self) -> bool {
        drop(self.work.take());
        let Some(handle) = self.dispatcher.take() else {
            return false;
        };
        if handle.join().is_err() {
            tracing::error!("dispatcher thread panicked");
        }
        true
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

struct Run {
    id: RunId,
    version: DocumentVersion,
    parse: Parse,
    rules: Arc<RuleSet>,
    /// Outstanding tasks by rule index, with their start time once running
    pending: HashMap<usize, Option<Instant>>,
    diagnostics: Vec<Diagnostic>,
    superseded: Arc<AtomicBool>,
}

struct Dispatcher {
    shared: Shared,
    pool: ThreadPool,
    events: Sender<Event>,
    publications: Sender<Publication>,
    runs: HashMap<DocumentUri, Run>,
    next_run: RunId,
    task_timeout: Option<Duration>,
}

impl Dispatcher {
    fn run(mut self, work: &Receiver<WorkItem>, progress: &Receiver<Event>) {
        let watchdog = self
            .task_timeout
            .map_or_else(never::<Instant>, |timeout| tick(watchdog_interval(timeout)));

        loop {
            select! {
                recv(work) -> item => match item {
                    Ok(item) => self.schedule(item),
                    Err(_) => break,
                },
                recv(progress) -> event => {
                    if let Ok(event) = event {
                        self.handle(event);
                    }
                },
                recv(watchdog) -> _ => self.expire_overdue(),
            }
        }

        for run in self.runs.values() {
            run.superseded.store(true, Ordering::Release);
        }
        self.runs.clear();
        self.pool.join();
        tracing::debug!("dispatcher stopped");
    }

    /// Start parsing for a work item, unless a newer version already exists.
    fn schedule(&mut self, item: WorkItem) {
        let WorkItem { uri, version } = item;
        let Some(snapshot) = self.shared.store.get(&uri) else {
            tracing::debug!(%uri, %version, "document closed before analysis");
            return;
        };
        if snapshot.version != version {
            tracing::debug!(%uri, %version, current = %snapshot.version, "skipping superseded work item");
            return;
        }

        // Re-analysis after a configuration change reuses the cached parse
        if let Some(parse) = snapshot.parse {
            self.start_run(uri, version, parse);
            return;
        }

        let provider = Arc::clone(&self.shared.provider);
        let store = Arc::clone(&self.shared.store);
        let events = self.events.clone();
        let text = snapshot.text;
        self.pool.execute(move || {
            if !store.is_current(&uri, version) {
                return;
            }
            let parse = parse_contained(provider.as_ref(), &text);
            let _ = events.send(Event::Parsed {
                uri,
                version,
                parse,
            });
        });
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Parsed {
                uri,
                version,
                parse,
            } => {
                if self.shared.store.install_parse(&uri, version, parse.clone()) {
                    self.start_run(uri, version, parse);
                } else {
                    tracing::debug!(%uri, %version, "discarding stale parse");
                }
            }
            Event::Started { uri, run, task, at } => {
                if let Some(slot) = self
                    .active_run(&uri, run)
                    .and_then(|active| active.pending.get_mut(&task))
                {
                    *slot = Some(at);
                }
            }
            Event::Finished {
                uri,
                run,
                task,
                diagnostics,
            } => {
                let Some(active) = self.active_run(&uri, run) else {
                    return;
                };
                if active.pending.remove(&task).is_none() {
                    tracing::debug!(%uri, task, "ignoring result of expired task");
                    return;
                }
                active.diagnostics.extend(diagnostics);
                if active.pending.is_empty() {
                    self.finalize(&uri);
                }
            }
        }
    }

    fn active_run(&mut self, uri: &DocumentUri, id: RunId) -> Option<&mut Run> {
        self.runs.get_mut(uri).filter(|run| run.id == id)
    }

    /// Fan out one task per applicable rule.
    ///
    /// The rule set is captured here, once; later configuration changes do
    /// not affect this run.
    fn start_run(&mut self, uri: DocumentUri, version: DocumentVersion, parse: Parse) {
        let rules = Arc::clone(&*self.shared.rules.read());
        let file = FileScope::of_uri(&uri);
        let selected: Vec<usize> = rules
            .rules()
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.applies(parse.tree(), file))
            .map(|(index, _)| index)
            .collect();

        self.next_run += 1;
        let run = Run {
            id: self.next_run,
            version,
            parse: parse.clone(),
            rules: Arc::clone(&rules),
            pending: selected.iter().map(|&index| (index, None)).collect(),
            diagnostics: Vec::new(),
            superseded: Arc::new(AtomicBool::new(false)),
        };
        let id = run.id;
        let superseded = Arc::clone(&run.superseded);

        if let Some(previous) = self.runs.insert(uri.clone(), run) {
            previous.superseded.store(true, Ordering::Release);
            tracing::debug!(%uri, version = %previous.version, "superseded in-flight run");
        }

        tracing::debug!(%uri, %version, tasks = selected.len(), skipped = rules.len() - selected.len(), "analysis started");
        if selected.is_empty() {
            self.finalize(&uri);
            return;
        }

        for index in selected {
            let task = Task {
                uri: uri.clone(),
                version,
                run: id,
                index,
                parse: parse.clone(),
                rules: Arc::clone(&rules),
                store: Arc::clone(&self.shared.store),
                superseded: Arc::clone(&superseded),
                events: self.events.clone(),
            };
            self.pool.execute(move || task.run());
        }
    }

    /// Turn tasks running past the soft deadline into internal errors.
    fn expire_overdue(&mut self) {
        let Some(timeout) = self.task_timeout else {
            return;
        };
        let now = Instant::now();
        let mut complete = Vec::new();

        for (uri, run) in &mut self.runs {
            let overdue: Vec<usize> = run
                .pending
                .iter()
                .filter_map(|(&task, &started)| {
                    started
                        .filter(|started| now.duration_since(*started) >= timeout)
                        .map(|_| task)
                })
                .collect();
            for task in overdue {
                run.pending.remove(&task);
                let Some(rule) = run.rules.rules().get(task) else {
                    continue;
                };
                tracing::warn!(%uri, rule = %rule.id, ?timeout, "rule timed out");
                run.diagnostics.push(Diagnostic::internal_error(
                    rule.id.clone(),
                    format!("timed out after {} ms", timeout.as_millis()),
                ));
            }
            if run.pending.is_empty() {
                complete.push(uri.clone());
            }
        }

        for uri in complete {
            self.finalize(&uri);
        }
    }

    /// Merge a completed run and publish it if its version is still current.
    #[tracing::instrument(skip(self))]
    fn finalize(&mut self, uri: &DocumentUri) {
        let Some(run) = self.runs.remove(uri) else {
            return;
        };
        let version = run.version;
        if run.superseded.load(Ordering::Acquire) {
            return;
        }

        let mut diagnostics = run.diagnostics;
        stamp_anchors(&mut diagnostics, &run.parse);
        let merged: Arc<[Diagnostic]> = Arc::from(merge(diagnostics));

        let publications = &self.publications;
        let committed = self.shared.store.commit(uri, version, merged, |diagnostics| {
            let _ = publications.send(Publication {
                uri: uri.clone(),
                version,
                diagnostics: Arc::clone(diagnostics),
            });
        });

        if committed {
            tracing::debug!(%version, "diagnostics published");
        } else {
            tracing::debug!(%version, "discarding stale diagnostics");
        }
    }
}

/// How often the watchdog looks for overdue tasks.
fn watchdog_interval(timeout: Duration) -> Duration {
    (timeout / 4).clamp(Duration::from_millis(1), Duration::from_millis(50))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_interval_is_bounded() {
        assert_eq!(
            watchdog_interval(Duration::from_millis(20)),
            Duration::from_millis(5)
        );
        assert_eq!(
            watchdog_interval(Duration::from_secs(10)),
            Duration::from_millis(50)
        );
        assert_eq!(
            watchdog_interval(Duration::from_micros(1)),
            Duration::from_millis(1)
        );
    }
}

//! Render scheduler
//!
//! Components that need a render are put on a [`RenderQueue`]. A frame task
//! drains the queue in FIFO order and renders each host once per entry; the
//! same host being re-queued from inside its own render more than
//! `max_rerenders` times within one task aborts the task.
//!
//! After every task the scheduler waits for `quiescence_delay` to catch
//! follow-up invalidations coming from mutation observers before it resolves
//! the pending "DOM updated" promise.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::pin::pin;
use std::rc::{Rc, Weak};

use futures::future::{join_all, select};
use indexmap::IndexSet;
use lumen_dom::{CustomState, Deferred, Document, NodeId, Promise};
use lumen_template::TemplateError;
use smol::{LocalExecutor, Timer};

use crate::config::{FrameMode, SchedulerConfig};

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("component {host:?} re-rendered too many times this task ({renders} renders)")]
    RerenderLimit { host: NodeId, renders: usize },

    #[error(transparent)]
    Render(#[from] TemplateError),
}

/// What the scheduler renders
pub trait RenderTarget {
    /// Called once at the start of every task, before the queue is drained
    fn prepare_frame(&self) {}

    /// Render step of one component
    fn render(&self, host: NodeId) -> Result<(), SchedulerError>;
}

/// Ordered set of hosts waiting for a render, each with its completion
#[derive(Default)]
pub struct RenderQueue {
    list: VecDeque<NodeId>,
    promises: HashMap<NodeId, Deferred>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `host`; an already queued host keeps its place and promise
    pub fn add(&mut self, host: NodeId) -> Promise {
        if let Some(pending) = self.promises.get(&host) {
            return pending.promise();
        }
        let deferred = Deferred::new();
        let promise = deferred.promise();
        self.list.push_back(host);
        self.promises.insert(host, deferred);
        promise
    }

    pub fn shift(&mut self) -> Option<(NodeId, Deferred)> {
        let host = self.list.pop_front()?;
        let deferred = self.promises.remove(&host)?;
        Some((host, deferred))
    }

    pub fn contains(&self, host: NodeId) -> bool {
        self.promises.contains_key(&host)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drop every entry; their waiters settle
    pub fn clear(&mut self) {
        self.list.clear();
        self.promises.clear();
    }
}

pub struct RenderScheduler {
    config: SchedulerConfig,
    executor: Rc<LocalExecutor<'static>>,
    target: Weak<dyn RenderTarget>,
    this: Weak<RenderScheduler>,
    queue: RefCell<RenderQueue>,
    task_scheduled: Cell<bool>,
    running: Cell<bool>,
    tasks_run: Cell<usize>,
    dom_updated: RefCell<Option<Deferred>>,
    quiescence_epoch: Cell<u64>,
    errors: RefCell<Vec<SchedulerError>>,
}

impl RenderScheduler {
    pub fn new(
        config: SchedulerConfig,
        executor: Rc<LocalExecutor<'static>>,
        target: Weak<dyn RenderTarget>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            config,
            executor,
            target,
            this: this.clone(),
            queue: RefCell::new(RenderQueue::new()),
            task_scheduled: Cell::new(false),
            running: Cell::new(false),
            tasks_run: Cell::new(0),
            dom_updated: RefCell::new(None),
            quiescence_epoch: Cell::new(0),
            errors: RefCell::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queue `host` for the next frame task. Calls made before that task
    /// runs share one render and one promise.
    pub fn render_deferred(&self, host: NodeId) -> Promise {
        let promise = self.queue.borrow_mut().add(host);
        self.dom_updated.borrow_mut().get_or_insert_with(Deferred::new);
        self.schedule_task();
        promise
    }

    /// Queue `host` and run a task right away unless one is running
    pub fn render_immediately(&self, host: NodeId) -> Result<Promise, SchedulerError> {
        let promise = self.queue.borrow_mut().add(host);
        if !self.running.get() {
            self.run_task()?;
        }
        Ok(promise)
    }

    /// Make sure a frame task will run
    pub fn schedule_task(&self) {
        if self.task_scheduled.replace(true) {
            return;
        }
        if let FrameMode::Timer(interval) = self.config.frame_mode {
            let this = self.this.clone();
            self.executor
                .spawn(async move {
                    Timer::after(interval).await;
                    if let Some(scheduler) = this.upgrade() {
                        if let Err(err) = scheduler.frame() {
                            tracing::error!(%err, "Render task failed");
                            scheduler.errors.borrow_mut().push(err);
                        }
                    }
                })
                .detach();
        }
    }

    pub fn is_task_scheduled(&self) -> bool {
        self.task_scheduled.get()
    }

    /// Run the scheduled task, if any
    pub fn frame(&self) -> Result<(), SchedulerError> {
        if !self.task_scheduled.get() {
            return Ok(());
        }
        self.run_task()
    }

    /// Drain the queue. A runaway host aborts the task and drops the rest
    /// of the queue.
    pub fn run_task(&self) -> Result<(), SchedulerError> {
        if self.running.get() {
            return Ok(());
        }
        let Some(target) = self.target.upgrade() else {
            return Ok(());
        };
        self.task_scheduled.set(false);
        self.running.set(true);
        self.tasks_run.set(self.tasks_run.get() + 1);
        tracing::debug!(task = self.tasks_run.get(), queued = self.queue.borrow().len(), "Render task");

        target.prepare_frame();
        let result = self.drain(target.as_ref());
        if result.is_err() {
            self.queue.borrow_mut().clear();
        }

        self.running.set(false);
        self.schedule_quiescence();
        result
    }

    fn drain(&self, target: &dyn RenderTarget) -> Result<(), SchedulerError> {
        let mut renders: HashMap<NodeId, usize> = HashMap::new();
        loop {
            let next = self.queue.borrow_mut().shift();
            let Some((host, deferred)) = next else {
                return Ok(());
            };
            let count = renders.entry(host).or_insert(0);
            if *count > self.config.max_rerenders {
                return Err(SchedulerError::RerenderLimit {
                    host,
                    renders: *count,
                });
            }
            *count += 1;
            target.render(host)?;
            deferred.resolve();
        }
    }

    fn schedule_quiescence(&self) {
        let epoch = self.quiescence_epoch.get() + 1;
        self.quiescence_epoch.set(epoch);
        let this = self.this.clone();
        let delay = self.config.quiescence_delay;
        self.executor
            .spawn(async move {
                Timer::after(delay).await;
                if let Some(scheduler) = this.upgrade() {
                    scheduler.settle(epoch);
                }
            })
            .detach();
    }

    fn settle(&self, epoch: u64) {
        if epoch != self.quiescence_epoch.get() || self.running.get() || !self.queue.borrow().is_empty() {
            return;
        }
        let pending = self.dom_updated.borrow_mut().take();
        if let Some(deferred) = pending {
            deferred.resolve();
        }
    }

    /// Completes once all queued renders ran and the DOM went quiet
    pub fn when_dom_updated(&self) -> Promise {
        if let Some(pending) = self.dom_updated.borrow().as_ref() {
            return pending.promise();
        }
        if self.queue.borrow().is_empty() && !self.running.get() && !self.task_scheduled.get() {
            return Promise::resolved();
        }
        let deferred = Deferred::new();
        let promise = deferred.promise();
        *self.dom_updated.borrow_mut() = Some(deferred);
        promise
    }

    /// Wait for every undefined custom element of `doc` to be defined, at
    /// most `shadow_dom_ready_timeout`. Stragglers are reported.
    pub async fn when_shadow_dom_ready(&self, doc: &Document) {
        let pending = undefined_elements(doc);
        if pending.is_empty() {
            return;
        }
        let definitions = join_all(pending.iter().map(|name| doc.when_defined(name)));
        let timeout = Timer::after(self.config.shadow_dom_ready_timeout);
        select(pin!(definitions), pin!(timeout)).await;

        let remaining = undefined_elements(doc);
        if !remaining.is_empty() {
            tracing::warn!(
                "undefined elements after {:?} are: {}",
                self.config.shadow_dom_ready_timeout,
                remaining.join(" ; ")
            );
        }
    }

    pub async fn when_finished(&self, doc: &Document) {
        self.when_shadow_dom_ready(doc).await;
        self.when_dom_updated().await;
    }

    pub fn is_queued(&self, host: NodeId) -> bool {
        self.queue.borrow().contains(host)
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Number of tasks run so far
    pub fn task_count(&self) -> usize {
        self.tasks_run.get()
    }

    /// Errors of timer driven tasks
    pub fn take_errors(&self) -> Vec<SchedulerError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }
}

/// Local names of custom elements in `doc` still waiting for a definition
fn undefined_elements(doc: &Document) -> Vec<String> {
    doc.with_tree(|tree| {
        let names: IndexSet<String> = tree
            .shadow_including_inclusive_descendants(NodeId::ROOT)
            .into_iter()
            .filter_map(|id| tree.element(id))
            .filter(|e| e.custom_state == CustomState::Undefined)
            .map(|e| e.local_name.clone())
            .collect();
        names.into_iter().collect()
    })
}

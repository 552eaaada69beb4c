// src/core/monitor.rs
//! The monitoring session
//!
//! [`Monitor`] is what the host's event callback drives. Every event goes
//! through the same steps: the block-list is consulted first, and only an
//! allowed event from a monitored surface is scanned and classified.
//! Accepted signals are handed to a single writer task so the callback
//! never waits on storage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::ControlSurface;
use crate::config::MonitorConfig;
use crate::core::enforcer::PolicyEnforcer;
use crate::core::event_types::{EventOutcome, ExtractedSignal, MonitorListener, MonitoredEvent};
use crate::core::policy::{Action, PolicyChannel, PolicySnapshot};
use crate::core::time_tracker::SharedUsage;
use crate::core::ui_node::UiNode;
use crate::error::{GuardError, Result};
use crate::extractors::classifier::EventClassifier;
use crate::host::HostBindings;
use crate::storage::history::HistoryStore;
use crate::storage::policy_store::PolicyStore;

/// Lifecycle of a [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Terminated,
}

/// Counters for one monitoring session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub events_seen: u64,
    pub events_blocked: u64,
    pub signals_accepted: u64,
    pub entries_written: u64,
    pub write_failures: u64,
}

#[derive(Debug, Default)]
struct WriterStats {
    written: u64,
    failed: u64,
}

pub struct Monitor {
    state: SessionState,
    classifier: EventClassifier,
    policy: PolicyChannel,
    enforcer: PolicyEnforcer,
    history: Arc<dyn HistoryStore>,
    history_tx: Option<UnboundedSender<ExtractedSignal>>,
    writer: Option<JoinHandle<WriterStats>>,
    usage: SharedUsage,
    listeners: Vec<Box<dyn MonitorListener>>,
    runtime: Option<Handle>,
    active: Arc<AtomicBool>,
    summary: SessionSummary,
}

impl Monitor {
    pub fn new(
        config: &MonitorConfig,
        history: Arc<dyn HistoryStore>,
        policy_store: Arc<dyn PolicyStore>,
        host: HostBindings,
    ) -> Result<Self> {
        config.validate()?;
        let policy = PolicyChannel::load(policy_store)?;

        Ok(Self {
            state: SessionState::Uninitialized,
            classifier: EventClassifier::from_config(config),
            policy,
            enforcer: PolicyEnforcer::from_config(host, config),
            history,
            history_tx: None,
            writer: None,
            usage: SharedUsage::new(config.usage.clone()),
            listeners: Vec::new(),
            runtime: None,
            active: Arc::new(AtomicBool::new(false)),
            summary: SessionSummary::default(),
        })
    }

    pub fn add_listener<L: MonitorListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Start accepting events. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(GuardError::InvalidState {
                actual: self.state,
                expected: SessionState::Uninitialized,
            });
        }

        let runtime = Handle::try_current()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.writer = Some(runtime.spawn(run_history_writer(Arc::clone(&self.history), rx)));
        self.history_tx = Some(tx);
        self.runtime = Some(runtime);
        self.classifier.reset();

        self.state = SessionState::Ready;
        self.active.store(true, Ordering::SeqCst);
        info!("👀 Monitoring started");

        for listener in &mut self.listeners {
            listener.on_monitoring_started();
        }
        Ok(())
    }

    pub fn handle_event<N: UiNode>(&mut self, event: MonitoredEvent<N>) -> EventOutcome {
        self.handle_event_at(event, Local::now())
    }

    /// Process one host event observed at `observed_at`.
    ///
    /// The event, and with it the root handle, is dropped before this
    /// returns on every path.
    pub fn handle_event_at<N: UiNode>(
        &mut self,
        event: MonitoredEvent<N>,
        observed_at: DateTime<Local>,
    ) -> EventOutcome {
        if self.state != SessionState::Ready {
            debug!(state = ?self.state, "event ignored");
            return EventOutcome::Ignored;
        }
        let Some(runtime) = self.runtime.as_ref() else {
            return EventOutcome::Ignored;
        };
        self.summary.events_seen += 1;

        let application_id = event.source_application_id.as_str();
        if event.kind.is_scannable() {
            self.usage.lock().record_foreground(application_id, observed_at);
        }

        if self.policy.evaluate(application_id) == Action::Block {
            let report = self.enforcer.block(application_id, runtime);
            self.summary.events_blocked += 1;
            for listener in &mut self.listeners {
                listener.on_block(&report.application_id, &report.display_name);
            }
            return EventOutcome::Blocked {
                application_id: report.application_id,
            };
        }

        let Some(signal) = self.classifier.classify_at(&event, observed_at) else {
            return EventOutcome::NoSignal;
        };
        drop(event);

        self.summary.signals_accepted += 1;
        if let Some(tx) = &self.history_tx {
            if tx.send(signal.clone()).is_err() {
                error!(address = %signal.address, "History writer is gone; entry dropped");
            }
        }
        for listener in &mut self.listeners {
            listener.on_signal(&signal);
        }
        EventOutcome::Logged(signal)
    }

    /// Replace the block-list through the policy channel.
    pub fn update_policy<I, S>(&self, new_blocked_ids: I) -> Result<Arc<PolicySnapshot>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.update_policy(new_blocked_ids)
    }

    pub fn policy_channel(&self) -> &PolicyChannel {
        &self.policy
    }

    pub fn control_surface(&self) -> ControlSurface {
        ControlSurface::new(
            self.policy.clone(),
            Arc::clone(&self.history),
            self.usage.clone(),
            Arc::clone(&self.active),
        )
    }

    /// Stop accepting events, drain pending history writes and close the
    /// history store.
    pub async fn shutdown(&mut self) -> Result<SessionSummary> {
        if self.state != SessionState::Ready {
            return Err(GuardError::InvalidState {
                actual: self.state,
                expected: SessionState::Ready,
            });
        }
        info!("🛑 Stopping monitor...");
        self.state = SessionState::Terminated;
        self.active.store(false, Ordering::SeqCst);

        // Closing the sender lets the writer finish what is queued.
        self.history_tx = None;
        if let Some(writer) = self.writer.take() {
            match writer.await {
                Ok(stats) => {
                    self.summary.entries_written = stats.written;
                    self.summary.write_failures = stats.failed;
                }
                Err(e) => error!("History writer task failed: {}", e),
            }
        }

        self.usage.lock().end_tracking(Local::now());
        self.history.close().await;
        self.runtime = None;

        for listener in &mut self.listeners {
            listener.on_monitoring_stopped();
        }
        info!(summary = ?self.summary, "✅ Monitor stopped");
        Ok(self.summary)
    }
}

/// Appends signals in the order they were accepted. A failed append is
/// logged and the entry is lost.
async fn run_history_writer(
    history: Arc<dyn HistoryStore>,
    mut rx: UnboundedReceiver<ExtractedSignal>,
) -> WriterStats {
    let mut stats = WriterStats::default();
    while let Some(signal) = rx.recv().await {
        match history
            .append(&signal.address, &signal.icon_reference, &signal.timestamp())
            .await
        {
            Ok(id) => {
                stats.written += 1;
                debug!(id, address = %signal.address, "📝 History entry written");
            }
            Err(e) => {
                stats.failed += 1;
                warn!(address = %signal.address, "Error adding history entry: {}", e);
            }
        }
    }
    stats
}

//! Owns one data source's periodic timer and trigger queue, and serializes
//! its runs so at most one fan-out is ever in flight for that source
//! (§4.6). Implemented as a single actor task: because the loop below
//! awaits one run to completion before handling the next trigger, overlap
//! is structurally impossible rather than merely checked for.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ds_model::Schedule;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type RunFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type RunFn = Arc<dyn Fn(TriggerScope) -> RunFuture + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerScope {
  AllNodes,
  SingleNode(String),
}

/// Whether a trigger arriving mid-run should be coalesced into a single
/// follow-up run, or dropped (§4.6's trigger table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
  ResetSchedule,
  FireAndForget,
}

#[derive(Debug, Clone)]
struct Trigger {
  kind: TriggerKind,
  scope: TriggerScope,
}

pub struct SourceScheduler {
  id: String,
  schedule: Schedule,
  cancel: CancellationToken,
  trigger_tx: mpsc::UnboundedSender<Trigger>,
  handle: JoinHandle<()>,
}

impl SourceScheduler {
  pub fn spawn(id: String, schedule: Schedule, run_fn: RunFn) -> Self {
    let cancel = CancellationToken::new();
    let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_actor(
      id.clone(),
      schedule,
      run_fn,
      trigger_rx,
      cancel.clone(),
    ));
    Self { id, schedule, cancel, trigger_tx, handle }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn schedule(&self) -> Schedule {
    self.schedule
  }

  pub fn trigger(&self, kind: TriggerKind, scope: TriggerScope) {
    let _ = self.trigger_tx.send(Trigger { kind, scope });
  }

  /// Cancels the periodic timer and, if a run is in progress, its
  /// cancellation token. Idempotent.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub async fn join(self) {
    let _ = self.handle.await;
  }
}

impl Drop for SourceScheduler {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}

async fn run_actor(
  id: String,
  schedule: Schedule,
  run_fn: RunFn,
  mut trigger_rx: mpsc::UnboundedReceiver<Trigger>,
  cancel: CancellationToken,
) {
  loop {
    let trigger = tokio::select! {
      biased;
      _ = cancel.cancelled() => return,
      _ = tokio::time::sleep(schedule.period()), if schedule.is_periodic() => {
        Trigger { kind: TriggerKind::ResetSchedule, scope: TriggerScope::AllNodes }
      }
      received = trigger_rx.recv() => match received {
        Some(trigger) => trigger,
        None => return,
      },
    };

    debug!(source_id = %id, kind = ?trigger.kind, "running");
    tokio::select! {
      biased;
      _ = cancel.cancelled() => return,
      _ = run_fn(trigger.scope) => {}
    }

    // Drain triggers that piled up while running: a ResetSchedule trigger
    // coalesces into one follow-up run; FireAndForget triggers are dropped.
    let mut follow_up = None;
    while let Ok(pending) = trigger_rx.try_recv() {
      if pending.kind == TriggerKind::ResetSchedule {
        follow_up = Some(pending);
      }
    }
    if let Some(trigger) = follow_up {
      debug!(source_id = %id, "running coalesced follow-up");
      tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        _ = run_fn(trigger.scope) => {}
      }
    }
  }
}

//! Heartbeat and stale-connection eviction.
//!
//! Two independent periodic tasks. Eviction is driven purely by the age of
//! each connection's last inbound activity (or a closed transport); it never
//! looks at whether heartbeats were answered.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::{
  task::JoinHandle,
  time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info};

use crate::{
  RealtimeConfig,
  connections::{ConnectionId, deliver},
  hub::Hub,
  protocol::ServerMessage,
};

/// Push a `ping` to every connection. Connections whose transport is gone
/// are dropped. Returns the number of pings queued.
pub fn heartbeat(hub: &Hub) -> usize {
  let now = Utc::now();
  let mut sent = 0;
  for (id, sender) in hub.connections.senders() {
    if deliver(&sender, id, ServerMessage::Ping(json!({ "timestamp": now })), None) {
      sent += 1;
    } else {
      hub.disconnect(id, "heartbeat send failed");
    }
  }
  debug!(sent, "heartbeat");
  sent
}

/// Remove every connection that is stale as of `now`, along with its
/// subscription.
pub fn evict_stale(hub: &Hub, now: DateTime<Utc>, threshold: Duration) -> Vec<ConnectionId> {
  let stale = hub.connections.stale(now, threshold);
  for id in &stale {
    hub.disconnect(*id, "stale");
  }
  if !stale.is_empty() {
    info!(evicted = stale.len(), "evicted stale connections");
  }
  stale
}

/// Handles to the two background tasks. Dropping the monitor stops them.
#[derive(Debug)]
pub struct LivenessMonitor {
  heartbeat: JoinHandle<()>,
  cleanup:   JoinHandle<()>,
}

impl LivenessMonitor {
  pub fn spawn(hub: Arc<Hub>, config: &RealtimeConfig) -> Self {
    let pinger = hub.clone();
    let heartbeat_task = tokio::spawn(every(config.heartbeat_interval, move || {
      heartbeat(&pinger);
    }));

    let threshold = config.stale_threshold;
    let cleanup_task = tokio::spawn(every(config.cleanup_interval, move || {
      evict_stale(&hub, Utc::now(), threshold);
    }));

    Self { heartbeat: heartbeat_task, cleanup: cleanup_task }
  }

  /// Cancel both timers.
  pub fn stop(&self) {
    self.heartbeat.abort();
    self.cleanup.abort();
  }

  pub fn is_running(&self) -> bool {
    !self.heartbeat.is_finished() && !self.cleanup.is_finished()
  }
}

impl Drop for LivenessMonitor {
  fn drop(&mut self) { self.stop(); }
}

/// Run `tick` once per `period`, starting one period from now.
async fn every(period: Duration, mut tick: impl FnMut() + Send + 'static) {
  let mut interval = interval_at(Instant::now() + period, period);
  interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
  loop {
    interval.tick().await;
    tick();
  }
}

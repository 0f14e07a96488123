//! Subscriber registry and event fan-out

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use forecourt_core::config::StreamConfig;
use forecourt_core::models::{AlertConfig, Period, StreamEvent};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SubscriberId = Uuid;

/// Frames the hub pushes toward a subscriber's transport
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Connection acknowledgment carrying the assigned subscriber id
    Welcome { subscriber_id: SubscriberId },
    Event(StreamEvent),
    /// Liveness probe; the transport should answer by calling
    /// [`StreamHub::touch`] when the peer responds
    Ping,
    Close { code: u16, reason: String },
}

/// What the hub decided about an inbound control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Subscription state was updated
    Handled,
    /// The subscriber asked for an on-demand metrics snapshot; the caller
    /// owns computing it and delivering via [`StreamHub::send_to`]
    MetricsRequest(Period),
    /// Malformed or unknown message, logged and ignored
    Ignored,
}

/// Control messages a subscriber may send at any time
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ControlMessage {
    Subscribe {
        #[serde(default)]
        channels: Vec<String>,
        #[serde(default)]
        site_ids: Vec<String>,
    },
    Unsubscribe {
        #[serde(default)]
        channels: Vec<String>,
        #[serde(default)]
        site_ids: Vec<String>,
    },
    RequestMetrics {
        #[serde(default)]
        period: Option<Period>,
    },
}

struct Subscriber {
    tx: UnboundedSender<OutboundMessage>,
    channels: HashSet<String>,
    sites: HashSet<String>,
    last_seen: DateTime<Utc>,
}

/// Delivery predicate: a subscriber receives an event when its channel set
/// contains "all" or the event's channel, and its site filter (when
/// non-empty) contains the event's site id. Events without a site id pass
/// every site filter.
pub fn should_deliver(
    event: &StreamEvent,
    channels: &HashSet<String>,
    sites: &HashSet<String>,
) -> bool {
    let channel_match =
        channels.contains("all") || channels.contains(event.kind.channel());
    let site_match = sites.is_empty()
        || event
            .site_id
            .as_ref()
            .map_or(true, |site| sites.contains(site));
    channel_match && site_match
}

/// Outcome of one heartbeat sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub pinged: usize,
    pub dropped: usize,
}

struct HubInner {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    alerts: RwLock<HashMap<String, AlertConfig>>,
    idle_cutoff: Duration,
}

/// Registry of connected subscribers with filtered event fan-out
#[derive(Clone)]
pub struct StreamHub {
    inner: Arc<HubInner>,
}

impl StreamHub {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: RwLock::new(HashMap::new()),
                alerts: RwLock::new(HashMap::new()),
                idle_cutoff: Duration::seconds(config.idle_cutoff_secs as i64),
            }),
        }
    }

    /// Attach a new subscriber. Starts on the catch-all "all" channel with
    /// an empty site filter; a welcome frame is queued immediately.
    pub fn connect(&self) -> (SubscriberId, UnboundedReceiver<OutboundMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let subscriber = Subscriber {
            tx: tx.clone(),
            channels: HashSet::from(["all".to_string()]),
            sites: HashSet::new(),
            last_seen: Utc::now(),
        };
        self.inner.subscribers.write().insert(id, subscriber);
        let _ = tx.send(OutboundMessage::Welcome { subscriber_id: id });

        info!(subscriber = %id, "subscriber connected");
        (id, rx)
    }

    pub fn disconnect(&self, id: SubscriberId) {
        if self.inner.subscribers.write().remove(&id).is_some() {
            info!(subscriber = %id, "subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Record a liveness acknowledgment from the subscriber's transport
    pub fn touch(&self, id: SubscriberId) {
        if let Some(sub) = self.inner.subscribers.write().get_mut(&id) {
            sub.last_seen = Utc::now();
        }
    }

    /// Apply a control message from a subscriber.
    ///
    /// Malformed messages are logged and ignored without disconnecting.
    pub fn handle_control(&self, id: SubscriberId, text: &str) -> ControlOutcome {
        let message: ControlMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(subscriber = %id, error = %err, "ignoring malformed control message");
                return ControlOutcome::Ignored;
            }
        };

        let mut subscribers = self.inner.subscribers.write();
        let Some(sub) = subscribers.get_mut(&id) else {
            return ControlOutcome::Ignored;
        };
        sub.last_seen = Utc::now();

        match message {
            ControlMessage::Subscribe { channels, site_ids } => {
                sub.channels.extend(channels);
                sub.sites.extend(site_ids);
                ControlOutcome::Handled
            }
            ControlMessage::Unsubscribe { channels, site_ids } => {
                for channel in &channels {
                    sub.channels.remove(channel);
                }
                for site in &site_ids {
                    sub.sites.remove(site);
                }
                ControlOutcome::Handled
            }
            ControlMessage::RequestMetrics { period } => {
                ControlOutcome::MetricsRequest(period.unwrap_or(Period::Daily))
            }
        }
    }

    /// Deliver an event to every subscriber whose filters match
    pub fn broadcast(&self, event: &StreamEvent) {
        let mut dead = Vec::new();
        {
            let subscribers = self.inner.subscribers.read();
            for (id, sub) in subscribers.iter() {
                if !should_deliver(event, &sub.channels, &sub.sites) {
                    continue;
                }
                if sub.tx.send(OutboundMessage::Event(event.clone())).is_err() {
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            debug!(subscriber = %id, "pruning closed subscriber");
            self.disconnect(id);
        }
    }

    /// Deliver an event to one subscriber, bypassing filters (used for
    /// request/response exchanges like on-demand metrics)
    pub fn send_to(&self, id: SubscriberId, event: &StreamEvent) {
        let subscribers = self.inner.subscribers.read();
        if let Some(sub) = subscribers.get(&id) {
            let _ = sub.tx.send(OutboundMessage::Event(event.clone()));
        }
    }

    /// Heartbeat sweep: purge subscribers silent past the idle cutoff and
    /// probe the rest
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut subscribers = self.inner.subscribers.write();
        subscribers.retain(|id, sub| {
            if now - sub.last_seen > self.inner.idle_cutoff {
                warn!(subscriber = %id, "dropping unresponsive subscriber");
                let _ = sub.tx.send(OutboundMessage::Close {
                    code: 1001,
                    reason: "heartbeat timeout".to_string(),
                });
                stats.dropped += 1;
                false
            } else {
                let _ = sub.tx.send(OutboundMessage::Ping);
                stats.pinged += 1;
                true
            }
        });
        stats
    }

    /// Close every connection with a shutdown status and clear the registry
    pub fn shutdown(&self) {
        let mut subscribers = self.inner.subscribers.write();
        for sub in subscribers.values() {
            let _ = sub.tx.send(OutboundMessage::Close {
                code: 1000,
                reason: "server shutting down".to_string(),
            });
        }
        subscribers.clear();
    }

    // =========================================================================
    // Alert definitions
    // =========================================================================

    pub fn register_alert(&self, alert: AlertConfig) {
        self.inner.alerts.write().insert(alert.id.clone(), alert);
    }

    pub fn alerts(&self) -> Vec<AlertConfig> {
        let mut all: Vec<_> = self.inner.alerts.read().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn remove_alert(&self, id: &str) -> bool {
        self.inner.alerts.write().remove(id).is_some()
    }
}

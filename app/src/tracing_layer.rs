// In app/src/tracing_layer.rs

use chrono::Utc;
use events::{LogEvent, SimEvent};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;

/// How many log events are kept for late subscribers.
pub const LOG_CACHE_SIZE: usize = 200;

pub type LogCache = Arc<Mutex<VecDeque<SimEvent>>>;

/// Forwards every tracing event onto the simulator event channel as `SimEvent::Log`.
pub struct EventBroadcastLayer {
    tx: broadcast::Sender<SimEvent>,
    cache: LogCache,
}

impl EventBroadcastLayer {
    pub fn new(tx: broadcast::Sender<SimEvent>, cache: LogCache) -> Self {
        Self { tx, cache }
    }
}

impl<S> Layer<S> for EventBroadcastLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = LogMessageVisitor::default();
        event.record(&mut visitor);
        let msg = SimEvent::Log(LogEvent {
            timestamp: Utc::now(),
            level: event.metadata().level().to_string(),
            message: visitor.finish(),
        });

        // Cache and send under one lock so a replaying subscriber sees each line exactly once.
        if let Ok(mut cache) = self.cache.lock() {
            if cache.len() >= LOG_CACHE_SIZE {
                cache.pop_front();
            }
            cache.push_back(msg.clone());
            let _ = self.tx.send(msg);
        }
    }
}

/// Subscribes to the event channel and returns the cached log lines that came before it.
pub fn subscribe_with_replay(
    tx: &broadcast::Sender<SimEvent>,
    cache: &LogCache,
) -> (Vec<SimEvent>, broadcast::Receiver<SimEvent>) {
    match cache.lock() {
        Ok(cache) => (cache.iter().cloned().collect(), tx.subscribe()),
        Err(_) => (Vec::new(), tx.subscribe()),
    }
}

/// Captures the `message` field and appends the structured fields after it.
#[derive(Default)]
struct LogMessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl LogMessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl tracing::field::Visit for LogMessageVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

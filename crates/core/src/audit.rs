use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::CallId;

pub const REDACTED: &str = "[REDACTED]";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Ingress,
    Capture,
    Balance,
    Payment,
    System,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub call_id: CallId,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        call_id: CallId,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            call_id,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Writes audit events to the process log. Callers must only put redacted
/// values into event metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        tracing::info!(
            event_name = "audit.event",
            audit_event_type = %event.event_type,
            audit_category = ?event.category,
            audit_outcome = ?event.outcome,
            audit_event_id = %event.event_id,
            correlation_id = %event.correlation_id,
            call_id = %event.call_id,
            actor = %event.actor,
            metadata = %metadata,
            "audit event recorded"
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use crate::{
        audit::{
            AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
            TracingAuditSink, REDACTED,
        },
        capture::CallId,
    };

    /// Collects formatted `tracing` output for assertions.
    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
            tracing_subscriber::fmt().with_writer(self.clone()).with_ansi(false).finish()
        }

        pub(crate) fn contents(&self) -> String {
            let bytes = self.0.lock().expect("log buffer").clone();
            String::from_utf8(bytes).expect("utf8 logs")
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn tracing_sink_writes_only_redacted_payment_fields() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            TracingAuditSink.emit(
                AuditEvent::new(
                    CallId::new("call-42"),
                    "req-123",
                    "payment.submitted",
                    AuditCategory::Payment,
                    "payment-service",
                    AuditOutcome::Success,
                )
                .with_metadata("account_number", "1001")
                .with_metadata("card", "************1111")
                .with_metadata("card_verification_value", REDACTED),
            );
        });

        let output = logs.contents();
        assert!(output.contains("event_name=\"audit.event\""), "{output}");
        assert!(output.contains("audit_event_type=payment.submitted"));
        assert!(output.contains("call_id=call-42"));
        assert!(output.contains("correlation_id=req-123"));
        assert!(output.contains(r#""card":"************1111""#));
        assert!(output.contains(r#""card_verification_value":"[REDACTED]""#));
    }

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEvent::new(
                CallId::new("call-42"),
                "req-123",
                "payment.submitted",
                AuditCategory::Payment,
                "payment-service",
                AuditOutcome::Success,
            )
            .with_metadata("account_number", "1001")
            .with_metadata("card", "************1111"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].call_id, CallId::new("call-42"));
        assert_eq!(events[0].metadata.get("card").map(String::as_str), Some("************1111"));
    }

    #[test]
    fn clones_share_the_same_event_buffer() {
        let sink = InMemoryAuditSink::default();
        let clone = sink.clone();
        clone.emit(AuditEvent::new(
            CallId::unscoped(),
            "req-1",
            "capture.completed",
            AuditCategory::Capture,
            "capture-handoff",
            AuditOutcome::Success,
        ));

        assert_eq!(sink.events().len(), 1);
    }
}

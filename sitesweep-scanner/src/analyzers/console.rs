use crate::auth::{BasicAuth, usable};
use crate::browser::{BrowserSession, RuntimeEvent, close_page};
use crate::issue::{ConsoleErrorKind, ConsoleErrorRecord, Severity};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

/// Loads `url` in a fresh page and records console errors, uncaught
/// exceptions and failed requests until `settle` has elapsed after load.
///
/// Never fails: problems opening the page are logged and whatever was
/// observed up to that point is returned.
pub async fn collect_console_errors(
    session: &dyn BrowserSession,
    url: &str,
    auth: Option<&BasicAuth>,
    navigation_timeout: Duration,
    settle: Duration,
) -> Vec<ConsoleErrorRecord> {
    let page = match session.new_page().await {
        Ok(page) => page,
        Err(e) => {
            warn!("Console collector could not open a page for {}: {}", url, e);
            return Vec::new();
        }
    };

    if let Some(auth) = usable(auth)
        && let Err(e) = page.authenticate(auth).await
    {
        warn!("Console collector could not apply credentials: {}", e);
    }

    let mut events = match page.runtime_events().await {
        Ok(rx) => rx,
        Err(e) => {
            warn!("Console collector could not subscribe to {}: {}", url, e);
            close_page(page).await;
            return Vec::new();
        }
    };

    let records = match page.goto(url, navigation_timeout).await {
        Ok(()) => drain_events(&mut events, settle).await,
        Err(e) => {
            debug!("Console collector navigation to {} failed: {}", url, e);
            drain_events(&mut events, Duration::ZERO).await
        }
    };

    close_page(page).await;
    debug!("Collected {} console errors from {}", records.len(), url);
    records
}

/// Receives events until `window` elapses or every sender is gone.
pub(crate) async fn drain_events(
    events: &mut UnboundedReceiver<RuntimeEvent>,
    window: Duration,
) -> Vec<ConsoleErrorRecord> {
    let deadline = Instant::now() + window;
    let mut records = Vec::new();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => records.push(to_record(event)),
                None => break,
            },
            _ = sleep_until(deadline) => break,
        }
    }

    while let Ok(event) = events.try_recv() {
        records.push(to_record(event));
    }
    records
}

fn to_record(event: RuntimeEvent) -> ConsoleErrorRecord {
    let timestamp = Utc::now();
    match event {
        RuntimeEvent::ConsoleError { text, location } => ConsoleErrorRecord {
            kind: ConsoleErrorKind::ConsoleError,
            message: text,
            timestamp,
            severity: Severity::Error,
            location,
            stack: None,
            url: None,
            failure_reason: None,
        },
        RuntimeEvent::Exception {
            message,
            stack,
            location,
        } => ConsoleErrorRecord {
            kind: ConsoleErrorKind::JsError,
            message,
            timestamp,
            severity: Severity::Error,
            location,
            stack,
            url: None,
            failure_reason: None,
        },
        RuntimeEvent::RequestFailed { url, reason } => ConsoleErrorRecord {
            kind: ConsoleErrorKind::RequestFailed,
            message: format!("Request failed: {} ({})", url, reason),
            timestamp,
            severity: Severity::Warning,
            location: None,
            stack: None,
            url: Some(url),
            failure_reason: Some(reason),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_events_within_window_are_collected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = tokio::spawn(async move {
            tx.send(RuntimeEvent::ConsoleError {
                text: "boom".to_string(),
                location: Some("app.js:1:1".to_string()),
            })
            .unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;
            tx.send(RuntimeEvent::RequestFailed {
                url: "https://example.com/missing.js".to_string(),
                reason: "net::ERR_ABORTED".to_string(),
            })
            .unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            // Past the window; must not be collected.
            let _ = tx.send(RuntimeEvent::ConsoleError {
                text: "late".to_string(),
                location: None,
            });
        });

        let records = drain_events(&mut rx, Duration::from_secs(2)).await;
        sender.abort();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, ConsoleErrorKind::ConsoleError);
        assert_eq!(records[0].severity, Severity::Error);
        assert_eq!(records[1].kind, ConsoleErrorKind::RequestFailed);
        assert_eq!(records[1].severity, Severity::Warning);
        assert_eq!(records[1].failure_reason.as_deref(), Some("net::ERR_ABORTED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_waits_full_duration_when_quiet() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<RuntimeEvent>();
        let started = Instant::now();
        let records = drain_events(&mut rx, Duration::from_secs(2)).await;
        assert!(records.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn test_exception_maps_to_js_error() {
        let record = to_record(RuntimeEvent::Exception {
            message: "TypeError: x is undefined".to_string(),
            stack: Some("at main (app.js:3:7)".to_string()),
            location: None,
        });
        assert_eq!(record.kind, ConsoleErrorKind::JsError);
        assert_eq!(record.severity, Severity::Error);
        assert!(record.stack.is_some());
    }
}

//! Subscription over the responses an adapter observes.
//!
//! A [`ResponseWindow`] keeps the responses matching its predicate and closes
//! when the stream ends, after a quiet period with no traffic, or when the
//! overall window elapses.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct ObservedResponse {
    pub url: String,
    pub status: u16,
    pub body: Value,
}

pub struct ResponseWindow {
    predicate: Box<dyn Fn(&ObservedResponse) -> bool + Send + Sync>,
    quiescence: Duration,
    max_window: Duration,
}

impl ResponseWindow {
    pub fn new(
        predicate: impl Fn(&ObservedResponse) -> bool + Send + Sync + 'static,
        quiescence: Duration,
        max_window: Duration,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            quiescence,
            max_window,
        }
    }

    /// Matches responses whose URL contains every fragment.
    pub fn url_contains(
        fragments: &[&str],
        quiescence: Duration,
        max_window: Duration,
    ) -> Self {
        let fragments = fragments.iter().map(|f| f.to_string()).collect::<Vec<_>>();
        Self::new(
            move |r| fragments.iter().all(|f| r.url.contains(f.as_str())),
            quiescence,
            max_window,
        )
    }

    pub async fn collect(&self, rx: &mut UnboundedReceiver<ObservedResponse>) -> Vec<ObservedResponse> {
        let deadline = Instant::now() + self.max_window;
        let mut out = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining.min(self.quiescence), rx.recv()).await {
                Ok(Some(response)) => {
                    if (self.predicate)(&response) {
                        out.push(response);
                    }
                }
                // Sender dropped or quiet for a full quiescence period.
                Ok(None) | Err(_) => break,
            }
        }

        out
    }
}

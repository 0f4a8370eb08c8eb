//! Test doubles shared by the unit tests of several modules.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::sync::mpsc;

use crate::error::Error;
use crate::model::{Job, Outcome};
use crate::notify::{Alert, Mailer};
use crate::probe::Probe;

/// Answers probes with a per-domain HTTP status instead of touching the network.
/// Unknown domains behave like unreachable hosts.
#[derive(Default)]
pub struct ScriptedProbe {
    statuses: Mutex<HashMap<String, u16>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn set_status(&self, domain: &str, status: u16) {
        self.statuses
            .lock()
            .unwrap()
            .insert(domain.to_string(), status);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Probe for ScriptedProbe {
    async fn probe(&self, job: &Job) -> Outcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let status = self.statuses.lock().unwrap().get(&job.domain).copied();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Outcome::now(job.domain.clone(), status == Some(job.expected_status))
    }
}

/// Records every alert instead of sending it.
pub struct RecordingMailer {
    sent: mpsc::UnboundedSender<Alert>,
}

impl RecordingMailer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (sent, rx) = mpsc::unbounded_channel();
        (Self { sent }, rx)
    }
}

impl Mailer for RecordingMailer {
    async fn send(&self, alert: &Alert) -> Result<(), Error> {
        let _ = self.sent.send(alert.clone());
        Ok(())
    }
}

use log::{error, info, warn};
use std::future;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::model::Outcome;

/// Frames buffered for a subscriber before it counts as stuck and is
/// detached. One sweep pushes one frame per target, so a client that cannot
/// drain a sweep of more than this many targets in time gets disconnected.
const SUBSCRIBER_BUFFER: usize = 32;

/// Handle the hub writes serialized outcomes into.
///
/// The other end, returned by [`subscriber`], belongs to the transport task.
/// Dropping either end ends the subscription.
#[derive(Debug)]
pub struct Subscriber {
    frames: mpsc::Sender<String>,
}

pub fn subscriber() -> (Subscriber, mpsc::Receiver<String>) {
    let (frames, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
    (Subscriber { frames }, rx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    NoSubscriber,
    /// The push failed and the subscriber was dropped.
    Detached,
}

/// Single slot for the live-update subscriber. The last one to attach wins.
#[derive(Debug, Default)]
pub struct Hub {
    subscriber: Option<Subscriber>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, subscriber: Subscriber) {
        if self.subscriber.replace(subscriber).is_some() {
            info!("new live subscriber replaces the previous one");
        } else {
            info!("live subscriber attached");
        }
    }

    /// Drops the current subscriber, which closes its connection.
    pub fn detach(&mut self) {
        self.subscriber = None;
    }

    pub fn is_attached(&self) -> bool {
        self.subscriber.is_some()
    }

    pub fn push(&mut self, outcome: &Outcome) -> Delivery {
        let Some(subscriber) = &self.subscriber else {
            return Delivery::NoSubscriber;
        };

        let frame = match serde_json::to_string(outcome) {
            Ok(frame) => frame,
            Err(e) => {
                error!("could not serialize result for {}: {e}", outcome.domain);
                self.detach();
                return Delivery::Detached;
            }
        };

        match subscriber.frames.try_send(frame) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => {
                warn!("live subscriber is not keeping up: closing it");
                self.detach();
                Delivery::Detached
            }
            Err(TrySendError::Closed(_)) => {
                info!("could not write to live subscriber: closing it");
                self.detach();
                Delivery::Detached
            }
        }
    }

    /// Resolves once the transport side of the current subscriber has gone away.
    /// Never resolves while nobody is attached.
    pub async fn closed(&self) {
        match &self.subscriber {
            Some(subscriber) => subscriber.frames.closed().await,
            None => future::pending().await,
        }
    }
}

// service/chat_hub.rs
//
// Live fan-out of chat messages per job. Channels are created on the first
// subscription and removed when the last one is dropped.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::models::chatmodels::Message;

const CHANNEL_CAPACITY: usize = 64;

type Channels = HashMap<Uuid, broadcast::Sender<Message>>;

#[derive(Debug, Clone, Default)]
pub struct ChatHub {
    channels: Arc<Mutex<Channels>>,
}

fn lock(channels: &Mutex<Channels>) -> MutexGuard<'_, Channels> {
    // A panic while holding the lock cannot leave the map half-written.
    channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// `viewer` limits the feed to conversations that person is part of;
    /// `None` sees every message on the job.
    pub fn subscribe(&self, job_id: Uuid, viewer: Option<Uuid>) -> ChatSubscription {
        let receiver = {
            let mut channels = lock(&self.channels);
            channels
                .entry(job_id)
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };

        tracing::debug!(job_id = %job_id, "chat subscription opened");

        ChatSubscription {
            job_id,
            viewer,
            receiver: Some(receiver),
            channels: self.channels.clone(),
        }
    }

    /// Returns how many live subscribers received the message.
    pub fn publish(&self, message: &Message) -> usize {
        let channels = lock(&self.channels);
        match channels.get(&message.job_id) {
            Some(sender) => sender.send(message.clone()).unwrap_or(0),
            None => 0,
        }
    }

    pub fn active_channels(&self) -> usize {
        lock(&self.channels).len()
    }
}

/// A live feed for one job. Dropping it unregisters the receiver.
#[derive(Debug)]
pub struct ChatSubscription {
    job_id: Uuid,
    viewer: Option<Uuid>,
    receiver: Option<broadcast::Receiver<Message>>,
    channels: Arc<Mutex<Channels>>,
}

impl ChatSubscription {
    /// Next message, or `None` once the hub is gone. Slow readers skip what
    /// they missed instead of ending the stream.
    pub async fn recv(&mut self) -> Option<Message> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(message) if self.viewer.map_or(true, |id| message.involves(id)) => {
                    return Some(message)
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(job_id = %self.job_id, skipped, "chat subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ChatSubscription {
    fn drop(&mut self) {
        // Release our receiver before counting the ones left.
        drop(self.receiver.take());

        let mut channels = lock(&self.channels);
        let idle = channels
            .get(&self.job_id)
            .map_or(false, |sender| sender.receiver_count() == 0);
        if idle {
            channels.remove(&self.job_id);
            tracing::debug!(job_id = %self.job_id, "chat channel released");
        }
    }
}

use tokio::sync::mpsc;

/// Receives sync progress. Called from whichever task made the progress.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, job_id: &str, percent: u8);

    /// Called exactly once per job, after its queue entry is gone.
    fn on_done(&self, job_id: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Progress { job_id: String, percent: u8 },
    Done { job_id: String },
}

/// Forwards callbacks onto a channel drained by a single consumer task.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelListener {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SyncEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Sync event dropped: receiver closed");
        }
    }
}

impl ProgressListener for ChannelListener {
    fn on_progress(&self, job_id: &str, percent: u8) {
        self.send(SyncEvent::Progress {
            job_id: job_id.to_string(),
            percent,
        });
    }

    fn on_done(&self, job_id: &str) {
        self.send(SyncEvent::Done {
            job_id: job_id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_forwards_events_in_order() {
        let (listener, mut rx) = ChannelListener::channel();
        listener.on_progress("7", 40);
        listener.on_done("7");

        assert_eq!(
            rx.recv().await,
            Some(SyncEvent::Progress {
                job_id: "7".into(),
                percent: 40
            })
        );
        assert_eq!(rx.recv().await, Some(SyncEvent::Done { job_id: "7".into() }));
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (listener, rx) = ChannelListener::channel();
        drop(rx);
        listener.on_done("7");
    }
}

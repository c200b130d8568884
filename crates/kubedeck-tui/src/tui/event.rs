use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use kubedeck_types::CacheMessage;

/// Everything the UI loop reacts to, from the terminal and from background tasks
#[derive(Clone, Debug)]
pub enum Event {
    /// Terminal tick (for periodic updates)
    Tick,
    /// Key press event
    Key(KeyEvent),
    /// Terminal resize
    Resize(u16, u16),
    /// Terminal input error
    Error(String),
    /// Load, switch and mutation outcomes
    Cache(CacheMessage),
    /// A yaml/describe/log request finished
    Detail { generation: u64, text: String },
    /// A yaml/describe/log request failed
    DetailFailed { generation: u64, error: String },
    /// One line of a followed log stream
    LogLine { generation: u64, line: String },
}

/// Clonable handle background tasks use to reach the UI loop
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Event handler merging terminal input with background results into one queue
pub struct EventHandler {
    sender: EventSender,
    receiver: mpsc::UnboundedReceiver<Event>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl EventHandler {
    /// Create a new event handler with the given tick rate
    pub fn new(tick_rate: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        {
            let sender = sender.clone();
            let cancel = cancel.clone();

            tokio::spawn(async move {
                let mut reader = EventStream::new();
                let mut tick_interval = tokio::time::interval(tick_rate);

                loop {
                    let tick = tick_interval.tick();
                    let crossterm_event = reader.next().fuse();

                    tokio::select! {
                        _ = cancel.cancelled() => break,

                        _ = tick => {
                            let _ = sender.send(Event::Tick);
                        }

                        maybe_event = crossterm_event => {
                            match maybe_event {
                                Some(Ok(CrosstermEvent::Key(key))) => {
                                    // Filter out release events (important for Windows)
                                    if key.kind == KeyEventKind::Press {
                                        let _ = sender.send(Event::Key(key));
                                    }
                                }
                                Some(Ok(CrosstermEvent::Resize(w, h))) => {
                                    let _ = sender.send(Event::Resize(w, h));
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!(error = %e, "terminal input error");
                                    let _ = sender.send(Event::Error(e.to_string()));
                                }
                                None => break,
                            }
                        }
                    }
                }
            });
        }

        Self {
            sender,
            receiver,
            cancel,
        }
    }

    /// Sender for tasks that report back to the UI
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Receive the next event
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Stop reading terminal input
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

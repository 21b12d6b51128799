/// Live query notifications
///
/// Every successful write publishes a [`ChangeEvent`] on an in-process broadcast
/// channel. Live query streams (the project list and the board) subscribe,
/// filter for what concerns them and re-run their query, so clients always
/// receive a complete snapshot rather than a diff.
///
/// Because each notification only means "query again", a receiver that lags
/// behind and loses events just refreshes once more.
///
/// # Example
///
/// ```
/// use collabtrack_shared::live::{ChangeEvent, LiveHub, Refresh};
/// use tokio_stream::StreamExt;
/// use uuid::Uuid;
///
/// # #[tokio::main]
/// # async fn main() {
/// let hub = LiveHub::new(16);
/// let project_id = Uuid::new_v4();
///
/// let mut refreshes = Box::pin(hub.refreshes(move |e| e.concerns_project(project_id)));
/// assert_eq!(refreshes.next().await, Some(Refresh::Initial));
///
/// hub.publish(ChangeEvent::TasksChanged { project_id });
/// assert_eq!(refreshes.next().await, Some(Refresh::Changed));
/// # }
/// ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 1024;

/// Something a live query may need to re-read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChangeEvent {
    /// A project was created or its roster changed
    ProjectChanged {
        project_id: Uuid,

        /// Members before and after the change
        audience: Vec<Uuid>,
    },

    /// A task of the project was created, edited, moved or deleted
    TasksChanged { project_id: Uuid },
}

impl ChangeEvent {
    pub fn project_id(&self) -> Uuid {
        match self {
            ChangeEvent::ProjectChanged { project_id, .. }
            | ChangeEvent::TasksChanged { project_id } => *project_id,
        }
    }

    /// Whether `user_id`'s project list may have changed
    pub fn concerns_user(&self, user_id: Uuid) -> bool {
        match self {
            ChangeEvent::ProjectChanged { audience, .. } => audience.contains(&user_id),
            ChangeEvent::TasksChanged { .. } => false,
        }
    }

    /// Whether the board of `project_id` may have changed
    pub fn concerns_project(&self, project_id: Uuid) -> bool {
        self.project_id() == project_id
    }
}

/// Why a live query should produce a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// First snapshot after subscribing
    Initial,

    /// A relevant change was published
    Changed,

    /// The receiver fell behind and skipped this many events
    Lagged(u64),
}

/// Broadcast hub for change events
#[derive(Debug, Clone)]
pub struct LiveHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LiveHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event; returns how many subscribers will see it
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let project_id = event.project_id();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::trace!(project_id = %project_id, receivers, "Published change");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Refresh triggers for one live query
    ///
    /// Yields [`Refresh::Initial`] right away, then one item per published
    /// event accepted by `filter`, plus one per lag. Dropping the stream
    /// unsubscribes.
    pub fn refreshes<F>(&self, filter: F) -> impl Stream<Item = Refresh> + Send + 'static
    where
        F: Fn(&ChangeEvent) -> bool + Send + Sync + 'static,
    {
        let changes = BroadcastStream::new(self.subscribe()).filter_map(move |item| match item {
            Ok(event) if filter(&event) => Some(Refresh::Changed),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Live query lagged, refreshing");
                Some(Refresh::Lagged(skipped))
            }
        });

        tokio_stream::once(Refresh::Initial).chain(changes)
    }
}

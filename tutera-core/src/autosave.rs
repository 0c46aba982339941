//! Debounced autosave for the draft store.
//!
//! Patches are merged while they keep arriving; the merged patch is applied
//! once nothing new has come in for the configured delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::course::CourseDraft;
use crate::drafts::CourseDraftStore;
use crate::errors::TuteraError;
use crate::storage::DraftStorage;

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(300);

enum Msg {
    Patch(CourseDraft),
    Flush(oneshot::Sender<()>),
}

/// Handle to a running autosave task. Cheap to clone; the task flushes and
/// exits when the last handle is dropped.
#[derive(Clone)]
pub struct Autosave {
    tx: mpsc::UnboundedSender<Msg>,
}

impl Autosave {
    pub fn spawn<S>(store: Arc<Mutex<CourseDraftStore<S>>>, delay: Duration) -> Self
    where
        S: DraftStorage + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(store, delay, rx));
        Self { tx }
    }

    /// Queue a patch. Fails only if the task is gone.
    pub fn queue(&self, patch: CourseDraft) -> Result<(), TuteraError> {
        self.tx
            .send(Msg::Patch(patch))
            .map_err(|_| TuteraError::unavailable("autosave task stopped"))
    }

    /// Apply whatever is pending now and wait for it.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Msg::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn apply<S: DraftStorage>(store: &Mutex<CourseDraftStore<S>>, pending: &mut Option<CourseDraft>) {
    if let Some(patch) = pending.take() {
        store.lock().await.update_current_course(patch);
        tracing::debug!("autosave applied");
    }
}

async fn run<S: DraftStorage>(
    store: Arc<Mutex<CourseDraftStore<S>>>,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<Msg>,
) {
    let mut pending: Option<CourseDraft> = None;

    loop {
        let msg = if pending.is_some() {
            match tokio::time::timeout(delay, rx.recv()).await {
                Ok(msg) => msg,
                Err(_) => {
                    apply(&store, &mut pending).await;
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match msg {
            Some(Msg::Patch(patch)) => pending.get_or_insert_with(CourseDraft::default).merge(patch),
            Some(Msg::Flush(done)) => {
                apply(&store, &mut pending).await;
                let _ = done.send(());
            }
            None => {
                apply(&store, &mut pending).await;
                break;
            }
        }
    }
}

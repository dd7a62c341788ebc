use tokio::select;
use tokio::sync::{mpsc, watch};

use super::SessionClosedError;
use super::state::{SessionMessage, SessionState};

pub struct MailboxParts {
    pub mailbox: Mailbox,
    pub msg_rx: mpsc::UnboundedReceiver<SessionMessage>,
    pub kill_rx: watch::Receiver<bool>,
}

/// The sending side of a session's message queue.
pub struct Mailbox {
    msg_tx: mpsc::UnboundedSender<SessionMessage>,
    kill_tx: watch::Sender<bool>,
}

impl Mailbox {
    #[inline]
    pub fn new() -> MailboxParts {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        MailboxParts {
            mailbox: Mailbox { msg_tx, kill_tx },
            msg_rx,
            kill_rx,
        }
    }

    /// A sender for background tasks posting their results.
    #[inline]
    pub fn sender(&self) -> mpsc::UnboundedSender<SessionMessage> {
        self.msg_tx.clone()
    }

    #[inline]
    pub fn send(&self, msg: SessionMessage) -> Result<(), SessionClosedError> {
        if *self.kill_tx.borrow() {
            return Err(SessionClosedError);
        }
        self.msg_tx.send(msg).map_err(|_| SessionClosedError)
    }

    #[inline]
    pub fn close(&self) {
        self.kill_tx.send_replace(true);
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.close();
    }
}

/// Handles messages one at a time until the session is closed.
pub async fn run_session(
    mut state: SessionState,
    mut msg_rx: mpsc::UnboundedReceiver<SessionMessage>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = kill_rx.changed() => {
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        let proc_span = trace_span!("proc msg");
        proc_span.in_scope(|| {
            state.handle(msg);
            trace!("finished");
        });
    }
    state.shutdown();
    debug!("will terminate");
}

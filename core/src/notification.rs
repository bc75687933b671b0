//! Lifecycle notifications.
//!
//! Each `Session` owns its observer list; there is no process-wide
//! notification center. Observers receive `Notification`s over a channel
//! and correlate them with their requests by equality (`Request` compares
//! by id).

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use crate::request::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestEvent {
    Resumed,
    TaskResumed,
    TaskCompleted,
    Cancelled,
    /// Always the last event of a request, emitted once.
    Finished,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub event: RequestEvent,
    pub request: Request,
}

#[derive(Debug, Default)]
pub(crate) struct Observers {
    senders: Mutex<Vec<Sender<Notification>>>,
}

impl Observers {
    pub(crate) fn subscribe(&self) -> Receiver<Notification> {
        let (tx, rx) = channel();
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).push(tx);
        rx
    }

    /// Deliver to every live observer, forgetting the ones that hung up.
    pub(crate) fn emit(&self, event: RequestEvent, request: &Request) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        if senders.is_empty() {
            return;
        }
        senders.retain(|tx| {
            tx.send(Notification {
                event,
                request: request.clone(),
            })
            .is_ok()
        });
    }
}

use std::sync::mpsc;
use std::time::Duration;

pub struct EventSender<T> {
    tx: mpsc::Sender<T>,
}

pub struct EventReceiver<T> {
    rx: mpsc::Receiver<T>,
}

pub fn channel<T>() -> (EventSender<T>, EventReceiver<T>) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, EventReceiver { rx })
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> EventSender<T> {
    /// Returns `false` once the receiving side has been dropped.
    pub fn send(&self, event: T) -> bool {
        self.tx.send(event).is_ok()
    }
}

impl<T> EventReceiver<T> {
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Everything queued right now, without blocking.
    pub fn drain(&self) -> Vec<T> {
        let mut drained = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            drained.push(event);
        }
        drained
    }
}

use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 32;

/// Cloneable publisher of typed notifications.
///
/// Observers call [`Signal::subscribe`] before the event they care about and
/// receive every payload emitted after that point, as immutable clones.
#[derive(Debug)]
pub struct Signal<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Clone> Signal<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Deliver `payload` to current subscribers, returning how many received it.
    /// Emitting with no subscribers is not an error.
    pub fn emit(&self, payload: T) -> usize {
        self.tx.send(payload).unwrap_or(0)
    }

}

impl<T: Clone> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_payload() {
        let signal = Signal::new();
        let mut first = signal.subscribe();
        let mut second = signal.subscribe();

        assert_eq!(signal.emit("done".to_string()), 2);
        assert_eq!(first.recv().await.unwrap(), "done");
        assert_eq!(second.recv().await.unwrap(), "done");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let signal: Signal<u32> = Signal::new();
        assert_eq!(signal.emit(1), 0);

        let rx = signal.subscribe();
        drop(rx);
        assert_eq!(signal.emit(2), 0);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_payloads() {
        let signal = Signal::new();
        signal.emit(1);
        let mut rx = signal.subscribe();
        assert!(rx.try_recv().is_err());
        signal.emit(2);
        assert_eq!(rx.try_recv().unwrap(), 2);
    }
}

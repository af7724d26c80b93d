//! Typed notifications from the simulation to its observers.
//!
//! Observers subscribe once by taking the receiving end of a bounded
//! channel; they never reach into the simulator. High-rate events (ticks,
//! console echo) are sent lossily so a lagging observer can not stall the
//! simulation thread; lifecycle and name-table events are delivered
//! reliably as long as the receiver lives.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use rustyz80_sim::{NameOp, NetId};

/// Bound on in-flight notifications.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A notification from the simulation side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// A run worker started executing half-cycles.
    RunStarted,
    /// The current run finished at the given half-cycle. After observing
    /// this, netlist state is stable until the next run.
    RunStopped(u64),
    /// A half-cycle completed (lossy).
    Tick(u64),
    /// The program wrote a character to the console port (lossy).
    Echo(char),
    /// A name-table operation was applied.
    NameOp {
        /// Which operation.
        op: NameOp,
        /// The name involved (empty for deletes).
        name: String,
        /// The net operated on.
        net: NetId,
    },
}

/// Sending half of the notification channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: SyncSender<SimEvent>,
}

impl EventSink {
    /// Creates a bounded channel and its sink.
    #[must_use]
    pub fn channel() -> (Self, Receiver<SimEvent>) {
        let (tx, rx) = sync_channel(EVENT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Reliable delivery; blocks when the channel is full, silently drops
    /// the event when the receiver is gone.
    pub fn notify(&self, event: SimEvent) {
        let _ = self.tx.send(event);
    }

    /// Lossy delivery for high-rate events: dropped when the channel is
    /// full or the receiver is gone.
    pub fn notify_lossy(&self, event: SimEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            log::trace!("observer lagging, notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (sink, rx) = EventSink::channel();
        sink.notify(SimEvent::RunStarted);
        sink.notify(SimEvent::Tick(1));
        sink.notify(SimEvent::RunStopped(1));
        assert_eq!(rx.recv().unwrap(), SimEvent::RunStarted);
        assert_eq!(rx.recv().unwrap(), SimEvent::Tick(1));
        assert_eq!(rx.recv().unwrap(), SimEvent::RunStopped(1));
    }

    #[test]
    fn lossy_send_drops_when_full() {
        let (sink, rx) = EventSink::channel();
        for h in 0..EVENT_CHANNEL_CAPACITY as u64 + 10 {
            sink.notify_lossy(SimEvent::Tick(h));
        }
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, EVENT_CHANNEL_CAPACITY);
    }

    #[test]
    fn disconnected_receiver_is_tolerated() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.notify(SimEvent::RunStarted);
        sink.notify_lossy(SimEvent::Tick(0));
    }
}

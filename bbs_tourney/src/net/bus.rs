//! Publish/subscribe transport shared by the authority and every client.
//!
//! Delivery is best-effort and at-most-once: a subscriber that falls more
//! than the channel capacity behind loses frames and is told how many, and
//! a publish with no subscribers is simply dropped. There are no sequence
//! numbers; clients recover from gaps with a `tournament-sync`.

use super::{
    errors::{BusError, BusResult},
    messages::WireMessage,
    utils,
};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

/// Default frame buffer per subscriber.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// A tournament message bus.
pub trait Bus: Send + Sync {
    /// Publish to every current subscriber. Returns the receiver count.
    fn publish(&self, message: &WireMessage) -> BusResult<usize>;

    /// Start receiving frames published after this call.
    fn subscribe(&self) -> BusSubscription;
}

/// In-process bus backed by a tokio broadcast channel of JSON frames.
#[derive(Clone, Debug)]
pub struct LocalBus {
    sender: broadcast::Sender<String>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an already-encoded frame.
    pub fn publish_frame(&self, frame: String) -> BusResult<usize> {
        self.sender
            .send(frame)
            .map_err(|_| BusError::NoSubscribers)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl Bus for LocalBus {
    fn publish(&self, message: &WireMessage) -> BusResult<usize> {
        let frame = utils::encode(message)?;
        self.publish_frame(frame)
    }

    fn subscribe(&self) -> BusSubscription {
        BusSubscription {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiving end of a bus.
#[derive(Debug)]
pub struct BusSubscription {
    receiver: broadcast::Receiver<String>,
}

impl BusSubscription {
    /// Next well-formed message. Malformed frames are logged and skipped.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` loop.
    pub async fn recv(&mut self) -> BusResult<WireMessage> {
        loop {
            let frame = self.recv_frame().await?;
            match utils::decode(&frame) {
                Ok(message) => return Ok(message),
                Err(e) => log::warn!("Dropping malformed bus frame: {}", e),
            }
        }
    }

    /// Next raw frame, undecoded.
    pub async fn recv_frame(&mut self) -> BusResult<String> {
        self.receiver.recv().await.map_err(|e| match e {
            RecvError::Lagged(skipped) => BusError::Lagged(skipped),
            RecvError::Closed => BusError::Closed,
        })
    }

    /// Next well-formed message if one is already buffered.
    pub fn try_recv(&mut self) -> BusResult<Option<WireMessage>> {
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => match utils::decode(&frame) {
                    Ok(message) => return Ok(Some(message)),
                    Err(e) => log::warn!("Dropping malformed bus frame: {}", e),
                },
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Lagged(skipped)) => return Err(BusError::Lagged(skipped)),
                Err(TryRecvError::Closed) => return Err(BusError::Closed),
            }
        }
    }
}

/// Publish every message, logging (never retrying) failures.
///
/// Returns how many messages reached at least one subscriber.
pub fn publish_all<B: Bus + ?Sized>(bus: &B, messages: Vec<WireMessage>) -> usize {
    let mut delivered = 0;
    for message in messages {
        match bus.publish(&message) {
            Ok(_) => delivered += 1,
            Err(BusError::NoSubscribers) => {
                log::debug!("No subscribers for {}, dropped", message.kind());
            }
            Err(e) => log::warn!("Failed to publish {}: {}", message.kind(), e),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::{PlayerId, TournamentId};

    fn quit(player: &str) -> WireMessage {
        WireMessage::TournamentQuit {
            tournament_id: TournamentId::from("t1"),
            player: PlayerId::new(player),
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = LocalBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(&quit("ann")).unwrap(), 2);
        assert_eq!(a.recv().await.unwrap(), quit("ann"));
        assert_eq!(b.recv().await.unwrap(), quit("ann"));
    }

    #[tokio::test]
    async fn test_malformed_frames_are_skipped() {
        let bus = LocalBus::new(8);
        let mut sub = bus.subscribe();
        bus.publish_frame("{broken".to_string()).unwrap();
        bus.publish(&quit("bob")).unwrap();
        assert_eq!(sub.recv().await.unwrap(), quit("bob"));
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = LocalBus::new(8);
        assert!(matches!(bus.publish(&quit("ann")), Err(BusError::NoSubscribers)));
        assert_eq!(publish_all(&bus, vec![quit("ann"), quit("bob")]), 0);
    }

    #[test]
    fn test_lagging_subscriber_is_told() {
        let bus = LocalBus::new(2);
        let mut sub = bus.subscribe();
        for name in ["a", "b", "c", "d"] {
            bus.publish(&quit(name)).unwrap();
        }
        assert!(matches!(sub.try_recv(), Err(BusError::Lagged(2))));
        assert_eq!(sub.try_recv().unwrap(), Some(quit("c")));
        assert_eq!(sub.try_recv().unwrap(), Some(quit("d")));
        assert_eq!(sub.try_recv().unwrap(), None);
    }
}

//! Coordinator: the single task that owns BridgeCore. Transport callbacks arrive as events on one
//! queue and are processed in order; resulting actions go to the transport or the send worker.

use acard_core::{Action, BridgeCore, Channel, Event, Notice, PeerId};
use tokio::sync::mpsc;

use crate::worker::SendWorker;

/// Host-side control of a pending peer connection.
pub trait PeerControl: Send + Sync {
    fn authenticate(&self, peer: &PeerId);
    fn accept(&self, peer: &PeerId);
    fn reject(&self, peer: &PeerId);
}

/// Run until every event sender is dropped.
pub async fn run_coordinator<C, P>(
    mut core: BridgeCore<C>,
    mut events: mpsc::UnboundedReceiver<Event<C>>,
    control: P,
    worker: SendWorker,
) where
    C: Channel,
    P: PeerControl,
{
    while let Some(event) = events.recv().await {
        for action in core.on_event(event) {
            perform(action, &control, &worker);
        }
    }
    tracing::debug!("event queue closed; coordinator stopping");
}

fn perform<P: PeerControl>(action: Action, control: &P, worker: &SendWorker) {
    match action {
        Action::Authenticate(peer) => control.authenticate(&peer),
        Action::Accept(peer) => control.accept(&peer),
        Action::Reject(peer) => control.reject(&peer),
        Action::Transmit(frame) => worker.submit(frame),
        // Stands in for the user-facing toast.
        Action::Notify(Notice::ConnectionEstablished) => tracing::info!("connection established"),
        Action::Notify(Notice::ConnectionLost) => tracing::info!("connection lost"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use acard_core::{
        AuthToken, AuthenticationType, ConnectionResult, Credential, Emulator, SessionContext,
        SessionHandle,
    };
    use parking_lot::Mutex;

    use crate::worker::tests::RecordingChannel;

    #[derive(Clone, Default)]
    struct RecordingControl {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl PeerControl for RecordingControl {
        fn authenticate(&self, peer: &PeerId) {
            self.calls.lock().push(format!("authenticate {peer}"));
        }
        fn accept(&self, peer: &PeerId) {
            self.calls.lock().push(format!("accept {peer}"));
        }
        fn reject(&self, peer: &PeerId) {
            self.calls.lock().push(format!("reject {peer}"));
        }
    }

    struct SelectOk;

    impl Emulator for SelectOk {
        fn process(&self, _ctx: &SessionContext, _apdu: &[u8]) -> Vec<u8> {
            vec![0x90, 0x00]
        }
        fn registered_aids(&self, _ctx: &SessionContext) -> Vec<String> {
            vec!["A000000003".into(), " A000000004".into()]
        }
        fn deactivate(&self) {}
    }

    #[tokio::test]
    async fn events_drive_auth_and_responses() {
        let key = Credential::new(vec![4, 5, 6]);
        let session = SessionHandle::new();
        let core = BridgeCore::with_session(session.clone(), Arc::new(SelectOk), Arc::new(key.clone()));
        let (worker, worker_task) = SendWorker::spawn(session);
        let control = RecordingControl::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = tokio::spawn(run_coordinator(core, rx, control.clone(), worker));

        let peer = PeerId::new("watch");
        let channel = RecordingChannel::default();
        tx.send(Event::ConnectionRequested(peer.clone())).unwrap();
        tx.send(Event::AuthenticationResponse {
            peer: peer.clone(),
            token: Some(AuthToken {
                auth_type: AuthenticationType::CertificateX509,
                key,
            }),
            error: 0,
        })
        .unwrap();
        tx.send(Event::ConnectionResponse {
            peer: peer.clone(),
            channel: Some(channel.clone()),
            result: ConnectionResult::Success,
        })
        .unwrap();
        tx.send(Event::FrameReceived(vec![0x64, 0x00, 0xA4, 0x04, 0x00]))
            .unwrap();
        tx.send(Event::FrameReceived(vec![0x61])).unwrap();
        tx.send(Event::FrameReceived(vec![])).unwrap();
        tx.send(Event::FrameReceived(vec![0x7A, 0x01])).unwrap();
        drop(tx);

        coordinator.await.unwrap();
        worker_task.await.unwrap();

        assert_eq!(
            *control.calls.lock(),
            vec!["authenticate watch".to_string(), "accept watch".to_string()]
        );
        let mut aids = vec![0x61];
        aids.extend_from_slice(b"A000000003, A000000004");
        assert_eq!(
            *channel.sent.lock(),
            vec![(104, vec![0x64, 0x90, 0x00]), (104, aids)]
        );
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let session = SessionHandle::<RecordingChannel>::new();
        let core = BridgeCore::with_session(
            session.clone(),
            Arc::new(SelectOk),
            Arc::new(Credential::new(vec![1, 2, 3])),
        );
        let (worker, _worker_task) = SendWorker::spawn(session.clone());
        let control = RecordingControl::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = tokio::spawn(run_coordinator(core, rx, control.clone(), worker));

        let peer = PeerId::new("intruder");
        tx.send(Event::ConnectionRequested(peer.clone())).unwrap();
        tx.send(Event::AuthenticationResponse {
            peer,
            token: Some(AuthToken {
                auth_type: AuthenticationType::CertificateX509,
                key: Credential::new(vec![1, 2, 3, 4]),
            }),
            error: 0,
        })
        .unwrap();
        drop(tx);
        coordinator.await.unwrap();

        assert_eq!(
            *control.calls.lock(),
            vec!["authenticate intruder".to_string(), "reject intruder".to_string()]
        );
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn repeated_auth_response_keeps_link_session_alive() {
        use std::time::Duration;

        use acard_core::ACCESSORY_CHANNEL_ID;

        use crate::link::{self, LinkMessage};
        use crate::transport::LinkTransport;

        let key = Credential::new(vec![4, 5, 6]);
        let session = SessionHandle::new();
        let core = BridgeCore::with_session(session.clone(), Arc::new(SelectOk), Arc::new(key.clone()));
        let (worker, _worker_task) = SendWorker::spawn(session.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = LinkTransport::new(tx);
        tokio::spawn(run_coordinator(core, rx, transport.clone(), worker));

        let (server, mut client) = tokio::io::duplex(4096);
        tokio::spawn(transport.serve(server, PeerId::new("watch")));

        async fn next(client: &mut tokio::io::DuplexStream) -> Option<LinkMessage> {
            link::read_message(client)
                .await
                .unwrap()
                .map(|b| link::decode(&b).unwrap())
        }
        let response = link::encode(&LinkMessage::AuthResponse {
            token: Some(AuthToken {
                auth_type: AuthenticationType::CertificateX509,
                key,
            }),
            error: 0,
        });

        assert_eq!(next(&mut client).await, Some(LinkMessage::AuthChallenge));
        link::write_message(&mut client, &response).await.unwrap();
        assert_eq!(next(&mut client).await, Some(LinkMessage::Accept));

        link::write_message(&mut client, &response).await.unwrap();
        link::write_message(&mut client, &link::data_body(ACCESSORY_CHANNEL_ID, b"d\x00"))
            .await
            .unwrap();
        assert_eq!(
            next(&mut client).await,
            Some(LinkMessage::Data {
                channel_id: ACCESSORY_CHANNEL_ID,
                payload: vec![0x64, 0x90, 0x00],
            })
        );
        assert!(session.is_active());

        drop(client);
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.is_active() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session cleared after peer closed");
    }
}

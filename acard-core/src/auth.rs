//! Authentication gate: per-peer challenge/response state machine.
//!
//! Every attempt ends in exactly one terminal verdict. Anything other than an exact
//! certificate credential match is a rejection.

use std::collections::HashMap;

use crate::identity::{self, Credential};
use crate::protocol::{AuthToken, AuthenticationType, ConnectionResult, PeerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    Authenticating,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Response arrived for a peer that was never challenged.
    NotChallenged,
    MissingCredential,
    UnsupportedType(AuthenticationType),
    CredentialMismatch,
}

/// What the host should do after the transport reports a connection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDecision {
    /// Peer was accepted and the connection is up: establish the session.
    Establish,
    /// Nothing to do (duplicate connection, failure, or a peer that was never accepted).
    Ignore,
}

/// Pure policy: decide on a token against the local credential.
pub fn evaluate(token: Option<&AuthToken>, local: &Credential) -> Verdict {
    let Some(token) = token else {
        return Verdict::Reject(RejectReason::MissingCredential);
    };
    if token.auth_type != AuthenticationType::CertificateX509 {
        return Verdict::Reject(RejectReason::UnsupportedType(token.auth_type));
    }
    if identity::matches(&token.key, local) {
        Verdict::Accept
    } else {
        Verdict::Reject(RejectReason::CredentialMismatch)
    }
}

#[derive(Default)]
pub struct AuthGate {
    attempts: HashMap<PeerId, AuthState>,
}

impl AuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, peer: &PeerId) -> AuthState {
        self.attempts.get(peer).copied().unwrap_or(AuthState::Idle)
    }

    /// Peer asked for a service connection. Starts (or restarts) its attempt; the host must
    /// challenge the peer.
    pub fn on_connection_requested(&mut self, peer: PeerId) {
        self.attempts.insert(peer, AuthState::Authenticating);
    }

    /// Peer answered the challenge. Returns the terminal verdict for this attempt.
    pub fn on_authentication_response(
        &mut self,
        peer: &PeerId,
        token: Option<&AuthToken>,
        local: &Credential,
    ) -> Verdict {
        let verdict = if self.state(peer) == AuthState::Authenticating {
            evaluate(token, local)
        } else {
            Verdict::Reject(RejectReason::NotChallenged)
        };
        let next = match verdict {
            Verdict::Accept => AuthState::Accepted,
            Verdict::Reject(_) => AuthState::Rejected,
        };
        self.attempts.insert(peer.clone(), next);
        verdict
    }

    /// Transport reported the outcome of connection establishment for `peer`.
    pub fn on_connection_response(
        &mut self,
        peer: &PeerId,
        result: ConnectionResult,
    ) -> ConnectionDecision {
        match result {
            ConnectionResult::Success if self.state(peer) == AuthState::Accepted => {
                self.attempts.remove(peer);
                ConnectionDecision::Establish
            }
            ConnectionResult::Success => {
                tracing::warn!(%peer, "connection success for peer that was not accepted");
                ConnectionDecision::Ignore
            }
            ConnectionResult::AlreadyExists => {
                tracing::warn!(%peer, "connection already exists");
                self.attempts.remove(peer);
                ConnectionDecision::Ignore
            }
            ConnectionResult::Failed(code) => {
                tracing::warn!(%peer, code, "connection failed");
                self.attempts.remove(peer);
                ConnectionDecision::Ignore
            }
        }
    }

    /// Forget a rejected attempt once the transport has refused the peer.
    pub fn forget(&mut self, peer: &PeerId) {
        self.attempts.remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert_token(key: &[u8]) -> AuthToken {
        AuthToken {
            auth_type: AuthenticationType::CertificateX509,
            key: Credential::new(key.to_vec()),
        }
    }

    #[test]
    fn exact_match_accepts() {
        let local = Credential::new(vec![1, 2, 3]);
        assert_eq!(evaluate(Some(&cert_token(&[1, 2, 3])), &local), Verdict::Accept);
    }

    #[test]
    fn longer_credential_rejects() {
        let local = Credential::new(vec![1, 2, 3]);
        assert_eq!(
            evaluate(Some(&cert_token(&[1, 2, 3, 4])), &local),
            Verdict::Reject(RejectReason::CredentialMismatch)
        );
    }

    #[test]
    fn wrong_type_rejects_even_with_matching_key() {
        let local = Credential::new(vec![1, 2, 3]);
        let token = AuthToken {
            auth_type: AuthenticationType::Other(0),
            key: local.clone(),
        };
        assert_eq!(
            evaluate(Some(&token), &local),
            Verdict::Reject(RejectReason::UnsupportedType(AuthenticationType::Other(0)))
        );
    }

    #[test]
    fn missing_token_or_empty_local_rejects() {
        let local = Credential::new(vec![1, 2, 3]);
        assert_eq!(
            evaluate(None, &local),
            Verdict::Reject(RejectReason::MissingCredential)
        );
        assert_eq!(
            evaluate(Some(&cert_token(&[])), &Credential::empty()),
            Verdict::Reject(RejectReason::CredentialMismatch)
        );
    }

    #[test]
    fn gate_walks_idle_authenticating_accepted() {
        let mut gate = AuthGate::new();
        let peer = PeerId::new("watch");
        let local = Credential::new(vec![7; 4]);
        assert_eq!(gate.state(&peer), AuthState::Idle);
        gate.on_connection_requested(peer.clone());
        assert_eq!(gate.state(&peer), AuthState::Authenticating);
        let verdict = gate.on_authentication_response(&peer, Some(&cert_token(&[7; 4])), &local);
        assert_eq!(verdict, Verdict::Accept);
        assert_eq!(gate.state(&peer), AuthState::Accepted);
        assert_eq!(
            gate.on_connection_response(&peer, ConnectionResult::Success),
            ConnectionDecision::Establish
        );
        assert_eq!(gate.state(&peer), AuthState::Idle);
    }

    #[test]
    fn response_without_challenge_is_rejected() {
        let mut gate = AuthGate::new();
        let peer = PeerId::new("watch");
        let local = Credential::new(vec![7; 4]);
        let verdict = gate.on_authentication_response(&peer, Some(&cert_token(&[7; 4])), &local);
        assert_eq!(verdict, Verdict::Reject(RejectReason::NotChallenged));
    }

    #[test]
    fn second_response_in_same_attempt_is_rejected() {
        let mut gate = AuthGate::new();
        let peer = PeerId::new("watch");
        let local = Credential::new(vec![7; 4]);
        gate.on_connection_requested(peer.clone());
        assert_eq!(
            gate.on_authentication_response(&peer, Some(&cert_token(&[7; 4])), &local),
            Verdict::Accept
        );
        assert_eq!(
            gate.on_authentication_response(&peer, Some(&cert_token(&[7; 4])), &local),
            Verdict::Reject(RejectReason::NotChallenged)
        );
    }

    #[test]
    fn success_for_rejected_peer_is_ignored() {
        let mut gate = AuthGate::new();
        let peer = PeerId::new("watch");
        gate.on_connection_requested(peer.clone());
        gate.on_authentication_response(&peer, None, &Credential::new(vec![1]));
        assert_eq!(gate.state(&peer), AuthState::Rejected);
        assert_eq!(
            gate.on_connection_response(&peer, ConnectionResult::Success),
            ConnectionDecision::Ignore
        );
    }

    #[test]
    fn already_exists_is_ignored() {
        let mut gate = AuthGate::new();
        let peer = PeerId::new("watch");
        let local = Credential::new(vec![7; 4]);
        gate.on_connection_requested(peer.clone());
        gate.on_authentication_response(&peer, Some(&cert_token(&[7; 4])), &local);
        assert_eq!(
            gate.on_connection_response(&peer, ConnectionResult::AlreadyExists),
            ConnectionDecision::Ignore
        );
    }
}

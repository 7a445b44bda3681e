//! Session gate over the external identity provider.
//!
//! The gate turns the provider's callback-based identity-changed stream into
//! a snapshot-plus-subscription surface: `current_identity` reads the latest
//! value, `watch_identity` hands out a cancellable subscription. Events are
//! applied in delivery order by the provider's synchronous listener; the
//! current identity is replaced wholesale each time.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::ports::{
    Identity, IdentityProvider, IdentityProviderError, IdentitySubscription,
};

/// Wrapper exposing the identity provider to the rest of the domain.
pub struct SessionGate {
    provider: Arc<dyn IdentityProvider>,
    identity: Arc<watch::Sender<Option<Arc<dyn Identity>>>>,
    _subscription: IdentitySubscription,
}

impl SessionGate {
    /// Wrap a provider, seed the snapshot, and subscribe to change events.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let identity = Arc::new(watch::channel(provider.current_identity()).0);
        let listener_identity = Arc::clone(&identity);
        let subscription = provider.on_identity_changed(Box::new(move |next| {
            listener_identity.send_replace(next);
        }));
        Self {
            provider,
            identity,
            _subscription: subscription,
        }
    }

    /// Snapshot of the current identity, if any.
    #[must_use]
    pub fn current_identity(&self) -> Option<Arc<dyn Identity>> {
        self.identity.borrow().clone()
    }

    /// Subscribe to identity changes; dropping the receiver cancels.
    #[must_use]
    pub fn watch_identity(&self) -> watch::Receiver<Option<Arc<dyn Identity>>> {
        self.identity.subscribe()
    }

    /// Run the provider's interactive sign-in flow.
    ///
    /// # Errors
    ///
    /// [`IdentityProviderError::SignInCancelled`] when the user dismisses
    /// the flow; provider faults otherwise.
    pub async fn sign_in(&self) -> Result<Arc<dyn Identity>, IdentityProviderError> {
        self.provider.sign_in().await
    }

    /// Terminate the current session.
    ///
    /// # Errors
    ///
    /// Propagates provider faults.
    pub async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        self.provider.sign_out().await
    }

    /// Fetch a bearer token for the current identity.
    ///
    /// Tokens are never cached here; every call is a fresh provider round
    /// trip. Pass `force_refresh` when the token gates a privileged request.
    ///
    /// # Errors
    ///
    /// [`IdentityProviderError::NotSignedIn`] without an identity; token
    /// minting faults otherwise.
    pub async fn bearer_token(
        &self,
        force_refresh: bool,
    ) -> Result<String, IdentityProviderError> {
        let identity = self
            .current_identity()
            .ok_or_else(IdentityProviderError::not_signed_in)?;
        identity.bearer_token(force_refresh).await
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ports::{
        FixtureIdentity, FixtureIdentityProvider, MockIdentityProvider,
    };

    #[tokio::test]
    async fn cancelled_sign_in_surfaces_the_benign_error() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_current_identity().return_const(None);
        provider
            .expect_on_identity_changed()
            .returning(|_| IdentitySubscription::detached());
        provider
            .expect_sign_in()
            .returning(|| Err(IdentityProviderError::sign_in_cancelled()));

        let gate = SessionGate::new(Arc::new(provider));
        let error = gate.sign_in().await.expect_err("cancelled sign-in");
        assert_eq!(error, IdentityProviderError::sign_in_cancelled());
    }

    #[tokio::test]
    async fn gate_tracks_provider_emissions_in_order() {
        let provider = FixtureIdentityProvider::new();
        let gate = SessionGate::new(Arc::new(provider.clone()));
        assert!(gate.current_identity().is_none());

        provider.emit(Some(Arc::new(FixtureIdentity::new("a@b.c", "t1"))));
        assert_eq!(
            gate.current_identity().map(|identity| identity.email()),
            Some("a@b.c".to_owned())
        );

        provider.emit(None);
        assert!(gate.current_identity().is_none());
    }

    #[tokio::test]
    async fn watch_subscription_observes_changes() {
        let provider = FixtureIdentityProvider::new();
        let gate = SessionGate::new(Arc::new(provider.clone()));
        let mut watched = gate.watch_identity();

        provider.emit(Some(Arc::new(FixtureIdentity::new("a@b.c", "t1"))));
        watched.changed().await.expect("sender alive");
        assert!(watched.borrow_and_update().is_some());
    }

    #[tokio::test]
    async fn bearer_token_requires_a_signed_in_identity() {
        let gate = SessionGate::new(Arc::new(FixtureIdentityProvider::new()));
        let error = gate.bearer_token(true).await.expect_err("no identity");
        assert_eq!(error, IdentityProviderError::not_signed_in());
    }

    #[tokio::test]
    async fn bearer_token_reaches_the_current_identity() {
        let provider = FixtureIdentityProvider::new();
        let gate = SessionGate::new(Arc::new(provider.clone()));
        provider.emit(Some(Arc::new(FixtureIdentity::new("a@b.c", "fresh"))));

        let token = gate.bearer_token(true).await.expect("token");
        assert_eq!(token, "fresh");
    }

    #[tokio::test]
    async fn sign_in_flows_through_the_provider() {
        let provider = FixtureIdentityProvider::new();
        let gate = SessionGate::new(Arc::new(provider.clone()));

        let identity = gate.sign_in().await.expect("fixture sign-in");
        assert_eq!(identity.email(), "fixture@ledgerlift.dev");
        assert!(gate.current_identity().is_some());

        gate.sign_out().await.expect("fixture sign-out");
        assert!(gate.current_identity().is_none());
    }
}

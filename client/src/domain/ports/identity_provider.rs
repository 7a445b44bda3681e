//! Driven port for the external identity provider.
//!
//! The provider owns sign-in, sign-out, and token minting. The domain only
//! ever holds the current identity as an opaque handle that is replaced
//! wholesale on every identity-changed event; nothing is diffed or persisted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced while talking to the identity provider.
    pub enum IdentityProviderError {
        /// No identity is currently signed in.
        NotSignedIn => "no identity is signed in",
        /// The user dismissed the interactive sign-in flow. Non-fatal.
        SignInCancelled => "sign-in was dismissed before completing",
        /// A bearer token could not be minted or refreshed.
        TokenRefresh { message: String } =>
            "bearer token refresh failed: {message}",
        /// The provider failed outside the flows above.
        Provider { message: String } =>
            "identity provider failure: {message}",
    }
}

/// Opaque authenticated-user handle issued by the identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Identity: Send + Sync {
    /// Email attached to the identity. May be empty.
    fn email(&self) -> String;

    /// Mint a bearer token for a privileged request.
    ///
    /// Every call is a fresh round trip to the provider; tokens are never
    /// cached by this layer. `force_refresh` trades one extra round trip for
    /// not sending a token minted on a multi-second-old page load.
    async fn bearer_token(&self, force_refresh: bool)
    -> Result<String, IdentityProviderError>;
}

impl std::fmt::Debug for dyn Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Identity")
    }
}

/// Callback invoked with the replacement identity on every change event.
pub type IdentityListener = Box<dyn Fn(Option<Arc<dyn Identity>>) + Send + Sync>;

/// Guard for an identity-changed registration; dropping it unsubscribes.
pub struct IdentitySubscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl IdentitySubscription {
    /// Wrap the provider-specific unsubscribe action.
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription with no unsubscribe action, for providers whose
    /// registrations live as long as the provider itself.
    #[must_use]
    pub fn detached() -> Self {
        Self { cancel: None }
    }
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Port for the external identity provider.
///
/// Listeners registered through [`IdentityProvider::on_identity_changed`]
/// must be invoked in registration order, synchronously with each event, so
/// downstream snapshots observe events in the order the provider delivered
/// them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Snapshot of the currently signed-in identity, if any.
    fn current_identity(&self) -> Option<Arc<dyn Identity>>;

    /// Run the interactive sign-in flow.
    ///
    /// Dismissal by the user yields
    /// [`IdentityProviderError::SignInCancelled`], which callers treat as a
    /// benign outcome rather than a fault.
    async fn sign_in(&self) -> Result<Arc<dyn Identity>, IdentityProviderError>;

    /// Terminate the current session.
    async fn sign_out(&self) -> Result<(), IdentityProviderError>;

    /// Register a listener for identity-changed events.
    fn on_identity_changed(&self, listener: IdentityListener) -> IdentitySubscription;
}

/// Identity fixture with a fixed email and token.
#[derive(Debug, Clone)]
pub struct FixtureIdentity {
    email: String,
    token: String,
}

impl FixtureIdentity {
    /// Build a fixture identity from its email and bearer token.
    pub fn new(email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Identity for FixtureIdentity {
    fn email(&self) -> String {
        self.email.clone()
    }

    async fn bearer_token(
        &self,
        _force_refresh: bool,
    ) -> Result<String, IdentityProviderError> {
        Ok(self.token.clone())
    }
}

#[derive(Default)]
struct FixtureProviderState {
    current: Mutex<Option<Arc<dyn Identity>>>,
    listeners: Mutex<Vec<(u64, IdentityListener)>>,
    next_listener: AtomicU64,
}

/// In-memory provider fixture.
///
/// `sign_in` installs a fixed identity, `sign_out` clears it, and
/// [`FixtureIdentityProvider::emit`] lets tests drive arbitrary
/// identity-changed events.
#[derive(Clone, Default)]
pub struct FixtureIdentityProvider {
    state: Arc<FixtureProviderState>,
}

impl FixtureIdentityProvider {
    /// Build an empty provider with no signed-in identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current identity and notify listeners in registration
    /// order, on the emitting thread.
    pub fn emit(&self, identity: Option<Arc<dyn Identity>>) {
        if let Ok(mut current) = self.state.current.lock() {
            *current = identity.clone();
        }
        if let Ok(listeners) = self.state.listeners.lock() {
            for (_, listener) in listeners.iter() {
                listener(identity.clone());
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for FixtureIdentityProvider {
    fn current_identity(&self) -> Option<Arc<dyn Identity>> {
        self.state
            .current
            .lock()
            .map(|current| current.clone())
            .unwrap_or_default()
    }

    async fn sign_in(&self) -> Result<Arc<dyn Identity>, IdentityProviderError> {
        let identity: Arc<dyn Identity> =
            Arc::new(FixtureIdentity::new("fixture@ledgerlift.dev", "fixture-token"));
        self.emit(Some(Arc::clone(&identity)));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        self.emit(None);
        Ok(())
    }

    fn on_identity_changed(&self, listener: IdentityListener) -> IdentitySubscription {
        let id = self.state.next_listener.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.state.listeners.lock() {
            listeners.push((id, listener));
        }
        let state: Weak<FixtureProviderState> = Arc::downgrade(&self.state);
        IdentitySubscription::new(move || {
            if let Some(state) = state.upgrade() {
                if let Ok(mut listeners) = state.listeners.lock() {
                    listeners.retain(|(key, _)| *key != id);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn fixture_sign_in_installs_identity_and_notifies() {
        let provider = FixtureIdentityProvider::new();
        let seen: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = provider.on_identity_changed(Box::new(move |identity| {
            sink.lock().expect("seen mutex").push(identity.is_some());
        }));

        let identity = provider.sign_in().await.expect("fixture sign-in");
        assert_eq!(identity.email(), "fixture@ledgerlift.dev");
        provider.sign_out().await.expect("fixture sign-out");

        assert_eq!(*seen.lock().expect("seen mutex"), vec![true, false]);
        assert!(provider.current_identity().is_none());
    }

    #[tokio::test]
    async fn dropping_subscription_stops_delivery() {
        let provider = FixtureIdentityProvider::new();
        let seen: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let subscription = provider.on_identity_changed(Box::new(move |_| {
            *sink.lock().expect("seen mutex") += 1;
        }));

        provider.emit(None);
        drop(subscription);
        provider.emit(None);

        assert_eq!(*seen.lock().expect("seen mutex"), 1);
    }

    #[tokio::test]
    async fn fixture_identity_returns_token_for_both_refresh_modes() {
        let identity = FixtureIdentity::new("a@b.c", "tok");
        assert_eq!(identity.bearer_token(true).await.expect("token"), "tok");
        assert_eq!(identity.bearer_token(false).await.expect("token"), "tok");
    }
}

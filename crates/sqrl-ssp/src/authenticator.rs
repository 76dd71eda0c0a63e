//! The host-integration seam.
//!
//! The SSP core never touches the site's user accounts directly. Everything
//! account-shaped goes through the [`Authenticator`] trait, injected at
//! engine construction; this keeps the protocol engine testable with
//! in-memory fakes and the site free to store accounts however it likes.

use sqrl_proto::{Ask, SqrlIdentity};

/// An error surfaced by the host while mutating its account state.
#[derive(Debug, thiserror::Error)]
#[error("host integration error: {0}")]
pub struct HostError(pub String);

/// What the host site must provide.
pub trait Authenticator: Send + Sync {
    /// A `ident` or `enable` just authenticated this identity; choose the
    /// post-login landing URL for the browser (or the CPS client) to open.
    fn authenticate_identity(&self, identity: &SqrlIdentity) -> String;

    /// An `ident` arrived carrying a `pidk` that matches `previous`: the
    /// user rekeyed. Transfer account ownership to `next`.
    fn swap_identities(
        &self,
        previous: &SqrlIdentity,
        next: &SqrlIdentity,
    ) -> Result<(), HostError>;

    /// An `urs`-verified `remove` arrived; sever this identity from its
    /// account.
    fn remove_identity(&self, identity: &SqrlIdentity) -> Result<(), HostError>;

    /// A `query` arrived; optionally return a prompt to show the user
    /// before they commit to `ident`.
    fn ask_response(&self, identity: &SqrlIdentity) -> Option<Ask>;
}

/// A minimal authenticator that sends everyone to one URL.
///
/// Keeps the bundled binary useful on its own: no interstitials, no account
/// linkage, just a fixed success redirect. Real sites implement
/// [`Authenticator`] themselves.
pub struct RedirectAuthenticator {
    success_url: String,
}

impl RedirectAuthenticator {
    pub fn new(success_url: impl Into<String>) -> Self {
        Self {
            success_url: success_url.into(),
        }
    }
}

impl Authenticator for RedirectAuthenticator {
    fn authenticate_identity(&self, _identity: &SqrlIdentity) -> String {
        self.success_url.clone()
    }

    fn swap_identities(
        &self,
        _previous: &SqrlIdentity,
        _next: &SqrlIdentity,
    ) -> Result<(), HostError> {
        Ok(())
    }

    fn remove_identity(&self, _identity: &SqrlIdentity) -> Result<(), HostError> {
        Ok(())
    }

    fn ask_response(&self, _identity: &SqrlIdentity) -> Option<Ask> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_authenticator() {
        let auth = RedirectAuthenticator::new("https://example.com/dashboard");
        let identity = SqrlIdentity::default();
        assert_eq!(
            auth.authenticate_identity(&identity),
            "https://example.com/dashboard"
        );
        assert!(auth.ask_response(&identity).is_none());
        assert!(auth.swap_identities(&identity, &identity).is_ok());
        assert!(auth.remove_identity(&identity).is_ok());
    }
}

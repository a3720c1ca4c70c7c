//! Email + code login flow.
//!
//! Two steps: send a challenge code to an email, then verify the code the
//! user typed. Auth errors are returned to the caller (the presentation
//! layer shows them as an alert); the flow resets its own pending input so
//! the user can immediately retry.

use std::sync::Arc;

use agora_store::{Identity, StoreClient, StoreError};

/// Two-step login flow over an injected store handle.
pub struct LoginFlow {
    store: Arc<dyn StoreClient>,
    /// Email a challenge is in flight for.
    pending: Option<String>,
}

impl LoginFlow {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self {
            store,
            pending: None,
        }
    }

    /// Email awaiting code entry, if a challenge was sent.
    pub fn pending_email(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Send a login code to the given email.
    ///
    /// On failure the pending email resets so the user retypes from
    /// scratch.
    pub async fn send_code(&mut self, email: &str) -> Result<(), StoreError> {
        match self.store.send_login_challenge(email).await {
            Ok(()) => {
                self.pending = Some(email.to_string());
                Ok(())
            }
            Err(err) => {
                log::warn!("login challenge failed for {email}: {err}");
                self.pending = None;
                Err(err)
            }
        }
    }

    /// Verify the code the user typed.
    ///
    /// On a wrong code the challenge email stays pending — only the code
    /// input resets, and the user may try again.
    pub async fn verify(&mut self, code: &str) -> Result<Identity, StoreError> {
        let Some(email) = self.pending.clone() else {
            return Err(StoreError::Auth("no login challenge in flight".into()));
        };
        match self.store.complete_login(&email, code).await {
            Ok(identity) => {
                self.pending = None;
                Ok(identity)
            }
            Err(err) => {
                log::warn!("login verification failed for {email}: {err}");
                Err(err)
            }
        }
    }

    /// Abandon the current challenge.
    pub fn reset(&mut self) {
        self.pending = None;
    }
}

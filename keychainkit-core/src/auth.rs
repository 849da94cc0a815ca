//! Authentication contexts threaded through keychain calls.
//!
//! An [`AuthContext`] stands in for a platform authentication session
//! (`LAContext` on Apple platforms). It is created and owned by the caller and
//! may be reused across calls; clones refer to the same session, so a backend
//! that honors session reuse will not prompt twice for a context that already
//! satisfied a challenge.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Whether a context may present user-facing authentication UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interaction {
    /// The service may prompt for biometry or passcode.
    Allowed,
    /// The service must fail instead of prompting.
    NotAllowed,
}

/// Opaque handle to a reusable authentication session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    session: u64,
    interaction: Interaction,
    localized_reason: Option<String>,
}

impl AuthContext {
    /// A fresh session that may prompt the user.
    #[must_use]
    pub fn interactive() -> Self {
        Self::with_interaction(Interaction::Allowed)
    }

    /// A fresh session that never prompts. Protected items yield
    /// "interaction not allowed" instead of a prompt.
    #[must_use]
    pub fn non_interactive() -> Self {
        Self::with_interaction(Interaction::NotAllowed)
    }

    fn with_interaction(interaction: Interaction) -> Self {
        Self {
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            interaction,
            localized_reason: None,
        }
    }

    /// Sets the reason shown in the authentication prompt.
    #[must_use]
    pub fn with_localized_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.localized_reason = Some(reason.into());
        self
    }

    /// Identity of the underlying session. Shared by clones.
    #[must_use]
    pub const fn session(&self) -> u64 {
        self.session
    }

    /// The interaction mode of this session.
    #[must_use]
    pub const fn interaction(&self) -> Interaction {
        self.interaction
    }

    /// Shorthand for `interaction() == Interaction::Allowed`.
    #[must_use]
    pub const fn interaction_allowed(&self) -> bool {
        matches!(self.interaction, Interaction::Allowed)
    }

    /// The prompt reason, if one was set.
    #[must_use]
    pub fn localized_reason(&self) -> Option<&str> {
        self.localized_reason.as_deref()
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Builds a throwaway context that is guaranteed not to prompt.
///
/// Used by existence checks so they never have user-visible side effects.
#[must_use]
pub fn non_interactive_context() -> AuthContext {
    AuthContext::non_interactive()
}

use keycard_core::{
    ApiKey, SessionToken, API_KEY_NOT_VALID, API_KEY_REQUIRED, SESSION_NOT_PARSEABLE,
    SESSION_REQUIRED,
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Session,
    ApiKey,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => write!(f, "serialized_did_session"),
            Self::ApiKey => write!(f, "apikey"),
        }
    }
}

/// Outcome of a field's asynchronous refinement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Check {
    /// Nothing to check, the field is empty
    #[default]
    Unchecked,
    /// Waiting for the debounce window or the predicate
    Pending,
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldState<T> {
    pub(crate) value: Option<T>,
    pub(crate) dirty: bool,
    pub(crate) touched: bool,
    pub(crate) check: Check,
}

impl<T> Default for FieldState<T> {
    fn default() -> Self {
        Self {
            value: None,
            dirty: false,
            touched: false,
            check: Check::Unchecked,
        }
    }
}

impl<T> FieldState<T> {
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn check(&self) -> Check {
        self.check
    }

    /// Present and refined
    pub fn is_valid(&self) -> bool {
        self.value.is_some() && self.check == Check::Passed
    }
}

/// The two correlated fields of the authenticate form
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub(crate) session: FieldState<SessionToken>,
    pub(crate) api_key: FieldState<ApiKey>,
}

impl FormState {
    pub fn session(&self) -> &FieldState<SessionToken> {
        &self.session
    }

    pub fn api_key(&self) -> &FieldState<ApiKey> {
        &self.api_key
    }

    /// Presence-only schema
    pub fn schema_valid(&self) -> bool {
        self.session.value.is_some() && self.api_key.value.is_some()
    }

    /// Schema plus both refinements. Gates the submit action.
    pub fn is_valid(&self) -> bool {
        self.schema_valid()
            && self.session.check == Check::Passed
            && self.api_key.check == Check::Passed
    }

    /// A key cannot be entered before a session exists and has not been rejected.
    pub fn api_key_enabled(&self) -> bool {
        self.session.value.is_some() && self.session.check != Check::Failed
    }

    /// What the session input displays, prefix included
    pub fn session_display(&self) -> String {
        self.session
            .value
            .as_ref()
            .map(SessionToken::to_header)
            .unwrap_or_default()
    }

    /// Inline message for a field, if it has one to show
    pub fn error(&self, field: Field) -> Option<&'static str> {
        let (present, interacted, check, required, invalid) = match field {
            Field::Session => (
                self.session.value.is_some(),
                self.session.dirty || self.session.touched,
                self.session.check,
                SESSION_REQUIRED,
                SESSION_NOT_PARSEABLE,
            ),
            Field::ApiKey => (
                self.api_key.value.is_some(),
                self.api_key.dirty || self.api_key.touched,
                self.api_key.check,
                API_KEY_REQUIRED,
                API_KEY_NOT_VALID,
            ),
        };

        if !present {
            return interacted.then_some(required);
        }
        (check == Check::Failed).then_some(invalid)
    }
}

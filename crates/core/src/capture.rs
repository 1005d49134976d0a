//! Out-of-band card number capture.
//!
//! The model asks for a card number through `get_credit_card_number`; the
//! reply moves the caller into a keypad prompt the model cannot observe and
//! transfers the collected digits to a separate callback. That callback parks
//! the value in the [`CaptureVault`] under the caller's [`CallId`] until the
//! payment step takes it out again.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::descriptor::{
    CallbackBase, DigitPrompt, FunctionAction, FunctionResult, SwmlDocument, SwmlInstruction,
    CAPTURE_COMPLETE,
};
use crate::errors::DomainError;
use crate::prompt::{CAPTURE_ACKNOWLEDGEMENT, SECURE_ENTRY_ANNOUNCEMENT};

pub const MAX_CARD_DIGITS: u8 = 16;

const UNSCOPED_CALL: &str = "unscoped";
const DIGIT_WORDS: [&str; 10] =
    ["one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "zero"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Slot used when the runtime did not identify the call.
    pub fn unscoped() -> Self {
        Self(UNSCOPED_CALL.to_string())
    }

    pub fn is_unscoped(&self) -> bool {
        self.0 == UNSCOPED_CALL
    }

    /// First non-blank candidate wins.
    pub fn resolve<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        candidates
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|candidate| !candidate.is_empty())
            .map(Self::new)
            .unwrap_or_else(Self::unscoped)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
pub struct CardNumber(SecretString);

impl CardNumber {
    pub fn parse(raw: Option<&str>) -> Result<Self, DomainError> {
        let value = raw.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(DomainError::MissingField("prompt_value"));
        }
        Ok(Self(SecretString::from(value.to_string())))
    }

    /// Everything but the last four characters replaced with `*`.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.expose_secret().chars().collect();
        let visible = if chars.len() > 4 { 4 } else { 0 };
        let hidden = chars.len() - visible;
        let mut masked = "*".repeat(hidden);
        masked.extend(&chars[hidden..]);
        masked
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CardNumber([REDACTED])")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    pub max_digits: u8,
    pub initial_timeout_secs: u32,
    pub ttl_secs: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self { max_digits: MAX_CARD_DIGITS, initial_timeout_secs: 10, ttl_secs: 900 }
    }
}

/// Reply to `get_credit_card_number`. The digits are never part of it.
pub fn capture_instruction(base: &CallbackBase, settings: &CaptureSettings) -> FunctionResult {
    let prompt = DigitPrompt {
        play: "silence: 1".to_string(),
        speech_language: "en-US".to_string(),
        max_digits: settings.max_digits.min(MAX_CARD_DIGITS),
        initial_timeout: settings.initial_timeout_secs,
        speech_hints: DIGIT_WORDS.iter().map(ToString::to_string).collect(),
    };
    let collection = SwmlDocument::new(vec![
        SwmlInstruction::Prompt(prompt),
        SwmlInstruction::Transfer(base.endpoint(CAPTURE_COMPLETE)),
    ]);

    FunctionResult::reply(CAPTURE_ACKNOWLEDGEMENT)
        .with_action(FunctionAction::Say(SECURE_ENTRY_ANNOUNCEMENT.to_string()))
        .with_action(FunctionAction::Swml(collection))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureReceipt {
    pub replaced_previous: bool,
}

/// Validates and stores the collected value. On error the vault is untouched.
pub fn complete_capture(
    vault: &CaptureVault,
    call_id: CallId,
    raw: Option<&str>,
) -> Result<CaptureReceipt, DomainError> {
    let card = CardNumber::parse(raw)?;
    let replaced_previous = vault.store(call_id, card);
    Ok(CaptureReceipt { replaced_previous })
}

struct StoredCard {
    card: CardNumber,
    captured_at: DateTime<Utc>,
}

/// Call-scoped hand-off between the capture callback and payment submission.
pub struct CaptureVault {
    entries: Mutex<HashMap<CallId, StoredCard>>,
    ttl: Duration,
}

impl CaptureVault {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    /// Returns true when an earlier value for the same call was overwritten.
    pub fn store(&self, call_id: CallId, card: CardNumber) -> bool {
        let stored = StoredCard { card, captured_at: Utc::now() };
        self.lock().insert(call_id, stored).is_some()
    }

    /// Removes and returns the card stored under exactly `call_id`. The
    /// unscoped slot is only reachable from unscoped callbacks. Expired
    /// values are dropped, never returned.
    pub fn take(&self, call_id: &CallId) -> Option<CardNumber> {
        let stored = self.lock().remove(call_id)?;
        if self.is_expired(&stored, Utc::now()) {
            return None;
        }
        Some(stored.card)
    }

    /// Puts a taken card back under `call_id` unless a newer capture
    /// arrived in the meantime.
    pub fn restore(&self, call_id: CallId, card: CardNumber) {
        self.lock().entry(call_id).or_insert(StoredCard { card, captured_at: Utc::now() });
    }

    pub fn discard(&self, call_id: &CallId) -> bool {
        self.lock().remove(call_id).is_some()
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, stored| !self.is_expired(stored, now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, stored: &StoredCard, now: DateTime<Utc>) -> bool {
        match (now - stored.captured_at).to_std() {
            Ok(age) => age >= self.ttl,
            Err(_) => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallId, StoredCard>> {
        match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for CaptureVault {
    fn default() -> Self {
        Self::new(Duration::from_secs(CaptureSettings::default().ttl_secs))
    }
}

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, REDACTED};
use crate::balance::AccountNumber;
use crate::capture::{CallId, CaptureVault, CardNumber};
use crate::errors::{ApplicationError, DomainError};

pub const PAYMENT_ACCEPTED_RESPONSE: &str = "success";
pub const CARD_MISSING_RESPONSE: &str = "error: credit card number not found or not valid";
pub const PAYMENT_DECLINED_RESPONSE: &str =
    "error: the payment could not be processed, please try again";

const AUDIT_ACTOR: &str = "payment-service";

/// Identity and card details supplied by the model for one submission.
/// Format checks (expiry in the future, CVV length) are left to the agent.
#[derive(Clone)]
pub struct PaymentRequest {
    pub first_name: String,
    pub last_name: String,
    pub account_number: AccountNumber,
    card_verification_value: SecretString,
    pub expiration_date: String,
}

impl PaymentRequest {
    pub fn new(
        first_name: Option<&str>,
        last_name: Option<&str>,
        account_number: Option<&str>,
        card_verification_value: Option<&str>,
        expiration_date: Option<&str>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            first_name: required("first_name", first_name)?,
            last_name: required("last_name", last_name)?,
            account_number: AccountNumber::parse(account_number)?,
            card_verification_value: SecretString::from(required(
                "card_verification_value",
                card_verification_value,
            )?),
            expiration_date: required("expiration_date", expiration_date)?,
        })
    }

    pub fn card_verification_value(&self) -> &str {
        self.card_verification_value.expose_secret()
    }
}

impl fmt::Debug for PaymentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("account_number", &self.account_number)
            .field("card_verification_value", &REDACTED)
            .field("expiration_date", &self.expiration_date)
            .finish()
    }
}

fn required(field: &'static str, value: Option<&str>) -> Result<String, DomainError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(DomainError::MissingField(field));
    }
    Ok(value.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub confirmation_id: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn charge(
        &self,
        request: &PaymentRequest,
        card: &CardNumber,
    ) -> Result<PaymentReceipt, ApplicationError>;
}

/// Accepts every charge. No processor is integrated.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatedPaymentProcessor;

#[async_trait]
impl PaymentProcessor for SimulatedPaymentProcessor {
    async fn charge(
        &self,
        _request: &PaymentRequest,
        _card: &CardNumber,
    ) -> Result<PaymentReceipt, ApplicationError> {
        let confirmation_id = format!("SIM-{}", &Uuid::new_v4().simple().to_string()[..12]);
        Ok(PaymentReceipt { confirmation_id })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Accepted(PaymentReceipt),
    CardMissing,
    /// The processor refused or failed. The card stays captured for a retry.
    Declined,
}

impl PaymentOutcome {
    pub fn response_text(&self) -> &'static str {
        match self {
            Self::Accepted(_) => PAYMENT_ACCEPTED_RESPONSE,
            Self::CardMissing => CARD_MISSING_RESPONSE,
            Self::Declined => PAYMENT_DECLINED_RESPONSE,
        }
    }
}

pub struct PaymentService {
    vault: Arc<CaptureVault>,
    processor: Arc<dyn PaymentProcessor>,
    audit: Arc<dyn AuditSink>,
}

impl PaymentService {
    pub fn new(
        vault: Arc<CaptureVault>,
        processor: Arc<dyn PaymentProcessor>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { vault, processor, audit }
    }

    /// Consumes the card captured for `call_id` and charges it. A missing
    /// capture or a failed charge is a soft outcome the agent can relay; a
    /// failed charge puts the card back so the caller can retry.
    pub async fn submit(
        &self,
        call_id: &CallId,
        request: PaymentRequest,
        correlation_id: &str,
    ) -> Result<PaymentOutcome, ApplicationError> {
        let Some(card) = self.vault.take(call_id) else {
            warn!(
                event_name = "payment.card_missing",
                correlation_id = %correlation_id,
                call_id = %call_id,
                account_number = %request.account_number.as_str(),
                "payment submitted without a captured card number"
            );
            self.audit.emit(
                self.audit_event(call_id, correlation_id, &request, AuditOutcome::Rejected)
                    .with_metadata("reason", "card_missing"),
            );
            return Ok(PaymentOutcome::CardMissing);
        };

        match self.processor.charge(&request, &card).await {
            Ok(receipt) => {
                info!(
                    event_name = "payment.processed",
                    correlation_id = %correlation_id,
                    call_id = %call_id,
                    account_number = %request.account_number.as_str(),
                    card = %card.masked(),
                    confirmation_id = %receipt.confirmation_id,
                    "processing payment for {} {}",
                    request.first_name,
                    request.last_name
                );
                self.audit.emit(
                    self.audit_event(call_id, correlation_id, &request, AuditOutcome::Success)
                        .with_metadata("card", card.masked())
                        .with_metadata("confirmation_id", receipt.confirmation_id.clone()),
                );
                Ok(PaymentOutcome::Accepted(receipt))
            }
            Err(error) => {
                warn!(
                    event_name = "payment.declined",
                    correlation_id = %correlation_id,
                    call_id = %call_id,
                    account_number = %request.account_number.as_str(),
                    card = %card.masked(),
                    error = %error,
                    "payment processor rejected the charge"
                );
                self.audit.emit(
                    self.audit_event(call_id, correlation_id, &request, AuditOutcome::Failed)
                        .with_metadata("card", card.masked())
                        .with_metadata("reason", error.to_string()),
                );
                self.vault.restore(call_id.clone(), card);
                Ok(PaymentOutcome::Declined)
            }
        }
    }

    fn audit_event(
        &self,
        call_id: &CallId,
        correlation_id: &str,
        request: &PaymentRequest,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(
            call_id.clone(),
            correlation_id,
            "payment.submitted",
            AuditCategory::Payment,
            AUDIT_ACTOR,
            outcome,
        )
        .with_metadata("first_name", request.first_name.clone())
        .with_metadata("last_name", request.last_name.clone())
        .with_metadata("account_number", request.account_number.as_str())
        .with_metadata("card_verification_value", REDACTED)
        .with_metadata("expiration_date", request.expiration_date.clone())
    }
}

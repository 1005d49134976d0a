//! Callback endpoints invoked by the voice runtime during a call.
//!
//! Every handler answers with a function-result document the agent can relay,
//! except `/cc_digits`, which the runtime calls from the non-LLM capture step
//! and which only ever answers `ok` or a plain-text validation error.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{header::HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};
use uuid::Uuid;
use voicepay_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use voicepay_core::balance::{AccountNumber, BalanceLookup};
use voicepay_core::capture::{
    capture_instruction, complete_capture, CallId, CaptureSettings, CaptureVault,
};
use voicepay_core::descriptor::{
    AgentDescriptor, FunctionResult, SwmlDocument, CAPTURE_COMPLETE, GET_CREDIT_CARD_NUMBER,
    GET_CUSTOMER_BALANCE, POST_PROMPT_ENDPOINT, SUBMIT_PAYMENT,
};
use voicepay_core::errors::{ApplicationError, DomainError, InterfaceError};
use voicepay_core::payment::{PaymentProcessor, PaymentRequest, PaymentService};
use voicepay_db::BalanceRepository;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const CARD_NOT_PROVIDED: &str = "a credit card number was not provided";

const AUDIT_ACTOR: &str = "swaig-webhook";

#[derive(Clone)]
pub struct WebhookState {
    descriptor: Arc<AgentDescriptor>,
    capture: CaptureSettings,
    vault: Arc<CaptureVault>,
    balances: Arc<dyn BalanceRepository>,
    payments: Arc<PaymentService>,
    audit: Arc<dyn AuditSink>,
}

impl WebhookState {
    pub fn new(
        descriptor: AgentDescriptor,
        capture: CaptureSettings,
        vault: Arc<CaptureVault>,
        balances: Arc<dyn BalanceRepository>,
        processor: Arc<dyn PaymentProcessor>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let payments = Arc::new(PaymentService::new(vault.clone(), processor, audit.clone()));
        Self { descriptor: Arc::new(descriptor), capture, vault, balances, payments, audit }
    }

    pub fn vault(&self) -> &Arc<CaptureVault> {
        &self.vault
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/ai", post(agent_descriptor))
        .route(&format!("/{GET_CREDIT_CARD_NUMBER}"), post(begin_capture))
        .route(&format!("/{CAPTURE_COMPLETE}"), post(finish_capture))
        .route(&format!("/{GET_CUSTOMER_BALANCE}"), post(customer_balance))
        .route(&format!("/{SUBMIT_PAYMENT}"), post(submit_payment))
        .route(&format!("/{POST_PROMPT_ENDPOINT}"), post(post_prompt))
        .with_state(state)
}

// Request bodies

#[derive(Debug, Default, Deserialize)]
pub struct CallInfo {
    #[serde(default)]
    pub call_id: Option<String>,
}

/// Common envelope of a SWAIG function callback.
#[derive(Debug, Deserialize)]
pub struct SwaigRequest<T> {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub call: Option<CallInfo>,
    #[serde(default)]
    pub argument: Option<SwaigArgument<T>>,
}

#[derive(Debug, Deserialize)]
pub struct SwaigArgument<T> {
    #[serde(default)]
    pub parsed: Vec<T>,
}

impl<T> SwaigRequest<T> {
    pub fn call_id(&self) -> CallId {
        resolve_call_id(self.call_id.as_deref(), self.call.as_ref())
    }

    pub fn into_first_argument(self) -> Result<T, DomainError> {
        self.argument
            .and_then(|argument| argument.parsed.into_iter().next())
            .ok_or(DomainError::MissingField("argument.parsed"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceArguments {
    #[serde(default, deserialize_with = "lenient_text")]
    pub account_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentArguments {
    #[serde(default, deserialize_with = "lenient_text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub card_verification_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub expiration_date: Option<String>,
}

/// Body posted by the digit-collection step once the caller finishes typing.
#[derive(Debug, Default, Deserialize)]
pub struct CaptureCompletion {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub call: Option<CallInfo>,
    #[serde(default)]
    pub vars: CaptureVars,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureVars {
    #[serde(default, deserialize_with = "lenient_text")]
    pub prompt_value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostPromptPayload {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub call: Option<CallInfo>,
    #[serde(default)]
    pub post_prompt_data: Option<PostPromptData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostPromptData {
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub substituted: Option<String>,
}

fn resolve_call_id(top_level: Option<&str>, call: Option<&CallInfo>) -> CallId {
    CallId::resolve([top_level, call.and_then(|call| call.call_id.as_deref())])
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

// The model sometimes sends digits-only fields as JSON numbers.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<TextOrNumber>::deserialize(deserializer)?.map(|value| match value {
        TextOrNumber::Text(text) => text,
        TextOrNumber::Number(number) => number.to_string(),
    }))
}

// Rejections

#[derive(Debug)]
pub struct WebhookRejection(InterfaceError);

impl WebhookRejection {
    fn domain(error: DomainError, correlation_id: &str) -> Self {
        Self(ApplicationError::from(error).into_interface(correlation_id))
    }

    fn application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    fn malformed(rejection: JsonRejection, correlation_id: &str) -> Self {
        Self(InterfaceError::bad_request(
            format!("malformed request body: {}", rejection.body_text()),
            correlation_id,
        ))
    }
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        warn!(
            event_name = "webhook.rejected",
            correlation_id = %self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "webhook request rejected"
        );
        (
            status,
            [(HeaderName::from_static(CORRELATION_HEADER), self.0.correlation_id().to_string())],
            self.0.response_body(),
        )
            .into_response()
    }
}

// Handlers

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn call_id_from_body(body: &Bytes) -> CallId {
    let payload = serde_json::from_slice::<PostPromptPayload>(body).unwrap_or_default();
    resolve_call_id(payload.call_id.as_deref(), payload.call.as_ref())
}

async fn agent_descriptor(State(state): State<WebhookState>) -> Json<SwmlDocument> {
    info!(
        event_name = "webhook.descriptor_served",
        base_url = %state.descriptor.base().as_str(),
        "serving agent descriptor"
    );
    Json(state.descriptor.build())
}

async fn begin_capture(State(state): State<WebhookState>, body: Bytes) -> Json<FunctionResult> {
    let correlation_id = new_correlation_id();
    let call_id = call_id_from_body(&body);

    info!(
        event_name = "capture.requested",
        correlation_id = %correlation_id,
        call_id = %call_id,
        max_digits = state.capture.max_digits,
        "transferring caller to secure card entry"
    );
    state.audit.emit(AuditEvent::new(
        call_id,
        correlation_id,
        "capture.requested",
        AuditCategory::Capture,
        AUDIT_ACTOR,
        AuditOutcome::Success,
    ));

    Json(capture_instruction(state.descriptor.base(), &state.capture))
}

async fn finish_capture(
    State(state): State<WebhookState>,
    payload: Result<Json<CaptureCompletion>, JsonRejection>,
) -> Result<(StatusCode, &'static str), WebhookRejection> {
    let correlation_id = new_correlation_id();
    let Json(completion) =
        payload.map_err(|rejection| WebhookRejection::malformed(rejection, &correlation_id))?;
    let call_id = resolve_call_id(completion.call_id.as_deref(), completion.call.as_ref());

    let prompt_value = completion.vars.prompt_value.as_deref();
    let receipt = match complete_capture(&state.vault, call_id.clone(), prompt_value) {
        Ok(receipt) => receipt,
        Err(_) => {
            state.audit.emit(
                AuditEvent::new(
                    call_id,
                    correlation_id.as_str(),
                    "capture.completed",
                    AuditCategory::Capture,
                    AUDIT_ACTOR,
                    AuditOutcome::Rejected,
                )
                .with_metadata("reason", "empty_prompt_value"),
            );
            return Err(WebhookRejection(InterfaceError::bad_request(
                CARD_NOT_PROVIDED,
                correlation_id,
            )));
        }
    };

    info!(
        event_name = "capture.completed",
        correlation_id = %correlation_id,
        call_id = %call_id,
        replaced_previous = receipt.replaced_previous,
        "card number captured"
    );
    state.audit.emit(
        AuditEvent::new(
            call_id,
            correlation_id,
            "capture.completed",
            AuditCategory::Capture,
            AUDIT_ACTOR,
            AuditOutcome::Success,
        )
        .with_metadata("replaced_previous", receipt.replaced_previous.to_string()),
    );

    Ok((StatusCode::OK, "ok"))
}

async fn customer_balance(
    State(state): State<WebhookState>,
    payload: Result<Json<SwaigRequest<BalanceArguments>>, JsonRejection>,
) -> Result<Json<FunctionResult>, WebhookRejection> {
    let correlation_id = new_correlation_id();
    let Json(request) =
        payload.map_err(|rejection| WebhookRejection::malformed(rejection, &correlation_id))?;
    let call_id = request.call_id();

    let arguments = request
        .into_first_argument()
        .map_err(|error| WebhookRejection::domain(error, &correlation_id))?;
    let account_number = AccountNumber::parse(arguments.account_number.as_deref())
        .map_err(|error| WebhookRejection::domain(error, &correlation_id))?;

    let records = state
        .balances
        .find_by_account_number(&account_number)
        .await
        .map_err(|error| WebhookRejection::application(error.into(), &correlation_id))?;
    let lookup = BalanceLookup::from_records(&records);

    info!(
        event_name = "balance.lookup",
        correlation_id = %correlation_id,
        call_id = %call_id,
        account_number = %account_number.as_str(),
        outcome = lookup.outcome_label(),
        "balance lookup completed"
    );
    let outcome = match lookup {
        BalanceLookup::Found(_) => AuditOutcome::Success,
        BalanceLookup::NotFound | BalanceLookup::Ambiguous { .. } => AuditOutcome::Rejected,
    };
    state.audit.emit(
        AuditEvent::new(
            call_id,
            correlation_id,
            "balance.lookup",
            AuditCategory::Balance,
            AUDIT_ACTOR,
            outcome,
        )
        .with_metadata("account_number", account_number.as_str())
        .with_metadata("result", lookup.outcome_label()),
    );

    Ok(Json(FunctionResult::reply(lookup.response_text())))
}

async fn submit_payment(
    State(state): State<WebhookState>,
    payload: Result<Json<SwaigRequest<PaymentArguments>>, JsonRejection>,
) -> Result<Json<FunctionResult>, WebhookRejection> {
    let correlation_id = new_correlation_id();
    let Json(request) =
        payload.map_err(|rejection| WebhookRejection::malformed(rejection, &correlation_id))?;
    let call_id = request.call_id();

    let arguments = request
        .into_first_argument()
        .map_err(|error| WebhookRejection::domain(error, &correlation_id))?;
    let payment = PaymentRequest::new(
        arguments.first_name.as_deref(),
        arguments.last_name.as_deref(),
        arguments.account_number.as_deref(),
        arguments.card_verification_value.as_deref(),
        arguments.expiration_date.as_deref(),
    )
    .map_err(|error| WebhookRejection::domain(error, &correlation_id))?;

    let outcome = state
        .payments
        .submit(&call_id, payment, &correlation_id)
        .await
        .map_err(|error| WebhookRejection::application(error, &correlation_id))?;

    Ok(Json(FunctionResult::reply(outcome.response_text())))
}

async fn post_prompt(State(state): State<WebhookState>, body: Bytes) -> Json<FunctionResult> {
    let correlation_id = new_correlation_id();
    let payload = serde_json::from_slice::<PostPromptPayload>(&body).unwrap_or_default();
    let call_id = resolve_call_id(payload.call_id.as_deref(), payload.call.as_ref());

    let summary_chars = payload
        .post_prompt_data
        .as_ref()
        .and_then(|data| data.substituted.as_deref().or(data.raw.as_deref()))
        .map(|summary| summary.chars().count())
        .unwrap_or_default();
    let discarded_capture = state.vault.discard(&call_id);

    info!(
        event_name = "call.summary_received",
        correlation_id = %correlation_id,
        call_id = %call_id,
        summary_chars,
        discarded_capture,
        "conversation summary received"
    );
    state.audit.emit(
        AuditEvent::new(
            call_id,
            correlation_id,
            "call.ended",
            AuditCategory::System,
            AUDIT_ACTOR,
            AuditOutcome::Success,
        )
        .with_metadata("discarded_capture", discarded_capture.to_string()),
    );

    Json(FunctionResult::reply("ok"))
}

#[cfg(test)]
mod tests {
    use super::{BalanceArguments, CaptureCompletion, PaymentArguments, SwaigRequest};
    use voicepay_core::capture::CallId;
    use voicepay_core::errors::DomainError;

    #[test]
    fn call_id_prefers_top_level_then_nested_then_unscoped() {
        let top: SwaigRequest<BalanceArguments> =
            serde_json::from_str(r#"{"call_id":"a","call":{"call_id":"b"}}"#).expect("parse");
        let nested: SwaigRequest<BalanceArguments> =
            serde_json::from_str(r#"{"call":{"call_id":"b"}}"#).expect("parse");
        let missing: SwaigRequest<BalanceArguments> =
            serde_json::from_str(r#"{"call_id":"  "}"#).expect("parse");

        assert_eq!(top.call_id(), CallId::new("a"));
        assert_eq!(nested.call_id(), CallId::new("b"));
        assert!(missing.call_id().is_unscoped());
    }

    #[test]
    fn missing_parsed_entry_names_the_field() {
        let request: SwaigRequest<BalanceArguments> =
            serde_json::from_str(r#"{"argument":{"parsed":[]}}"#).expect("parse");

        assert_eq!(
            request.into_first_argument().err(),
            Some(DomainError::MissingField("argument.parsed"))
        );
    }

    #[test]
    fn numeric_fields_are_accepted_as_text() {
        let request: SwaigRequest<PaymentArguments> = serde_json::from_str(
            r#"{"argument":{"parsed":[{"account_number":1001,"card_verification_value":123}]}}"#,
        )
        .expect("parse");
        let arguments = request.into_first_argument().expect("first argument");

        assert_eq!(arguments.account_number.as_deref(), Some("1001"));
        assert_eq!(arguments.card_verification_value.as_deref(), Some("123"));
        assert_eq!(arguments.first_name, None);
    }

    #[test]
    fn capture_completion_tolerates_missing_vars() {
        let completion: CaptureCompletion = serde_json::from_str("{}").expect("parse");
        assert_eq!(completion.vars.prompt_value, None);
    }
}

//! Agent descriptor documents served to the voice runtime.
//!
//! The runtime fetches one [`SwmlDocument`] per call. It carries the prompt,
//! the generation tunables and the callable functions, each pointing back at
//! an endpoint of this service derived from the configured [`CallbackBase`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::prompt::{AGENT_PROMPT, POST_PROMPT};

pub const SWML_VERSION: &str = "1.0.0";

pub const GET_CREDIT_CARD_NUMBER: &str = "get_credit_card_number";
pub const SUBMIT_PAYMENT: &str = "submit_payment";
pub const GET_CUSTOMER_BALANCE: &str = "get_customer_balance";
pub const CAPTURE_COMPLETE: &str = "cc_digits";
pub const POST_PROMPT_ENDPOINT: &str = "post_prompt";

pub const DEFAULT_VOICE: &str = "en-US-Standard-A";

/// Externally reachable address of this service, without a trailing slash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallbackBase(String);

impl CallbackBase {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::MissingField("public_base_url"));
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(DomainError::InvalidField {
                field: "public_base_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }

        let normalized = trimmed.trim_end_matches('/');
        if normalized.ends_with("://") {
            return Err(DomainError::InvalidField {
                field: "public_base_url",
                reason: "must include a host".to_string(),
            });
        }

        Ok(Self(normalized.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub confidence: f64,
    pub barge_confidence: f64,
    pub top_p: f64,
    pub temperature: f64,
    pub swaig_allow_swml: bool,
    pub conscience: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            confidence: 0.6,
            barge_confidence: 0.1,
            top_p: 0.3,
            temperature: 0.3,
            swaig_allow_swml: true,
            conscience: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwmlDocument {
    pub version: String,
    pub sections: SwmlSections,
}

impl SwmlDocument {
    pub fn new(main: Vec<SwmlInstruction>) -> Self {
        Self { version: SWML_VERSION.to_string(), sections: SwmlSections { main } }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwmlSections {
    pub main: Vec<SwmlInstruction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwmlInstruction {
    Ai(Box<AiNode>),
    Prompt(DigitPrompt),
    Transfer(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiNode {
    pub params: GenerationParams,
    pub voice: String,
    pub prompt: PromptText,
    pub post_prompt: PromptText,
    pub post_prompt_url: String,
    #[serde(rename = "SWAIG")]
    pub swaig: SwaigSection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptText {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwaigSection {
    pub functions: Vec<FunctionDescriptor>,
}

/// Reply to a SWAIG function call. `response` is what the model gets to see.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    pub response: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action: Vec<FunctionAction>,
}

impl FunctionResult {
    pub fn reply(response: impl Into<String>) -> Self {
        Self { response: response.into(), action: Vec::new() }
    }

    pub fn with_action(mut self, action: FunctionAction) -> Self {
        self.action.push(action);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FunctionAction {
    #[serde(rename = "say")]
    Say(String),
    #[serde(rename = "SWML")]
    Swml(SwmlDocument),
}

/// Keypad/speech collection step run by the runtime outside the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitPrompt {
    pub play: String,
    pub speech_language: String,
    pub max_digits: u8,
    pub initial_timeout: u32,
    pub speech_hints: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub function: String,
    pub purpose: String,
    pub web_hook_url: String,
    pub argument: ArgumentSchema,
}

impl FunctionDescriptor {
    pub fn new(function: &str, purpose: &str, web_hook_url: String) -> Self {
        Self {
            function: function.to_string(),
            purpose: purpose.to_string(),
            web_hook_url,
            argument: ArgumentSchema::default(),
        }
    }

    pub fn with_string_property(mut self, name: &str, description: &str) -> Self {
        self.argument.properties.insert(
            name.to_string(),
            PropertySchema { kind: "string".to_string(), description: description.to_string() },
        );
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: BTreeMap<String, PropertySchema>,
}

impl Default for ArgumentSchema {
    fn default() -> Self {
        Self { kind: "object".to_string(), properties: BTreeMap::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// Builds the agent descriptor. Rebuilt on every request; holds no per-call state.
#[derive(Clone, Debug)]
pub struct AgentDescriptor {
    base: CallbackBase,
    voice: String,
    params: GenerationParams,
}

impl AgentDescriptor {
    pub fn new(base: CallbackBase, voice: impl Into<String>, params: GenerationParams) -> Self {
        Self { base, voice: voice.into(), params }
    }

    pub fn base(&self) -> &CallbackBase {
        &self.base
    }

    pub fn build(&self) -> SwmlDocument {
        let node = AiNode {
            params: self.params.clone(),
            voice: self.voice.clone(),
            prompt: PromptText { text: AGENT_PROMPT.to_string() },
            post_prompt: PromptText { text: POST_PROMPT.to_string() },
            post_prompt_url: self.base.endpoint(POST_PROMPT_ENDPOINT),
            swaig: SwaigSection { functions: self.functions() },
        };

        SwmlDocument::new(vec![SwmlInstruction::Ai(Box::new(node))])
    }

    pub fn functions(&self) -> Vec<FunctionDescriptor> {
        vec![
            // No arguments: the model must never be the one supplying card digits.
            FunctionDescriptor::new(
                GET_CREDIT_CARD_NUMBER,
                "transfer the caller to secure keypad entry of their credit card number",
                self.base.endpoint(GET_CREDIT_CARD_NUMBER),
            ),
            FunctionDescriptor::new(
                SUBMIT_PAYMENT,
                "submit the payment for the caller",
                self.base.endpoint(SUBMIT_PAYMENT),
            )
            .with_string_property("first_name", "the callers first name")
            .with_string_property("last_name", "the callers last name")
            .with_string_property("account_number", "the callers account number")
            .with_string_property("card_verification_value", "the callers credit card cvv")
            .with_string_property(
                "expiration_date",
                "the callers credit card expiration date",
            ),
            FunctionDescriptor::new(
                GET_CUSTOMER_BALANCE,
                "look up the amount due on the callers account",
                self.base.endpoint(GET_CUSTOMER_BALANCE),
            )
            .with_string_property("account_number", "the callers account number"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{
        AgentDescriptor, CallbackBase, GenerationParams, SwmlInstruction, DEFAULT_VOICE,
        GET_CREDIT_CARD_NUMBER, GET_CUSTOMER_BALANCE, SUBMIT_PAYMENT,
    };
    use crate::errors::DomainError;

    fn descriptor(base: &str) -> AgentDescriptor {
        AgentDescriptor::new(
            CallbackBase::parse(base).expect("valid base"),
            DEFAULT_VOICE,
            GenerationParams::default(),
        )
    }

    #[test]
    fn callback_base_trims_trailing_slashes() {
        let base = CallbackBase::parse(" https://abc.ngrok.io/ ").expect("valid base");
        assert_eq!(base.as_str(), "https://abc.ngrok.io");
        assert_eq!(base.endpoint("/cc_digits"), "https://abc.ngrok.io/cc_digits");
    }

    #[test]
    fn callback_base_rejects_empty_and_non_http_values() {
        assert_eq!(CallbackBase::parse("   "), Err(DomainError::MissingField("public_base_url")));
        assert!(matches!(
            CallbackBase::parse("ftp://files.example.com"),
            Err(DomainError::InvalidField { field: "public_base_url", .. })
        ));
        assert!(CallbackBase::parse("https://").is_err());
    }

    #[test]
    fn descriptor_exposes_three_functions_with_derived_urls() {
        for base in ["https://abc.ngrok.io", "http://10.0.0.5:5000/"] {
            let descriptor = descriptor(base);
            let expected_base = base.trim_end_matches('/');
            let functions = descriptor.functions();

            assert_eq!(functions.len(), 3);
            let urls: Vec<(String, String)> = functions
                .iter()
                .map(|function| (function.function.clone(), function.web_hook_url.clone()))
                .collect();
            let expected: Vec<(String, String)> =
                [GET_CREDIT_CARD_NUMBER, SUBMIT_PAYMENT, GET_CUSTOMER_BALANCE]
                    .iter()
                    .map(|name| (name.to_string(), format!("{expected_base}/{name}")))
                    .collect();
            assert_eq!(urls, expected);
        }
    }

    #[test]
    fn document_serializes_to_runtime_shape() {
        let document = descriptor("https://abc.ngrok.io").build();
        let json: Value = serde_json::to_value(&document).expect("serialize");

        assert_eq!(json["version"], "1.0.0");
        let ai = &json["sections"]["main"][0]["ai"];
        assert_eq!(ai["voice"], "en-US-Standard-A");
        assert_eq!(ai["params"]["temperature"], 0.3);
        assert_eq!(ai["params"]["swaig_allow_swml"], true);
        assert!(ai["params"].get("params").is_none(), "tunables must not be nested twice");
        assert_eq!(ai["post_prompt_url"], "https://abc.ngrok.io/post_prompt");
        assert!(ai["prompt"]["text"].as_str().unwrap_or_default().contains("Max Electric"));

        let functions = ai["SWAIG"]["functions"].as_array().expect("functions array");
        assert_eq!(functions.len(), 3);
        assert_eq!(functions[1]["argument"]["type"], "object");
        assert_eq!(
            functions[1]["argument"]["properties"]["card_verification_value"]["type"],
            "string"
        );
    }

    #[test]
    fn card_capture_function_accepts_no_model_supplied_arguments() {
        let functions = descriptor("https://abc.ngrok.io").functions();
        let capture = functions
            .iter()
            .find(|function| function.function == GET_CREDIT_CARD_NUMBER)
            .expect("capture function present");

        assert!(capture.argument.properties.is_empty());
    }

    #[test]
    fn build_is_deterministic_for_a_given_base() {
        let descriptor = descriptor("https://abc.ngrok.io");
        assert_eq!(descriptor.build(), descriptor.build());
        assert!(matches!(descriptor.build().sections.main[0], SwmlInstruction::Ai(_)));
    }
}

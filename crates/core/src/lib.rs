pub mod audit;
pub mod balance;
pub mod capture;
pub mod config;
pub mod descriptor;
pub mod errors;
pub mod payment;
pub mod prompt;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use balance::{AccountNumber, BalanceLookup, BalanceRecord};
pub use capture::{CallId, CaptureSettings, CaptureVault, CardNumber};
pub use descriptor::{AgentDescriptor, CallbackBase, FunctionResult, GenerationParams};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use payment::{
    PaymentOutcome, PaymentProcessor, PaymentRequest, PaymentService, SimulatedPaymentProcessor,
};

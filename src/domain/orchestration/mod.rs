//! Orchestration domain - requests, payloads and outcomes

mod request;
mod response;

pub use request::{
    EmbedPayload, IntentPayload, OperationType, Payload, Priority, Request, StrategyHint,
    TranslatePayload, TypoPayload, DEFAULT_REQUEST_TIMEOUT,
};
pub use response::{IntentAnalysis, OperationOutput, Response, Strategy};

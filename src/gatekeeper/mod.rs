pub mod client;
pub mod cors;
pub mod headers;
pub mod patterns;
pub mod pipeline;

pub use client::{client_ip, ClientContext};
pub use cors::CorsPolicy;
pub use headers::SecurityHeaders;
pub use patterns::detect_malicious_input;
pub use pipeline::{gatekeeper_middleware, GateDecision, GateVerdict, InboundRequest, RequestGatekeeper};

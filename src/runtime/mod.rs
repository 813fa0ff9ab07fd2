//! Async request and scaling surfaces built on the tokio runtime.

pub mod api;
pub mod host;

pub use api::{
    classify, decrease, increase, ApiResponse, IntentRequest, Latency, ReportErrors, Saturation,
    ScaleAck, TaskReport,
};
pub use host::{HostSampler, NoopHostSampler, StaticHostSampler, SysinfoHostSampler};

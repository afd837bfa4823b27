pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod preview;
pub mod workflow;

pub use client::{HttpPredictionClient, Predictor};
pub use config::ClientConfig;
pub use error::PredictError;
pub use files::load_upload;
pub use preview::{derive_preview, PreviewHandle};
pub use workflow::{
    ReanalyzeOutcome, SelectOutcome, WorkflowController, WorkflowPhase, WorkflowState,
    WorkflowStats,
};

//! Types shared by the workflow, the analysis client and the proxy
//!
//! Everything here is plain data: no I/O, no locking.

pub mod messages;
pub mod state;
pub mod types;

pub use messages::{AnalyzeRequest, ErrorBody};
pub use state::{TransitionError, WorkflowEvent, WorkflowState};
pub use types::{split_data_url, AnalysisResult, EncodedImage, JPEG_MIME};

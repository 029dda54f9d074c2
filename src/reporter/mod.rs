mod file_search;
mod git;
mod junit;
mod payload;
mod send;

pub use payload::{ReportPayload, RequestData};
pub use send::Sender;

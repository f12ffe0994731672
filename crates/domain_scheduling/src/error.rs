//! Scheduling domain errors

use thiserror::Error;

/// Errors that can occur in the scheduling domain
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The template is paused or completed
    #[error("Template is not active: {0}")]
    TemplateNotActive(String),

    /// The template has no lines to generate from
    #[error("Template has no line items: {0}")]
    EmptyTemplate(String),
}

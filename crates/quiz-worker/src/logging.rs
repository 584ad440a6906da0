//! Structured run logging.
//!
//! Every line carries the run id and operation so a single quiz run can be
//! followed through generation, assembly and encoding.

use tracing::{error, info, warn, Span};

/// Logger for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    pub fn new(run_id: &str, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    /// Generation summary, logged before encoding.
    pub fn log_generation_summary(&self, generated: usize, total: usize) {
        if generated < total {
            warn!(
                run_id = %self.run_id,
                generated,
                total,
                "{}/{} clips generated, placeholders used for the rest", generated, total
            );
        } else {
            info!(
                run_id = %self.run_id,
                generated,
                total,
                "{}/{} clips generated", generated, total
            );
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}

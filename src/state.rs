//! Application state: the configured question pipeline.
//!
//! The pipeline owns the detection table, the id counter and the validation
//! log; it is shared behind `Arc` across HTTP and WebSocket handlers.

use tracing::{info, instrument};

use crate::config::load_pipeline_config_from_env;
use crate::pipeline::Pipeline;

pub struct AppState {
    pub pipeline: Pipeline,
}

impl AppState {
    /// Build state from env: load TOML config (or defaults) and assemble the pipeline.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_pipeline_config_from_env().unwrap_or_default();
        let pipeline = Pipeline::new(cfg);
        let settings = pipeline.settings();
        info!(
            target: "question_pipeline",
            strict = settings.strict,
            log_capacity = settings.log_capacity,
            counting_max_grade = settings.counting_max_grade,
            patterns = pipeline.pattern_count(),
            "Pipeline ready"
        );
        Self { pipeline }
    }

    pub fn with_pipeline(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }
}

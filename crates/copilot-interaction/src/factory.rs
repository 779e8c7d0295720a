//! Builds the configured backend.

use std::sync::Arc;

use copilot_core::{Backend, CopilotConfig, Renderer, Result, ScriptWriter};

use crate::framework::FrameworkService;
use crate::openai::OpenAiService;
use crate::prompts::PromptContext;
use crate::service::LlmService;
use crate::spark::SparkService;

/// Host-side collaborators handed to the backend.
#[derive(Clone)]
pub struct ServiceOptions {
    pub prompt_ctx: PromptContext,
    pub host_ip: Option<String>,
    pub script_writer: Option<Arc<dyn ScriptWriter>>,
}

impl ServiceOptions {
    pub fn new(prompt_ctx: PromptContext) -> Self {
        Self {
            prompt_ctx,
            host_ip: None,
            script_writer: None,
        }
    }

    pub fn with_host_ip(mut self, ip: impl Into<String>) -> Self {
        self.host_ip = Some(ip.into());
        self
    }

    pub fn with_script_writer(mut self, writer: Arc<dyn ScriptWriter>) -> Self {
        self.script_writer = Some(writer);
        self
    }
}

/// Creates the backend named by `config.backend`.
///
/// The Framework backend is bootstrapped here; a bootstrap failure is
/// rendered and the service is still returned.
pub async fn create_service(
    config: &CopilotConfig,
    options: ServiceOptions,
    renderer: &mut dyn Renderer,
) -> Result<Box<dyn LlmService>> {
    tracing::info!(backend = %config.backend, "creating LLM service");
    match config.backend {
        Backend::Framework => {
            let mut service = FrameworkService::from_config(config, options.prompt_ctx)?;
            if let Some(ip) = options.host_ip {
                service = service.with_host_ip(ip);
            }
            if let Some(writer) = options.script_writer {
                service = service.with_script_writer(writer);
            }
            service.bootstrap(renderer).await;
            Ok(Box::new(service))
        }
        Backend::Spark => Ok(Box::new(SparkService::from_config(
            config,
            options.prompt_ctx,
        )?)),
        Backend::OpenAi => Ok(Box::new(OpenAiService::from_config(
            config,
            options.prompt_ctx,
        )?)),
    }
}

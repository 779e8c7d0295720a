//! LLM backends and the streaming pipeline that feeds the accumulator.

pub mod controller;
pub mod decoder;
pub mod factory;
pub mod framework;
pub mod openai;
pub mod prompts;
pub mod service;
pub mod spark;
pub mod transport;

pub use controller::{ExchangeController, Finished};
pub use factory::{ServiceOptions, create_service};
pub use framework::FrameworkService;
pub use openai::OpenAiService;
pub use prompts::PromptContext;
pub use service::{Exchange, LlmService, Query};
pub use spark::SparkService;

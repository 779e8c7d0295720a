//! Domain model and pure pipeline stages for copilot-shell.
//!
//! Nothing in this crate performs I/O: transports live in
//! `copilot-interaction`, filesystem access in `copilot-infrastructure`.

pub mod accumulator;
pub mod answer;
pub mod config;
pub mod error;
pub mod event;
pub mod extractor;
pub mod messages;
pub mod plugin;
pub mod render;
pub mod script;
pub mod session;

pub use accumulator::{Accumulator, ExchangeOutcome, Progress};
pub use answer::{Answer, CommandCandidate, LlmResult};
pub use config::{Backend, CopilotConfig, QueryMode};
pub use error::{CopilotError, Result, TransportError};
pub use event::{ExtractPayload, StreamEvent};
pub use plugin::PluginDescriptor;
pub use render::Renderer;
pub use script::ScriptWriter;
pub use session::{ChatMessage, ConversationHistory, Role, SessionContext};

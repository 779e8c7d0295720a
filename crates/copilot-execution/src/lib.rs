//! Reviewing and running extracted commands.

pub mod classify;
pub mod review;
pub mod runner;

pub use classify::{CommandPlan, has_shell_features, plan_command};
pub use review::{Action, CommandReview, Explainer, Prompter, ReviewOutcome};
pub use runner::{CommandRunner, RunOutcome, SystemCommandRunner};

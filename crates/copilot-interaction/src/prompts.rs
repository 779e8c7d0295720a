//! Prompt builders.
//!
//! Host facts are passed in explicitly so that every builder stays pure.

use copilot_core::QueryMode;

/// Host facts rendered into prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub os_name: String,
    pub is_root: bool,
}

impl PromptContext {
    pub fn new(os_name: impl Into<String>, is_root: bool) -> Self {
        Self {
            os_name: os_name.into(),
            is_root,
        }
    }
}

const ROOT_USER: &str =
    "The current user is root, the shell commands you generate must not contain sudo.";
const REGULAR_USER: &str = "The current user is a regular user; if a shell command you generate needs root privileges, it must use sudo.";

fn privilege_note(ctx: &PromptContext) -> &'static str {
    if ctx.is_root { ROOT_USER } else { REGULAR_USER }
}

/// System prompt prepended to every OpenAI and Spark request.
pub fn system_prompt(ctx: &PromptContext) -> String {
    format!(
        "You are an operations assistant for the {os} operating system. You are an expert in \
administering and maintaining it, and in writing maintenance scripts.\n\
Your task: answer the user's question with an administration or maintenance solution for this \
operating system, implemented with shell commands or another common programming language. Your \
answer must work on the current system and must not rely on features it lacks.\n\n\
Format: answer in Markdown; code blocks and tables must be Markdown.\n\n\
Pay attention to package management: openEuler uses dnf or yum, Debian and Ubuntu use apt, \
macOS uses Homebrew. Never mix them up.\n\n\
Pay special attention to the current user's privileges:\n{privilege}\n\n\
Only return safe shell commands. For sensitive operations such as deleting files, cleaning \
caches, removing users, uninstalling software or downloading files, generate commands that \
cannot cause damage: no `rm -rf` on broad paths, no `dnf remove -y`.\n\n\
The user talks to you through a command line, so keep answers short, normally well under \
1000 words.",
        os = ctx.os_name,
        privilege = privilege_note(ctx),
    )
}

/// General question, answered in Markdown.
pub fn chat_prompt(question: &str, ctx: &PromptContext) -> String {
    format!(
        "Answer the user's question in Markdown.\n\n\
User question:\n{question}\n\n\
Requirements:\n\
1. If the answer involves shell commands, use single-line shell commands, never multi-line ones\n\
2. Put shell commands and code in Markdown code blocks and always name the language\n\
3. If the command needs input data, handle the input correctly, including user interaction\n\
4. The current operating system is {os}; the answer must work on it",
        os = ctx.os_name,
    )
}

/// Ask for a single-line shell command.
pub fn shell_prompt(question: &str) -> String {
    format!(
        "{question}\n\n\
Answer with exactly one single-line shell command inside a ```bash code block, \
followed by at most one sentence of explanation."
    )
}

/// Ask for an explanation of `cmd`.
pub fn explain_prompt(cmd: &str) -> String {
    format!(
        "```bash\n{cmd}\n```\n\
Please explain the shell command above.\n\n\
Requirements:\n\
Print the command once in a code block first, then explain its main steps in order."
    )
}

/// Prefix for Framework plugin questions that concern this machine.
pub fn plugin_prompt(question: &str, host_ip: Option<&str>) -> String {
    match host_ip {
        Some(ip) => format!("{question}\n\nThe IP address of the current machine is {ip}"),
        None => question.to_string(),
    }
}

/// Primary prompt the Framework agent receives with chat questions.
pub fn framework_prompt(question: &str, ctx: &PromptContext) -> String {
    format!(
        "{question}\n\n\
Give an administration solution that works on {os}. Use Markdown for code blocks and tables. \
{privilege} Only return safe shell commands and keep the answer short.",
        os = ctx.os_name,
        privilege = privilege_note(ctx),
    )
}

/// The user question as the backend should receive it in `mode`.
///
/// Plugin modes pass the question through unchanged; the Framework backend
/// adds its own plugin context.
pub fn question_for_mode(question: &str, mode: QueryMode, ctx: &PromptContext) -> String {
    match mode {
        QueryMode::Chat => chat_prompt(question, ctx),
        QueryMode::Shell => shell_prompt(question),
        QueryMode::Flow | QueryMode::Diagnose | QueryMode::Tuning => question.to_string(),
    }
}

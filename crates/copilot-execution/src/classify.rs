//! Decides whether a command needs a shell.
//!
//! The check is a heuristic over metacharacter patterns, not a shell grammar.
//! A missed pattern makes the command run without a shell, which usually
//! fails harmlessly; a false match only costs an extra shell process.

use once_cell::sync::Lazy;
use regex::RegexSet;

static SHELL_FEATURES: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        // redirection
        r"[<>]",
        // pipe
        r"\|",
        // globs
        r"[*?]",
        // variable expansion
        r"\$[\w_]+",
        // history expansion
        r"!",
        // background
        r"&",
        r";",
        // grouping
        r"[(){}]",
        // logical operators
        r"&&|\|\|",
        // inline assignment or function definition
        r"\b\w+\s*=\s*[^=\s]+",
    ])
    .expect("shell feature patterns are valid")
});

/// Whether `cmd` uses anything only a shell can interpret.
pub fn has_shell_features(cmd: &str) -> bool {
    SHELL_FEATURES.is_match(cmd)
}

/// How a command will be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPlan {
    /// Spawned directly with an argument vector, no shell involved.
    Direct { program: String, args: Vec<String> },
    /// Handed to `$SHELL -c`.
    Shell { script: String },
    /// Could not be split into words.
    Invalid { reason: String },
}

/// Plans the execution of one command.
///
/// Metacharacters win over everything else, so `cd /tmp && ls` goes to the
/// shell rather than being reported as a builtin.
pub fn plan_command(cmd: &str) -> CommandPlan {
    let cmd = cmd.trim();
    if has_shell_features(cmd) {
        return CommandPlan::Shell {
            script: cmd.to_string(),
        };
    }

    match shlex::split(cmd) {
        Some(words) => {
            let mut words = words.into_iter();
            match words.next() {
                Some(program) => CommandPlan::Direct {
                    program,
                    args: words.collect(),
                },
                None => CommandPlan::Invalid {
                    reason: "empty command".to_string(),
                },
            }
        }
        None => CommandPlan::Invalid {
            reason: "unbalanced quotes".to_string(),
        },
    }
}

/// Shell builtins that cannot work from a child process.
pub const BUILTINS: &[&str] = &[".", "source", "history", "cd", "export", "alias", "test"];

/// The builtin `cmd` starts with, if any.
pub fn builtin_prefix(cmd: &str) -> Option<&'static str> {
    let first = cmd.split_whitespace().next()?;
    BUILTINS.iter().copied().find(|builtin| *builtin == first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_commands_run_directly() {
        assert_eq!(
            plan_command("rm file.txt"),
            CommandPlan::Direct {
                program: "rm".into(),
                args: vec!["file.txt".into()],
            }
        );
        assert_eq!(
            plan_command("grep 'hello world' notes.md"),
            CommandPlan::Direct {
                program: "grep".into(),
                args: vec!["hello world".into(), "notes.md".into()],
            }
        );
    }

    #[test]
    fn test_pipeline_runs_through_shell() {
        assert_eq!(
            plan_command("ls | grep foo"),
            CommandPlan::Shell {
                script: "ls | grep foo".into()
            }
        );
    }

    #[test]
    fn test_metacharacters_need_a_shell() {
        for cmd in [
            "ls | grep foo",
            "echo hi > out.txt",
            "cat < in.txt",
            "ls *.log",
            "echo $HOME",
            "sleep 10 &",
            "cd /tmp; ls",
            "(cd /tmp && ls)",
            "make || echo failed",
            "FOO=bar env",
            "sudo !!",
        ] {
            assert!(has_shell_features(cmd), "{cmd} should need a shell");
        }
    }

    #[test]
    fn test_flags_with_equals_inside_words() {
        // `--color=auto` matches the assignment pattern and is sent to the shell
        assert!(has_shell_features("ls --color=auto"));
        assert!(!has_shell_features("ls -la /var/log"));
    }

    #[test]
    fn test_builtin_with_metacharacters_goes_to_shell() {
        assert_eq!(
            plan_command("cd /tmp && ls"),
            CommandPlan::Shell {
                script: "cd /tmp && ls".into()
            }
        );
    }

    #[test]
    fn test_unbalanced_quotes_are_invalid() {
        assert!(matches!(
            plan_command("echo 'unterminated"),
            CommandPlan::Invalid { .. }
        ));
    }

    #[test]
    fn test_builtin_prefix() {
        assert_eq!(builtin_prefix("cd /tmp"), Some("cd"));
        assert_eq!(builtin_prefix(". ~/.bashrc"), Some("."));
        assert_eq!(builtin_prefix("cdrecord -v"), None);
    }
}

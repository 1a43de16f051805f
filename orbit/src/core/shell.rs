//! Host-shell dialects and the command rewriting between them.
//!
//! Plans are written in POSIX style. Rewriting for another shell happens in
//! [`ShellDialect::normalize`] only, so adding a dialect never touches the
//! execution loop.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shell used to run plan commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellDialect {
    /// `sh -c`, `/` separators, `&&` chaining.
    Posix,
    /// `powershell.exe -Command`, `\` separators, `;` chaining.
    PowerShell,
}

impl ShellDialect {
    /// Dialect of the shell on the host this binary was built for.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::PowerShell
        } else {
            Self::Posix
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Posix => "POSIX sh",
            Self::PowerShell => "Windows PowerShell",
        }
    }

    /// Token this shell uses to run commands one after another.
    pub fn chain_token(self) -> &'static str {
        match self {
            Self::Posix => "&&",
            Self::PowerShell => ";",
        }
    }

    /// Program and leading arguments used to run a command line.
    pub fn program(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Posix => ("sh", &["-c"]),
            Self::PowerShell => ("powershell.exe", &["-NoProfile", "-Command"]),
        }
    }

    /// Rewrite a POSIX-style command line for this shell.
    pub fn normalize(self, command: &str) -> String {
        match self {
            Self::Posix => command.to_string(),
            Self::PowerShell => {
                let rewritten = command
                    .split(' ')
                    .map(|token| {
                        if token.contains("://") {
                            token.to_string()
                        } else {
                            token.replace('/', "\\")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                rewritten.replace(" && ", " ; ")
            }
        }
    }
}

impl fmt::Display for ShellDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tokens after which the next command runs once the previous one is done.
const SEQUENCE_SEPARATORS: [&str; 2] = ["&&", ";"];

/// Token after which the next command runs only if the previous one failed.
const FALLBACK_SEPARATOR: &str = "||";

/// A leading directory change split off a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirChange<'a> {
    /// Target with surrounding quotes removed.
    pub target: &'a str,
    /// Command after `||`, meant to run only if the `cd` fails.
    pub fallback: Option<&'a str>,
    /// Command chained after the `cd` (and its fallback), if any.
    pub rest: Option<&'a str>,
}

/// Recognize `cd <target>` in an already-normalized command line.
///
/// The target ends at the first `&&`, `||` or `;`, with or without surrounding
/// spaces. A `||` fallback extends to the next `&&` or `;`.
pub fn split_dir_change(command: &str) -> Option<DirChange<'_>> {
    let after = command.trim_start().strip_prefix("cd")?;
    if !after.starts_with(char::is_whitespace) {
        return None;
    }

    let (target, fallback, rest) = match first_token(after, &[FALLBACK_SEPARATOR, "&&", ";"]) {
        None => (after, None, None),
        Some((pos, token)) if token == FALLBACK_SEPARATOR => {
            let tail = &after[pos + token.len()..];
            match first_token(tail, &SEQUENCE_SEPARATORS) {
                Some((next, sep)) => (
                    &after[..pos],
                    non_empty(&tail[..next]),
                    non_empty(&tail[next + sep.len()..]),
                ),
                None => (&after[..pos], non_empty(tail), None),
            }
        }
        Some((pos, token)) => (&after[..pos], None, non_empty(&after[pos + token.len()..])),
    };

    let target = target.trim().trim_matches(|c| c == '"' || c == '\'');
    if target.is_empty() {
        return None;
    }
    Some(DirChange {
        target,
        fallback,
        rest,
    })
}

/// Earliest occurrence of any of `tokens` in `text`.
fn first_token<'t>(text: &str, tokens: &[&'t str]) -> Option<(usize, &'t str)> {
    tokens
        .iter()
        .filter_map(|token| text.find(*token).map(|pos| (pos, *token)))
        .min_by_key(|(pos, _)| *pos)
}

fn non_empty(text: &str) -> Option<&str> {
    let text = text.trim();
    (!text.is_empty()).then_some(text)
}

use anyhow::{bail, Result};

/// A task file split into its two script sections. The appended execution
/// log (everything from the first `===` banner onward) belongs to neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    /// Shell text that must exit 0 before the command may run.
    pub precondition: String,
    /// Shell text to execute, multiline preserved.
    pub command: String,
}

/// Section the line scanner is currently in.
#[derive(PartialEq)]
enum Section {
    Precondition,
    Command,
}

/// Parse task file content (pure, no I/O).
///
/// The FIRST line beginning with `---` separates the precondition from the
/// command, and the FIRST later line beginning with `===` (a leftover banner
/// from an earlier run of the same file) ends the command. Every other
/// occurrence of either marker is data.
///
/// Empty content is a valid task: empty precondition, empty command, both
/// no-ops under `sh -c`. Non-empty content with no separator line is
/// rejected, so a malformed file fails visibly instead of cycling through
/// the queue forever.
pub fn parse_task(content: &str) -> Result<ParsedTask> {
    if content.is_empty() {
        return Ok(ParsedTask {
            precondition: String::new(),
            command: String::new(),
        });
    }

    let mut precondition: Vec<&str> = Vec::new();
    let mut command: Vec<&str> = Vec::new();
    let mut section = Section::Precondition;

    for line in content.lines() {
        match section {
            Section::Precondition if line.starts_with("---") => section = Section::Command,
            Section::Precondition => precondition.push(line),
            Section::Command if line.starts_with("===") => break,
            Section::Command => command.push(line),
        }
    }

    if section == Section::Precondition {
        bail!("no `---` separator line");
    }

    Ok(ParsedTask {
        precondition: precondition.join("\n"),
        command: command.join("\n"),
    })
}

//! Junos prompt recognition.
//!
//! Prompt patterns are adapted from scrapli's JunOS driver.
//!
//! ```text
//! lab@edge-r1>              # cli
//! {master:0}                # routing-engine indicator (separate line)
//! lab@edge-r1>              # cli prompt on next line
//! %                         # shell
//! lab@edge-r1:RE:0%         # shell
//! root@edge-r1:RE:0%        # root shell
//! root@edge-r1:~ #          # root shell
//! ```

use regex::Regex;

use crate::session::ShellMode;

const CLI_PROMPT: &str = r"(?m)^(\{\w+(:(\w+)?\d)?\}\n)?[\w\-@()/:\.]{1,63}>\s?$";
const ROOT_SHELL_PROMPT: &str = r"(?m)^.*root@(?:\S*:?\S*\s?)?[%#]\s?$";
const SHELL_PROMPT: &str = r"(?m)^.*[%$]\s?$";

/// Compiled Junos prompt patterns.
#[derive(Debug, Clone)]
pub struct JunosPrompts {
    cli: Regex,
    root_shell: Regex,
    shell: Regex,
}

impl JunosPrompts {
    /// Compile the patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            cli: Regex::new(CLI_PROMPT)?,
            root_shell: Regex::new(ROOT_SHELL_PROMPT)?,
            shell: Regex::new(SHELL_PROMPT)?,
        })
    }

    /// Classify the prompt at the end of `output`, if it is recognisable.
    pub fn classify(&self, output: &str) -> Option<ShellMode> {
        // A routing-engine banner sits on its own line, so the prompt is
        // always the last line.
        let last = output.trim_end().lines().last()?;

        if self.cli.is_match(last) {
            Some(ShellMode::Cli)
        } else if self.root_shell.is_match(last) || self.shell.is_match(last) {
            Some(ShellMode::Shell)
        } else {
            None
        }
    }
}

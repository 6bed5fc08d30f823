//! User prompts for the destination and the proceed confirmation
//!
//! On a terminal the prompts use `inquire`. Otherwise a single line is read
//! from standard input, and an empty line or end of input selects the
//! default answer.

use std::io::{self, BufRead, IsTerminal, Write};

use inquire::{Confirm, Text};

use crate::error::{InstallerError, Result};

/// Questions the driver asks
pub trait Prompter {
    /// Ask for the install directory, returning `default` on an empty answer
    fn destination(&mut self, default: &str) -> Result<String>;

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;
}

/// Prompts on the controlling terminal, or line-based on piped input
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractivePrompter;

impl Prompter for InteractivePrompter {
    fn destination(&mut self, default: &str) -> Result<String> {
        if !io::stdin().is_terminal() {
            return LinePrompter::new(io::stdin().lock(), io::stdout()).destination(default);
        }
        let answer = Text::new("Enter target directory for SDK:")
            .with_default(default)
            .prompt()?;
        Ok(if answer.trim().is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        if !io::stdin().is_terminal() {
            return LinePrompter::new(io::stdin().lock(), io::stdout()).confirm(message, default);
        }
        Ok(Confirm::new(message).with_default(default).prompt()?)
    }
}

/// Line-oriented prompts over arbitrary streams
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one trimmed line; `None` at end of input
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        let prompt_failed = |e: io::Error| InstallerError::PromptFailed {
            reason: e.to_string(),
        };
        write!(self.output, "{question}").map_err(prompt_failed)?;
        self.output.flush().map_err(prompt_failed)?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(prompt_failed)?;
        if read == 0 {
            writeln!(self.output).map_err(prompt_failed)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn destination(&mut self, default: &str) -> Result<String> {
        let answer = self.ask(&format!(
            "Enter target directory for SDK (default: {default}): "
        ))?;
        Ok(answer
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        let choices = if default { "Y/n" } else { "y/N" };
        let answer = self.ask(&format!("{message} [{choices}] "))?;
        Ok(match answer.as_deref() {
            None | Some("") => default,
            Some(a) => matches!(a.to_lowercase().as_str(), "y" | "yes"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> LinePrompter<Cursor<Vec<u8>>, Vec<u8>> {
        LinePrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_destination_default_on_empty_line() {
        let mut p = prompter("\n");
        assert_eq!(p.destination("/opt/sdk").unwrap(), "/opt/sdk");
        let shown = String::from_utf8(p.output).unwrap();
        assert_eq!(shown, "Enter target directory for SDK (default: /opt/sdk): ");
    }

    #[test]
    fn test_destination_default_on_eof() {
        let mut p = prompter("");
        assert_eq!(p.destination("/opt/sdk").unwrap(), "/opt/sdk");
    }

    #[test]
    fn test_destination_answer_trimmed() {
        let mut p = prompter("  /srv/sdk  \n");
        assert_eq!(p.destination("/opt/sdk").unwrap(), "/srv/sdk");
    }

    #[test]
    fn test_confirm_answers() {
        assert!(prompter("y\n").confirm("Proceed?", false).unwrap());
        assert!(prompter("YES\n").confirm("Proceed?", false).unwrap());
        assert!(!prompter("n\n").confirm("Proceed?", true).unwrap());
        assert!(!prompter("maybe\n").confirm("Proceed?", true).unwrap());
    }

    #[test]
    fn test_confirm_defaults() {
        assert!(prompter("\n").confirm("Proceed?", true).unwrap());
        assert!(!prompter("").confirm("Overwrite?", false).unwrap());

        let mut p = prompter("\n");
        p.confirm("Overwrite?", false).unwrap();
        assert_eq!(String::from_utf8(p.output).unwrap(), "Overwrite? [y/N] ");
    }
}

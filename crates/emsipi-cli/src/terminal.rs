//! Line-based prompter on the controlling terminal.
//!
//! Questions go to stderr so stdout stays reserved for command output.

use std::io::{BufRead, Write};

use emsipi_core::{Error, Prompter};

pub struct TerminalPrompter<R = std::io::StdinLock<'static>> {
    input: R,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            input: std::io::stdin().lock(),
        }
    }
}

impl<R: BufRead> TerminalPrompter<R> {
    fn read_answer(&mut self, prompt: &str) -> emsipi_core::Result<String> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{prompt} ").map_err(prompt_error)?;
        stderr.flush().map_err(prompt_error)?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(prompt_error)?;
        if read == 0 {
            return Err(prompt_error(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input closed before an answer was given",
            )));
        }
        Ok(line.trim().to_owned())
    }
}

impl<R: BufRead> Prompter for TerminalPrompter<R> {
    fn ask(
        &mut self,
        prompt: &str,
        default: Option<&str>,
        choices: &[&str],
    ) -> emsipi_core::Result<String> {
        let mut question = prompt.to_owned();
        if !choices.is_empty() {
            question.push_str(&format!(" [{}]", choices.join("/")));
        }
        question.push(':');

        let answer = self.read_answer(&question)?;
        match default {
            Some(default) if answer.is_empty() => Ok(default.to_owned()),
            _ => Ok(answer),
        }
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> emsipi_core::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.read_answer(&format!("{prompt} {hint}"))?;
            match answer.as_str() {
                "" => return Ok(default),
                "y" | "Y" | "yes" | "YES" => return Ok(true),
                "n" | "N" | "no" | "NO" => return Ok(false),
                _ => eprintln!("Please answer y or n."),
            }
        }
    }
}

fn prompt_error(source: std::io::Error) -> Error {
    Error::Prompt { source }
}

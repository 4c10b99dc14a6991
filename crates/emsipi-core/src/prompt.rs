//! Interactive prompt gateway.
//!
//! The resolver chain never touches the terminal. It asks questions through a
//! [`Prompter`] handed in by the caller, and only while generate mode is on.

use crate::error::Error;

/// Capability for answering wizard questions.
pub trait Prompter {
    /// Free-text or choice question. Implementations return `default` for an
    /// empty answer when one is given.
    fn ask(&mut self, prompt: &str, default: Option<&str>, choices: &[&str])
    -> crate::Result<String>;

    fn confirm(&mut self, prompt: &str, default: bool) -> crate::Result<bool>;
}

/// Prompter for unattended runs: answers with the default or fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn ask(
        &mut self,
        prompt: &str,
        default: Option<&str>,
        _choices: &[&str],
    ) -> crate::Result<String> {
        default
            .map(str::to_owned)
            .ok_or_else(|| Error::missing(prompt, "no interactive input is available"))
    }

    fn confirm(&mut self, _prompt: &str, default: bool) -> crate::Result<bool> {
        Ok(default)
    }
}

/// Help text shown next to each wizard question.
pub fn description(field: &str) -> &'static str {
    match field {
        "server_name" => {
            "Name of the server. Cloud resources are derived from it; \
             letters, digits and dashes only."
        }
        "server_file_or_command" => {
            "Server file (.py or .js) or the command that starts the server."
        }
        "runtime" => "Runtime for the server image. Choose 'python' or 'node'.",
        "python_dependencies_file" => {
            "File listing the Python dependencies. \
             Choose 'uv.lock', 'pyproject.toml' or 'requirements.txt'."
        }
        "python_version" => "Python version of the base image (e.g. '3.11', '3.12').",
        "node_version" => "Major Node.js version of the base image (e.g. '18', '20').",
        "run_npm_build" => "Run `npm run build` during the image build?",
        "google.project" => "Google Cloud project ID.",
        "google.region" => "Google Cloud region.",
        "google.artifact_registry" => "Artifact Registry repository ID.",
        "google.service_name" => "Cloud Run service name.",
        _ => "",
    }
}

/// Wizard front-end over a [`Prompter`], active only in generate mode.
pub(crate) struct Wizard<'p> {
    prompter: &'p mut dyn Prompter,
    active: bool,
}

impl<'p> Wizard<'p> {
    pub(crate) fn new(prompter: &'p mut dyn Prompter, active: bool) -> Self {
        Self { prompter, active }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    /// Free-text question for `field`. A blank answer falls back to `current`.
    pub(crate) fn ask(&mut self, field: &str, current: Option<&str>) -> crate::Result<String> {
        self.ask_choices(field, current.map(|v| ("detected", v)), &[])
    }

    /// Like [`Wizard::ask`], for a value that was defaulted rather than detected.
    pub(crate) fn ask_default(&mut self, field: &str, default: &str) -> crate::Result<String> {
        self.ask_choices(field, Some(("default", default)), &[])
    }

    /// Choice question; an answer outside `choices` is rejected.
    pub(crate) fn choose(
        &mut self,
        field: &str,
        current: Option<&str>,
        choices: &[&str],
    ) -> crate::Result<String> {
        let answer = self.ask_choices(field, current.map(|v| ("detected", v)), choices)?;
        if choices.contains(&answer.as_str()) {
            Ok(answer)
        } else {
            Err(Error::invalid(
                field,
                answer,
                format!("expected one of {}", choices.join(", ")),
            ))
        }
    }

    pub(crate) fn confirm(&mut self, field: &str, current: bool) -> crate::Result<bool> {
        let prompt = question(field, Some(("detected", if current { "yes" } else { "no" })));
        self.prompter.confirm(&prompt, current)
    }

    fn ask_choices(
        &mut self,
        field: &str,
        annotated: Option<(&str, &str)>,
        choices: &[&str],
    ) -> crate::Result<String> {
        let current = annotated.map(|(_, value)| value);
        let prompt = question(field, annotated);
        let answer = self.prompter.ask(&prompt, current, choices)?;
        let answer = answer.trim();
        Ok(match (answer.is_empty(), current) {
            (true, Some(default)) => default.to_owned(),
            _ => answer.to_owned(),
        })
    }
}

fn question(field: &str, annotated: Option<(&str, &str)>) -> String {
    let mut text = field.to_owned();
    let help = description(field);
    if !help.is_empty() {
        text.push(' ');
        text.push_str(help);
    }
    if let Some((label, value)) = annotated {
        text.push_str(&format!(" ({label}: {value})"));
    }
    text
}

use std::collections::VecDeque;
use std::path::Path;

use emsipi_core::{
    CommandType, Error, Prompter, PythonDependencySource, Resolution, ResolveRequest, Runtime,
    resolve,
};
use tempfile::TempDir;

/// Answers from a queue and records every question. An exhausted queue
/// accepts the default.
#[derive(Default)]
struct ScriptedPrompter {
    answers: VecDeque<String>,
    confirms: VecDeque<bool>,
    questions: Vec<String>,
}

impl ScriptedPrompter {
    fn answering(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| (*a).to_owned()).collect(),
            ..Self::default()
        }
    }

    fn asked(&self, field: &str) -> usize {
        self.questions.iter().filter(|q| q.starts_with(field)).count()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(
        &mut self,
        prompt: &str,
        _default: Option<&str>,
        _choices: &[&str],
    ) -> emsipi_core::Result<String> {
        self.questions.push(prompt.to_owned());
        Ok(self.answers.pop_front().unwrap_or_default())
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> emsipi_core::Result<bool> {
        self.questions.push(prompt.to_owned());
        Ok(self.confirms.pop_front().unwrap_or(default))
    }
}

fn project(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (name, content) in files {
        std::fs::write(tmp.path().join(name), content).unwrap();
    }
    tmp
}

fn wizard(
    dir: &Path,
    target: Option<&str>,
    prompter: &mut ScriptedPrompter,
) -> emsipi_core::Result<Resolution> {
    let mut request = ResolveRequest::new(dir).interactive(true);
    if let Some(target) = target {
        request = request.server_file_or_command(target);
    }
    resolve(&request, prompter)
}

#[test]
fn python_wizard_asks_and_confirms_every_field() {
    let tmp = project(&[
        ("uv.lock", "requires-python = \">=3.11\"\n"),
        ("server.py", ""),
    ]);
    let mut prompter = ScriptedPrompter::answering(&["my-server", "", "", "", "my-project"]);

    let resolution = wizard(tmp.path(), Some("server.py"), &mut prompter).unwrap();
    let config = resolution.config;

    assert!(config.do_generate_config_files());
    assert_eq!(config.server_name, "my-server");
    assert_eq!(config.runtime, Runtime::Python);
    assert_eq!(config.python_dependencies_file, Some(PythonDependencySource::UvLock));
    assert_eq!(config.python_version.as_deref(), Some("3.11.0"));

    let google = config.provider("google").and_then(|p| p.as_google()).unwrap();
    assert_eq!(google.project, "my-project");
    assert_eq!(google.region, "us-central1");
    assert_eq!(google.artifact_registry, "my-server-repo");
    assert_eq!(google.service_name, "my-server-service");

    assert_eq!(prompter.questions.len(), 8, "{:#?}", prompter.questions);
    assert_eq!(prompter.asked("server_name"), 1);
    assert_eq!(prompter.asked("runtime"), 1);
    assert!(
        prompter
            .questions
            .iter()
            .any(|q| q.starts_with("python_version") && q.ends_with("(detected: 3.11.0)"))
    );
    assert!(
        prompter
            .questions
            .iter()
            .any(|q| q.starts_with("google.region") && q.ends_with("(default: us-central1)"))
    );
    assert!(resolution.warnings.is_empty(), "{:?}", resolution.warnings);
}

#[test]
fn wizard_asks_for_missing_target_and_node_fields() {
    let tmp = project(&[("package.json", "{}")]);
    let mut prompter = ScriptedPrompter::answering(&["web-app", "npm start", "", "", "proj"]);
    prompter.confirms.push_back(true);

    let config = wizard(tmp.path(), None, &mut prompter).unwrap().config;

    assert_eq!(config.target.server_command(), Some("npm start"));
    assert_eq!(config.command_type, CommandType::Shell);
    assert_eq!(config.runtime, Runtime::Node);
    assert_eq!(config.node_version.as_deref(), Some("20"));
    assert_eq!(config.run_npm_build, Some(true));
    assert_eq!(prompter.asked("server_file_or_command"), 1);
    assert_eq!(prompter.asked("run_npm_build"), 1);
}

#[test]
fn ambiguous_signals_are_settled_by_a_single_runtime_question() {
    let tmp = project(&[("requirements.txt", "flask\n"), ("package.json", "{}")]);
    let mut prompter = ScriptedPrompter::answering(&["svc", "node", "22", "proj"]);

    let config = wizard(tmp.path(), Some("./run.sh"), &mut prompter).unwrap().config;

    assert_eq!(config.runtime, Runtime::Node);
    assert_eq!(config.node_version.as_deref(), Some("22"));
    assert_eq!(prompter.asked("runtime"), 1);
}

#[test]
fn answer_outside_choices_is_rejected() {
    let tmp = project(&[("requirements.txt", "flask\n"), ("package.json", "{}")]);
    let mut prompter = ScriptedPrompter::answering(&["svc", "ruby"]);

    let err = wizard(tmp.path(), Some("./run.sh"), &mut prompter).unwrap_err();

    assert!(matches!(err, Error::InvalidFormat { ref field, .. } if field == "runtime"));
}

#[test]
fn changed_confirmation_is_reported_as_warning() {
    let tmp = project(&[("uv.lock", "requires-python = \">=3.11\"\n")]);
    let mut prompter = ScriptedPrompter::answering(&["my-server", "", "", "3.12", "proj"]);

    let resolution = wizard(tmp.path(), Some("server.py"), &mut prompter).unwrap();

    assert_eq!(resolution.config.python_version.as_deref(), Some("3.12"));
    assert!(
        resolution
            .warnings
            .iter()
            .any(|w| w.contains("python_version changed from '3.11.0' to '3.12'")),
        "{:?}",
        resolution.warnings
    );
}

#[test]
fn requirements_txt_in_wizard_offers_default_python_version() {
    let tmp = project(&[("requirements.txt", "flask\n")]);
    let mut prompter = ScriptedPrompter::answering(&["my-server", "", "", "", "proj"]);

    let config = wizard(tmp.path(), Some("app.py"), &mut prompter).unwrap().config;

    assert_eq!(config.python_version.as_deref(), Some("3.11"));
    assert!(
        prompter
            .questions
            .iter()
            .any(|q| q.starts_with("python_version") && q.ends_with("(default: 3.11)"))
    );
}

#[test]
fn invalid_name_from_wizard_is_rejected() {
    let tmp = project(&[("uv.lock", "requires-python = \">=3.11\"\n")]);
    let mut prompter = ScriptedPrompter::answering(&["x!"]);

    let err = wizard(tmp.path(), Some("server.py"), &mut prompter).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat { ref field, .. } if field == "server_name"));
}

#[test]
fn non_interactive_request_never_prompts() {
    let tmp = project(&[("uv.lock", "requires-python = \">=3.11\"\n")]);
    let mut prompter = ScriptedPrompter::default();
    let request = ResolveRequest::new(tmp.path()).server_file_or_command("server.py");

    let err = resolve(&request, &mut prompter).unwrap_err();

    assert!(matches!(err, Error::MissingRequiredField { ref field, .. } if field == "server_name"));
    assert!(prompter.questions.is_empty());
}

#[test]
fn existing_config_disables_the_wizard() {
    let tmp = project(&[
        ("emsipi.yaml", "server-name: quiet-app\nproviders:\n  google:\n    project: p\n"),
        ("uv.lock", "requires-python = \">=3.11\"\n"),
    ]);
    let mut prompter = ScriptedPrompter::default();

    let config = wizard(tmp.path(), Some("server.py"), &mut prompter).unwrap().config;

    assert_eq!(config.server_name, "quiet-app");
    assert!(prompter.questions.is_empty());
}

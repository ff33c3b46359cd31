// UI layer: terminal prompts and the first-run setup that creates
// `~/.freck`. Prompts go through the `Prompter` trait so the setup can be
// driven without a terminal.

use crate::admin::{list_projects, projects_heading, render_listing};
use crate::api::{ApiClient, BasicCredentials, Transport};
use crate::config::{Config, ConfigKey, ConfigStore};
use crate::error::{FreckError, FreckResult};
use anyhow::Result;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Blocking line-oriented user interaction.
pub trait Prompter {
    /// Read one line of free text; may be empty.
    fn ask(&mut self, prompt: &str) -> Result<String>;
    /// Read a line without echoing it to the terminal.
    fn ask_secret(&mut self, prompt: &str) -> Result<String>;
    /// Show a line of guidance to the user.
    fn say(&mut self, text: &str);
}

/// `Prompter` on the controlling terminal, using `dialoguer`.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        let value: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(value)
    }

    fn ask_secret(&mut self, prompt: &str) -> Result<String> {
        let value = Password::new().with_prompt(prompt).interact()?;
        Ok(value)
    }

    fn say(&mut self, text: &str) {
        println!("{text}");
    }
}

fn ask(prompter: &mut dyn Prompter, prompt: &str) -> FreckResult<String> {
    prompter
        .ask(prompt)
        .map(|s| s.trim().to_string())
        .map_err(FreckError::Prompt)
}

/// Ask for a value that will be saved in the config file. `#` starts a
/// comment there, so values containing it are refused and asked again.
fn ask_config_value(prompter: &mut dyn Prompter, prompt: &str) -> FreckResult<String> {
    loop {
        let value = ask(prompter, prompt)?;
        if !value.contains('#') && !value.contains('\n') {
            return Ok(value);
        }
        prompter.say("The '#' character cannot be saved in ~/.freck; please type another value.");
    }
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner
}

/// Run the interactive setup, save the resulting configuration to `store`
/// and return a client ready for use. `make_client` builds the client
/// for the subdomain the user typed.
pub fn bootstrap<T, F>(
    store: &ConfigStore,
    prompter: &mut dyn Prompter,
    make_client: F,
) -> FreckResult<ApiClient<T>>
where
    T: Transport,
    F: FnOnce(Config) -> FreckResult<ApiClient<T>>,
{
    prompter.say("Type the subdomain associated with your Freckle account, e.g. mysociety");
    let subdomain = ask_config_value(prompter, "subdomain")?;

    prompter.say("Type the email address you used to register with Freckle");
    let email = ask_config_value(prompter, "email")?;
    if !email.contains('@') {
        return Err(FreckError::InvalidEmail);
    }

    let password = prompter
        .ask_secret("password")
        .map_err(FreckError::Prompt)?;

    let mut config = Config::default();
    config.set(ConfigKey::Subdomain, subdomain.clone());
    config.set(ConfigKey::User, email.clone());
    let mut api = make_client(config)?;

    let progress = spinner("Exchanging credentials...");
    let exchanged = api.exchange_token(BasicCredentials {
        user: email,
        password,
    });
    progress.finish_and_clear();
    let token = exchanged.map_err(|e| {
        debug!("Credential exchange failed: {}", e);
        FreckError::CredentialExchange {
            subdomain: subdomain.clone(),
            host: api.host().to_string(),
        }
    })?;
    api.config_mut().set(ConfigKey::Token, token);

    let user_id = api.current_user_id()?;
    api.config_mut().set(ConfigKey::UserId, user_id);

    let lines = list_projects(&mut api)?;
    prompter.say(&render_listing(&projects_heading(&api), &lines));

    prompter.say("Type your current project. You may leave this blank");
    let project = ask_config_value(prompter, "project")?;
    if !project.is_empty() && !api.projects()?.contains_key(&project) {
        prompter.say("");
        prompter.say(&format!("WARNING: The project '{project}' does not exist."));
        prompter.say("If this is a mistake, edit ~/.freck and correct it.");
        prompter.say("To create this project, use the --create option next time you run freck.");
        prompter.say("");
    }
    api.config_mut().set(ConfigKey::Project, project);

    prompter.say("Type tags to include by default. You may leave this blank");
    let tags = ask_config_value(prompter, "tags")?;
    api.config_mut().set(ConfigKey::Tags, tags);
    prompter.say("");

    let path = store.save(api.config())?;
    prompter.say(&format!(
        "Your settings have been saved in {}",
        path.display()
    ));
    prompter.say("You may change them at any time by editing this file.");

    Ok(api)
}

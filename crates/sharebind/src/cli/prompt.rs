//! Terminal prompts for values not given on the command line.

use std::io::{self, IsTerminal};

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};
use sharebind_common::{Mechanism, ShareError, ShareResult};

/// Asks the operator for missing values, or falls back to defaults when not interactive.
pub struct Prompter {
    interactive: bool,
    theme: ColorfulTheme,
}

impl Prompter {
    /// Prompts are shown only if allowed and stdin is a terminal.
    pub fn new(allow: bool) -> Self {
        Self {
            interactive: allow && io::stdin().is_terminal(),
            theme: ColorfulTheme::default(),
        }
    }

    /// Use `value` if given, otherwise ask (or take `default`).
    pub fn text(
        &self,
        prompt: &str,
        value: Option<String>,
        default: Option<String>,
    ) -> ShareResult<String> {
        if let Some(value) = value {
            return Ok(value);
        }
        if !self.interactive {
            return default.ok_or_else(|| missing(prompt));
        }

        let mut input = Input::<String>::with_theme(&self.theme).with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default);
        }
        input.interact_text().map_err(prompt_failed)
    }

    /// Use `value` if given, otherwise ask without echo.
    pub fn password(&self, prompt: &str, value: Option<String>) -> ShareResult<String> {
        if let Some(value) = value {
            return Ok(value);
        }
        if !self.interactive {
            return Err(missing(prompt));
        }

        Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .interact()
            .map_err(prompt_failed)
    }

    /// Yes/no question; non-interactive runs take `default`.
    pub fn confirm(&self, prompt: &str, default: bool) -> ShareResult<bool> {
        if !self.interactive {
            return Ok(default);
        }

        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(prompt_failed)
    }

    /// Choose the mount mechanism; non-interactive runs use the static table.
    pub fn mechanism(&self) -> ShareResult<Mechanism> {
        if !self.interactive {
            return Ok(Mechanism::Static);
        }

        let choice = Select::with_theme(&self.theme)
            .with_prompt("Mount mechanism")
            .items(&["fstab (mount at boot)", "autofs (mount on access, auto-remount)"])
            .default(0)
            .interact()
            .map_err(prompt_failed)?;
        Ok(if choice == 1 {
            Mechanism::OnDemand
        } else {
            Mechanism::Static
        })
    }
}

fn missing(prompt: &str) -> ShareError {
    ShareError::MissingRequiredInput {
        field: prompt.to_string(),
    }
}

fn prompt_failed(err: dialoguer::Error) -> ShareError {
    ShareError::Io(io::Error::other(err.to_string()))
}

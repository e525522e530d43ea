//! Interactive credential prompt.

use std::io;

use dialoguer::{Input, Password};

use crate::core::{CredentialSource, HarvestError};

/// Reads the host, username and password from the terminal.
///
/// The username entered on the first attempt is offered as the default on
/// later attempts.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    last_username: Option<String>,
}

impl TerminalPrompt {
    /// Create a prompt.
    #[must_use]
    pub const fn new() -> Self {
        Self { last_username: None }
    }
}

fn prompt_error(err: dialoguer::Error) -> HarvestError {
    HarvestError::Io(io::Error::other(err))
}

impl CredentialSource for TerminalPrompt {
    fn host(&mut self, default: &str) -> Result<String, HarvestError> {
        Input::new()
            .with_prompt("Enter host address")
            .default(default.to_string())
            .interact_text()
            .map_err(prompt_error)
    }

    fn login(&mut self, attempt: u32) -> Result<(String, String), HarvestError> {
        if attempt > 1 {
            eprintln!("Authentication failed, attempt {attempt}");
        }

        let mut input = Input::<String>::new().with_prompt("Enter username");
        if let Some(previous) = &self.last_username {
            input = input.default(previous.clone());
        }
        let username = input.interact_text().map_err(prompt_error)?;
        if username.trim().is_empty() {
            return Err(HarvestError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "username must not be empty",
            )));
        }

        let password = Password::new()
            .with_prompt("Enter password")
            .interact()
            .map_err(prompt_error)?;

        self.last_username = Some(username.clone());
        Ok((username, password))
    }
}

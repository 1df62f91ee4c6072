use std::io::BufRead;

use clap::Subcommand;
use studyroom_core::credentials::{self, KeySource};
use studyroom_core::{CoreError, TutorError};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the Gemini API key in the OS keyring
    SetKey {
        /// The key; read from stdin when omitted
        key: Option<String>,
    },
    /// Remove the stored key
    Clear,
    /// Report where the key comes from
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::SetKey { key } => {
            let key = match key {
                Some(key) => key,
                None => {
                    let mut line = String::new();
                    std::io::stdin().lock().read_line(&mut line)?;
                    line
                }
            };
            if key.trim().is_empty() {
                return Err("empty API key".into());
            }
            credentials::store_api_key(&key)?;
            println!("API key stored");
        }
        AuthAction::Clear => {
            credentials::clear_api_key()?;
            println!("API key removed");
        }
        AuthAction::Status => match credentials::api_key() {
            Ok((_, KeySource::Env)) => println!("configured ({})", credentials::API_KEY_ENV),
            Ok((_, KeySource::Keyring)) => println!("configured (keyring)"),
            Err(CoreError::Tutor(TutorError::MissingApiKey)) => println!("not configured"),
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

use std::path::PathBuf;

use clap::Subcommand;
use studyroom_core::storage::Database;
use studyroom_core::{credentials, Config, GeminiClient, Tutor};

#[derive(Subcommand)]
pub enum TutorAction {
    /// Ask a question; the recent conversation is sent along
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Show the stored conversation
    History {
        #[arg(long, default_value = "20")]
        limit: u32,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget the conversation
    Clear,
    /// Read text (or the last reply) aloud into a WAV file
    Speak {
        text: Vec<String>,
        #[arg(short, long, default_value = "tutor.wav")]
        output: PathBuf,
    },
}

pub fn run(action: TutorAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let db = Database::open()?;

    match action {
        TutorAction::History { limit, json } => {
            let messages = db.recent_chat_messages(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                for m in &messages {
                    println!("[{}] {}:\n{}\n", m.created_at.format("%Y-%m-%d %H:%M"), m.role.as_str(), m.content);
                }
            }
            return Ok(());
        }
        TutorAction::Clear => {
            let removed = db.clear_chat()?;
            println!("cleared {removed} messages");
            return Ok(());
        }
        TutorAction::Ask { .. } | TutorAction::Speak { .. } => {}
    }

    let (api_key, _) = credentials::api_key()?;
    let client = GeminiClient::new(&config.tutor, &api_key)?;
    let tutor = Tutor::new(client, &db, config.tutor.clone());
    let rt = super::runtime()?;

    match action {
        TutorAction::Ask { question } => {
            let reply = rt.block_on(tutor.ask(&question.join(" ")))?;
            println!("{reply}");
        }
        TutorAction::Speak { text, output } => {
            let text = text.join(" ");
            let wav = rt.block_on(tutor.speak(Some(text.as_str())))?;
            std::fs::write(&output, wav)?;
            println!("wrote {}", output.display());
        }
        TutorAction::History { .. } | TutorAction::Clear => {}
    }
    Ok(())
}

// src/cli/conversations.rs — `xeerchat conversations` subcommands

use crate::backend::types::ConversationId;
use crate::cli::{AppContext, ConversationAction};
use crate::infra::errors::XeerError;
use crate::view::{render_entry, render_sidebar, Sidebar, Transcript};

pub async fn run_conversations(
    ctx: &AppContext,
    action: Option<ConversationAction>,
) -> anyhow::Result<()> {
    let backend = ctx.backend.as_ref();
    match action.unwrap_or(ConversationAction::List) {
        ConversationAction::List => {
            let mut sidebar = Sidebar::default();
            sidebar.set_conversations(backend.list_conversations().await?);
            println!("{}", render_sidebar(&sidebar));
        }
        ConversationAction::Show { id } => {
            let messages = backend
                .conversation_messages(&ConversationId::parse(&id))
                .await?;
            if messages.is_empty() {
                eprintln!("  No messages in conversation {id}.");
                return Ok(());
            }
            let mut transcript = Transcript::new();
            transcript.load(&messages);
            for entry in transcript.entries() {
                println!("{}\n", render_entry(entry));
            }
        }
        ConversationAction::Delete { id } => {
            backend
                .delete_conversation(&ConversationId::parse(&id))
                .await?;
            if !ctx.quiet {
                eprintln!("  Deleted conversation {id}.");
            }
        }
        ConversationAction::Rename { id, title } => {
            let title = title.join(" ");
            if title.trim().is_empty() {
                return Err(XeerError::InvalidTitle.into());
            }
            let stored = backend
                .rename_conversation(&ConversationId::parse(&id), title.trim())
                .await?;
            if !ctx.quiet {
                eprintln!("  Renamed conversation {id} to \"{stored}\".");
            }
        }
        ConversationAction::Clear { yes } => {
            let confirmed = yes
                || inquire::Confirm::new("Delete every conversation?")
                    .with_default(false)
                    .prompt()
                    .unwrap_or(false);
            if !confirmed {
                eprintln!("  Cancelled.");
                return Ok(());
            }
            backend.clear_conversations().await?;
            if !ctx.quiet {
                eprintln!("  All conversations deleted.");
            }
        }
    }
    Ok(())
}

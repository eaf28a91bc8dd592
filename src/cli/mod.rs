// src/cli/mod.rs — CLI definition (clap derive)

pub mod ask;
pub mod chat;
pub mod conversations;
pub mod models;
pub mod terminal;
pub mod usage;

use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::backend::ChatBackend;
use crate::infra::config::Config;
use crate::infra::state::StateStore;

#[derive(Parser)]
#[command(name = "xeerchat", about = "Terminal client for the Xeer chat server", version)]
pub struct Cli {
    /// Server base URL (overrides config and XEERCHAT_SERVER)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Model key to chat with
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Suppress status output (only print replies)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat session (default)
    Chat,
    /// Send one message and print the reply
    Ask {
        /// Message text
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
        /// Use the plain request/response endpoint instead of streaming
        #[arg(long)]
        no_stream: bool,
        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,
    },
    /// List and manage stored conversations
    Conversations {
        #[command(subcommand)]
        action: Option<ConversationAction>,
    },
    /// Show the model catalog
    Models,
    /// Show provider quota usage
    Usage {
        /// Keep polling and redraw on every update
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConversationAction {
    /// List conversations (default)
    List,
    /// Print a conversation's messages
    Show { id: String },
    /// Delete a conversation
    Delete { id: String },
    /// Rename a conversation
    Rename {
        id: String,
        #[arg(required = true, trailing_var_arg = true)]
        title: Vec<String>,
    },
    /// Delete every conversation
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

/// Everything a command needs, resolved once at startup.
pub struct AppContext {
    pub config: Config,
    pub backend: Arc<dyn ChatBackend>,
    pub state: StateStore,
    pub quiet: bool,
    model_override: Option<String>,
}

impl AppContext {
    pub fn new(
        config: Config,
        backend: Arc<dyn ChatBackend>,
        state: StateStore,
        model_override: Option<String>,
        quiet: bool,
    ) -> Self {
        Self {
            config,
            backend,
            state,
            quiet,
            model_override,
        }
    }

    /// `--model`, then the persisted selection, then the config default.
    pub fn model(&self) -> String {
        self.model_override
            .clone()
            .or_else(|| self.state.selected_model().map(str::to_string))
            .unwrap_or_else(|| self.config.chat.default_model.clone())
    }
}

//! Telegram front end: a long-polling bot that walks users through creating
//! and retrieving VPN subscriptions.
//!
//! All panel access goes through [`subgate_panel::PanelClient`]; this crate
//! owns only the conversation (commands, inline keyboards, the add-device
//! dialogue) and the Russian user-facing texts.

use std::sync::Arc;

use {
    teloxide::{
        dispatching::dialogue::{self, InMemStorage},
        prelude::*,
    },
    tracing::info,
};

use subgate_panel::PanelClient;

mod handlers;
mod keyboards;
mod texts;

pub use handlers::{Command, DialogState, FlowDialogue, HandlerResult};

/// Shared state injected into every handler.
pub struct BotContext {
    pub client: Arc<PanelClient>,
    /// Copy-page web app; the copy button is omitted when unset.
    pub web_app_url: Option<String>,
}

/// Run the bot until the process is stopped. Long polling only.
pub async fn run(bot: Bot, ctx: Arc<BotContext>) {
    let handler = dialogue::enter::<Update, InMemStorage<DialogState>, DialogState, _>()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handlers::handle_command),
        )
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_text));

    info!("starting telegram dispatcher");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx, InMemStorage::<DialogState>::new()])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text(
            "update handler failed",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

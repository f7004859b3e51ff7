//! Update handlers: commands, inline-button callbacks, and free-text device
//! names.

use std::sync::Arc;

use {
    anyhow::Result,
    teloxide::{
        dispatching::dialogue::InMemStorage,
        prelude::*,
        types::{ChatId, ParseMode, User},
        utils::command::BotCommands,
    },
    tracing::{error, warn},
};

use {
    crate::{
        BotContext, keyboards,
        texts::{self, DeviceKind},
    },
    subgate_panel::{Identity, ProvisionOutcome, Subscription},
};

pub type HandlerResult = Result<()>;
pub type FlowDialogue = Dialogue<DialogState, InMemStorage<DialogState>>;

/// Per-chat state of the add-device conversation.
#[derive(Clone, Default)]
pub enum DialogState {
    #[default]
    Idle,
    /// The next plain-text message names the new device.
    AwaitingDeviceName,
    /// A device name was chosen; consumed when the subscription is created.
    DeviceNamed { device_name: String },
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case")]
pub enum Command {
    #[command(description = "начать работу с ботом")]
    Start,
    #[command(description = "показать справку")]
    Help,
    #[command(description = "получить ссылку на VPN подписку")]
    GetVpn,
    #[command(description = "показать список ваших устройств")]
    Devices,
}

// ── Commands ─────────────────────────────────────────────────────────────────

pub async fn handle_command(
    bot: Bot,
    ctx: Arc<BotContext>,
    msg: Message,
    cmd: Command,
) -> HandlerResult {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    match cmd {
        Command::Start => {
            let has_subs = has_subscriptions(&ctx, &user).await;
            bot.send_message(chat_id, texts::welcome(&user.first_name, has_subs))
                .reply_markup(keyboards::main_menu(has_subs))
                .await?;
        },
        Command::Help => {
            let has_subs = has_subscriptions(&ctx, &user).await;
            bot.send_message(chat_id, texts::help(has_subs))
                .reply_markup(keyboards::main_menu(has_subs))
                .await?;
        },
        Command::GetVpn => send_device_type_menu(&bot, chat_id).await?,
        Command::Devices => send_device_list(&bot, &ctx, chat_id, &user).await?,
    }
    Ok(())
}

// ── Callbacks ────────────────────────────────────────────────────────────────

pub async fn handle_callback(
    bot: Bot,
    dialogue: FlowDialogue,
    ctx: Arc<BotContext>,
    q: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) else {
        return Ok(());
    };
    let user = &q.from;

    match data {
        keyboards::GET_VPN => send_device_type_menu(&bot, chat_id).await,
        keyboards::SETUP_APPLE => send_download(&bot, chat_id, DeviceKind::Apple).await,
        keyboards::SETUP_ANDROID => send_download(&bot, chat_id, DeviceKind::Android).await,
        keyboards::SETUP_DESKTOP => send_download(&bot, chat_id, DeviceKind::Desktop).await,
        keyboards::APP_DOWNLOADED => {
            generate_subscription(&bot, &dialogue, &ctx, chat_id, user).await
        },
        keyboards::SUBSCRIPTION_LIST => send_subscription_menu(&bot, &ctx, chat_id, user).await,
        keyboards::ADD_DEVICE => start_add_device(&bot, &dialogue, chat_id, user).await,
        keyboards::ENTER_CUSTOM_NAME => {
            dialogue.update(DialogState::AwaitingDeviceName).await?;
            bot.send_message(chat_id, texts::ENTER_DEVICE_NAME).await?;
            Ok(())
        },
        other => {
            if let Some(sub_id) = other.strip_prefix(keyboards::SELECT_SUB_PREFIX) {
                select_subscription(&bot, &ctx, chat_id, user, sub_id).await
            } else if let Some(name) = other.strip_prefix(keyboards::DEVICE_NAME_PREFIX) {
                device_name_chosen(&bot, &dialogue, chat_id, name).await
            } else {
                warn!(data = other, "unrecognized callback data");
                Ok(())
            }
        },
    }
}

// ── Free text ────────────────────────────────────────────────────────────────

/// Only meaningful while a custom device name is awaited; anything else is
/// ignored so stray chatter does not trigger replies.
pub async fn handle_text(bot: Bot, dialogue: FlowDialogue, msg: Message) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !matches!(dialogue.get().await?, Some(DialogState::AwaitingDeviceName)) {
        return Ok(());
    }

    let name = text.trim();
    if name.is_empty() {
        bot.send_message(msg.chat.id, texts::EMPTY_DEVICE_NAME).await?;
        return Ok(());
    }
    if name.chars().count() > 50 {
        bot.send_message(msg.chat.id, texts::DEVICE_NAME_TOO_LONG).await?;
        return Ok(());
    }
    device_name_chosen(&bot, &dialogue, msg.chat.id, name).await
}

// ── Flow steps ───────────────────────────────────────────────────────────────

async fn send_device_type_menu(bot: &Bot, chat_id: ChatId) -> HandlerResult {
    bot.send_message(chat_id, texts::CHOOSE_DEVICE_TYPE)
        .reply_markup(keyboards::device_type())
        .await?;
    Ok(())
}

async fn send_download(bot: &Bot, chat_id: ChatId, kind: DeviceKind) -> HandlerResult {
    bot.send_message(chat_id, texts::download_instructions(kind, None))
        .parse_mode(ParseMode::Markdown)
        .reply_markup(keyboards::app_downloaded())
        .await?;
    Ok(())
}

/// A device name was picked (preset button or typed). When the name already
/// tells us the platform, skip straight to the download step.
async fn device_name_chosen(
    bot: &Bot,
    dialogue: &FlowDialogue,
    chat_id: ChatId,
    name: &str,
) -> HandlerResult {
    dialogue
        .update(DialogState::DeviceNamed { device_name: name.to_string() })
        .await?;

    match texts::device_kind(name) {
        Some(kind) => {
            bot.send_message(chat_id, texts::download_instructions(kind, Some(name)))
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboards::app_downloaded())
                .await?;
        },
        None => {
            bot.send_message(chat_id, texts::choose_type_for_named_device(name))
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboards::device_type())
                .await?;
        },
    }
    Ok(())
}

async fn start_add_device(
    bot: &Bot,
    dialogue: &FlowDialogue,
    chat_id: ChatId,
    user: &User,
) -> HandlerResult {
    if user.username.is_none() {
        bot.send_message(chat_id, texts::NO_USERNAME_FOR_DEVICE).await?;
        return Ok(());
    }
    // Forget any name left over from an abandoned flow.
    dialogue.update(DialogState::Idle).await?;
    bot.send_message(chat_id, texts::ADD_DEVICE_PROMPT)
        .parse_mode(ParseMode::Markdown)
        .reply_markup(keyboards::device_names())
        .await?;
    Ok(())
}

/// The "app downloaded" confirmation: provision the account and deliver the
/// subscription link, editing the interim "processing" message in place.
async fn generate_subscription(
    bot: &Bot,
    dialogue: &FlowDialogue,
    ctx: &BotContext,
    chat_id: ChatId,
    user: &User,
) -> HandlerResult {
    let processing = bot.send_message(chat_id, texts::PROCESSING).await?;

    let Some(username) = user.username.clone() else {
        bot.edit_message_text(chat_id, processing.id, texts::NO_USERNAME)
            .await?;
        return Ok(());
    };

    let device_name = match dialogue.get().await? {
        Some(DialogState::DeviceNamed { device_name }) => Some(device_name),
        _ => None,
    };

    let identity = Identity::new(user.id.0, Some(username.clone()));
    let outcome = ctx
        .client
        .create_account(&identity, device_name.as_deref())
        .await;

    let (text, url) = match outcome {
        Ok(ProvisionOutcome::Created { url, .. }) => (texts::subscription_created(true), Some(url)),
        Ok(ProvisionOutcome::AlreadyExists { url: Some(url) }) => {
            (texts::subscription_created(false), Some(url))
        },
        Ok(ProvisionOutcome::AlreadyExists { url: None }) => {
            (texts::already_exists_unresolved(&username), None)
        },
        Ok(ProvisionOutcome::Rejected(reason)) => (texts::rejection(reason), None),
        Err(e) => {
            error!(error = %e, owner_id = user.id.0, "provisioning failed");
            (texts::GENERATION_ERROR.to_string(), None)
        },
    };

    match url {
        Some(url) => {
            dialogue.update(DialogState::Idle).await?;
            let has_multiple = subscription_count(ctx, user).await > 1;
            bot.edit_message_text(chat_id, processing.id, text)
                .reply_markup(keyboards::subscription_result(
                    ctx.web_app_url.as_deref(),
                    &url,
                    has_multiple,
                ))
                .await?;
        },
        None => {
            bot.edit_message_text(chat_id, processing.id, text).await?;
        },
    }
    Ok(())
}

// ── Subscription listing ─────────────────────────────────────────────────────

async fn send_subscription_menu(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: ChatId,
    user: &User,
) -> HandlerResult {
    let Some(subs) = owned_subscriptions(bot, ctx, chat_id, user, texts::SUBSCRIPTIONS_ERROR)
        .await?
    else {
        return Ok(());
    };

    match subs.as_slice() {
        [] => {
            bot.send_message(chat_id, texts::NO_SUBSCRIPTIONS).await?;
        },
        [only] => send_subscription_details(bot, ctx, chat_id, only, false).await?,
        _ => {
            bot.send_message(chat_id, texts::CHOOSE_SUBSCRIPTION)
                .reply_markup(keyboards::subscription_list(&subs))
                .await?;
        },
    }
    Ok(())
}

async fn select_subscription(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: ChatId,
    user: &User,
    sub_id: &str,
) -> HandlerResult {
    let Some(subs) =
        owned_subscriptions(bot, ctx, chat_id, user, texts::SUBSCRIPTIONS_ERROR).await?
    else {
        return Ok(());
    };

    match subs.iter().find(|s| s.sub_id == sub_id) {
        Some(sub) => send_subscription_details(bot, ctx, chat_id, sub, subs.len() > 1).await?,
        None => {
            bot.send_message(chat_id, texts::SUBSCRIPTION_NOT_FOUND).await?;
        },
    }
    Ok(())
}

async fn send_subscription_details(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: ChatId,
    sub: &Subscription,
    has_multiple: bool,
) -> HandlerResult {
    bot.send_message(chat_id, texts::subscription_details(&sub.label))
        .reply_markup(keyboards::subscription_result(
            ctx.web_app_url.as_deref(),
            &sub.url,
            has_multiple,
        ))
        .await?;
    Ok(())
}

async fn send_device_list(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: ChatId,
    user: &User,
) -> HandlerResult {
    let Some(subs) =
        owned_subscriptions(bot, ctx, chat_id, user, texts::DEVICES_ERROR).await?
    else {
        return Ok(());
    };

    if subs.is_empty() {
        bot.send_message(chat_id, texts::NO_DEVICES).await?;
        return Ok(());
    }

    let mut text = texts::device_list_header(subs.len());
    for (n, sub) in subs.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", n + 1, texts::label_text(&sub.label)));
    }
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Markdown)
        .reply_markup(keyboards::subscription_list(&subs))
        .await?;
    Ok(())
}

// ── Shared lookups ───────────────────────────────────────────────────────────

/// The user's subscriptions, or `None` after an error reply has already been
/// sent (missing username, panel failure).
async fn owned_subscriptions(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: ChatId,
    user: &User,
    error_text: &str,
) -> Result<Option<Vec<Subscription>>> {
    let Some(username) = user.username.as_deref() else {
        bot.send_message(chat_id, texts::UNKNOWN_ACCOUNT).await?;
        return Ok(None);
    };
    match ctx.client.list_by_owner(user.id.0, Some(username)).await {
        Ok(subs) => Ok(Some(subs)),
        Err(e) => {
            error!(error = %e, owner_id = user.id.0, "subscription lookup failed");
            bot.send_message(chat_id, error_text).await?;
            Ok(None)
        },
    }
}

async fn has_subscriptions(ctx: &BotContext, user: &User) -> bool {
    subscription_count(ctx, user).await > 0
}

async fn subscription_count(ctx: &BotContext, user: &User) -> usize {
    let username = user.username.as_deref();
    match ctx.client.list_by_owner(user.id.0, username).await {
        Ok(subs) => subs.len(),
        Err(e) => {
            warn!(error = %e, owner_id = user.id.0, "subscription count unavailable");
            0
        },
    }
}

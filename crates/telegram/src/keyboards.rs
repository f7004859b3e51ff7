//! Inline keyboard builders and the callback data they emit.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};

use {crate::texts, subgate_panel::Subscription};

// ── Callback data ────────────────────────────────────────────────────────────

pub const GET_VPN: &str = "get_vpn";
pub const SETUP_APPLE: &str = "setup_iphone_mac";
pub const SETUP_ANDROID: &str = "setup_android";
pub const SETUP_DESKTOP: &str = "setup_windows_linux";
pub const APP_DOWNLOADED: &str = "app_downloaded";
pub const SUBSCRIPTION_LIST: &str = "get_subscription_link";
pub const ADD_DEVICE: &str = "add_device";
pub const ENTER_CUSTOM_NAME: &str = "enter_custom_device_name";
pub const SELECT_SUB_PREFIX: &str = "select_subscription_";
pub const DEVICE_NAME_PREFIX: &str = "device_name_";

// ── Rows ─────────────────────────────────────────────────────────────────────

fn callback(text: &str, data: &str) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.to_string(), data.to_string())
}

/// Support-link row appended to almost every keyboard. Empty when the
/// constant is not a valid URL, which never happens in practice.
fn support_row() -> Vec<InlineKeyboardButton> {
    url::Url::parse(texts::SUPPORT_URL)
        .ok()
        .map(|u| vec![InlineKeyboardButton::url(texts::SUPPORT_BUTTON.to_string(), u)])
        .unwrap_or_default()
}

// ── Keyboards ────────────────────────────────────────────────────────────────

pub fn main_menu(has_subscriptions: bool) -> InlineKeyboardMarkup {
    let mut rows = if has_subscriptions {
        vec![
            vec![callback("📋 Активные подписки", SUBSCRIPTION_LIST)],
            vec![callback("➕ Добавить устройство", ADD_DEVICE)],
        ]
    } else {
        vec![vec![callback("🔗 Получить доступ к SANI_VPN", GET_VPN)]]
    };
    rows.push(support_row());
    InlineKeyboardMarkup::new(rows)
}

pub fn device_type() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback("🍎 iPhone / Mac", SETUP_APPLE)],
        vec![callback("🤖 Android", SETUP_ANDROID)],
        vec![callback("💻 Windows / Linux", SETUP_DESKTOP)],
        support_row(),
    ])
}

pub fn app_downloaded() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback("✅ Я скачал приложение", APP_DOWNLOADED)],
        support_row(),
    ])
}

/// Preset device names, custom-name entry, support.
pub fn device_names() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            callback("📱 iPhone", "device_name_iphone"),
            callback("💻 Mac", "device_name_mac"),
        ],
        vec![
            callback("📱 Android", "device_name_android"),
            callback("💻 Windows", "device_name_windows"),
        ],
        vec![
            callback("💻 Linux", "device_name_linux"),
            callback("📱 iPad", "device_name_ipad"),
        ],
        vec![callback("✏️ Ввести своё имя", ENTER_CUSTOM_NAME)],
        support_row(),
    ])
}

/// One row per subscription, labelled by device.
pub fn subscription_list(subscriptions: &[Subscription]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = subscriptions
        .iter()
        .map(|sub| {
            vec![callback(
                &texts::label_text(&sub.label),
                &format!("{SELECT_SUB_PREFIX}{}", sub.sub_id),
            )]
        })
        .collect();
    rows.push(support_row());
    InlineKeyboardMarkup::new(rows)
}

/// Keyboard under a delivered subscription: optional web-app copy button,
/// navigation, support.
pub fn subscription_result(
    web_app_url: Option<&str>,
    subscription_url: &str,
    has_multiple: bool,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    if let Some(copy) = copy_button(web_app_url, subscription_url) {
        rows.push(vec![copy]);
    }

    let mut nav = Vec::new();
    if has_multiple {
        nav.push(callback("📱 Мои устройства", SUBSCRIPTION_LIST));
    }
    nav.push(callback("➕ Добавить устройство", ADD_DEVICE));
    rows.push(nav);

    rows.push(support_row());
    InlineKeyboardMarkup::new(rows)
}

/// Web-app button that opens the copy page with the subscription URL in the
/// query string. `None` without a configured web app.
fn copy_button(web_app_url: Option<&str>, subscription_url: &str) -> Option<InlineKeyboardButton> {
    let base = web_app_url?;
    let link = copy_link(base, subscription_url);
    let url = url::Url::parse(&link).ok()?;
    Some(InlineKeyboardButton::web_app(
        "📋 Скопировать ссылку".to_string(),
        WebAppInfo { url },
    ))
}

pub fn copy_link(web_app_url: &str, subscription_url: &str) -> String {
    format!("{web_app_url}?url={}", urlencoding::encode(subscription_url))
}

#[cfg(test)]
mod tests {
    use subgate_panel::DeviceLabel;

    use super::*;

    #[test]
    fn copy_link_percent_encodes_the_url() {
        let link = copy_link(
            "https://example.github.io/copy.html",
            "https://1.2.3.4:2096/sub/Ab12_-xyz",
        );
        assert_eq!(
            link,
            "https://example.github.io/copy.html?url=https%3A%2F%2F1.2.3.4%3A2096%2Fsub%2FAb12_-xyz"
        );
    }

    #[test]
    fn main_menu_differs_for_existing_users() {
        let newbie = main_menu(false);
        let returning = main_menu(true);
        assert_eq!(newbie.inline_keyboard.len(), 2);
        assert_eq!(returning.inline_keyboard.len(), 3);
    }

    #[test]
    fn subscription_rows_carry_the_sub_id() {
        let subs = vec![Subscription {
            email: "alice_phone".into(),
            sub_id: "tok123".into(),
            label: DeviceLabel::Named("phone".into()),
            url: "https://h:2096/sub/tok123".into(),
        }];
        let markup = subscription_list(&subs);
        let button = &markup.inline_keyboard[0][0];
        assert_eq!(button.text, "phone");
    }

    #[test]
    fn result_keyboard_has_copy_button_only_with_web_app() {
        let without = subscription_result(None, "https://h/sub/x", false);
        let with = subscription_result(Some("https://copy.page"), "https://h/sub/x", true);
        assert_eq!(without.inline_keyboard.len(), 2);
        assert_eq!(with.inline_keyboard.len(), 3);
        // Navigation gains the devices shortcut when several exist.
        assert_eq!(with.inline_keyboard[1].len(), 2);
    }
}

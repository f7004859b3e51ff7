//! User-facing message texts. The bot speaks Russian to its users; log
//! output stays English.

use subgate_panel::{DeviceLabel, RejectReason};

/// Support contact shown under almost every message.
pub const SUPPORT_URL: &str = "https://t.me/sanya_na_svyazi";
pub const SUPPORT_BUTTON: &str = "💬 Для получения помощи нажми сюда";

pub const PROCESSING: &str = "⏳ Создаю вашу подписку...";
pub const CHOOSE_DEVICE_TYPE: &str = "📱 Выберите ваше устройство для скачивания приложения:";
pub const ENTER_DEVICE_NAME: &str = "✏️ Введите имя для вашего устройства:";
pub const CHOOSE_SUBSCRIPTION: &str = "📋 Выберите устройство для получения ссылки:";

pub const GENERATION_ERROR: &str =
    "❌ Произошла ошибка при обработке запроса.\n\nПожалуйста, попробуйте позже.";
pub const UNKNOWN_ACCOUNT: &str =
    "❌ Не удалось определить ваш аккаунт. Пожалуйста, используйте команду /start.";
pub const EMPTY_DEVICE_NAME: &str = "❌ Имя устройства не может быть пустым. Попробуйте снова.";
pub const DEVICE_NAME_TOO_LONG: &str =
    "❌ Имя устройства слишком длинное. Максимум 50 символов. Попробуйте снова.";
pub const NO_SUBSCRIPTIONS: &str = "❌ У вас нет активных подписок. Используйте кнопку \
     'Получить доступ к SANI_VPN' для создания первой подписки.";
pub const NO_DEVICES: &str = "📱 У вас пока нет устройств.\n\nИспользуйте кнопку \
     'Получить доступ к SANI_VPN' для создания первой подписки.";
pub const SUBSCRIPTION_NOT_FOUND: &str = "❌ Подписка не найдена.";
pub const SUBSCRIPTIONS_ERROR: &str =
    "❌ Произошла ошибка при получении подписок. Попробуйте позже.";
pub const DEVICES_ERROR: &str =
    "❌ Произошла ошибка при получении списка устройств. Попробуйте позже.";

pub const NO_USERNAME: &str = "❌ У вас не установлен username в Telegram.\n\n\
     Для получения VPN доступа необходимо:\n\
     1. Открыть настройки Telegram\n\
     2. Установить username (имя пользователя)\n\
     3. Попробовать снова\n\n\
     Username должен быть уникальным и не должен повторяться.";
pub const NO_USERNAME_FOR_DEVICE: &str = "❌ У вас не установлен username в Telegram.\n\n\
     Для добавления устройства необходимо установить username в настройках Telegram.";

pub const ADD_DEVICE_PROMPT: &str =
    "➕ **Добавление нового устройства**\n\nВыберите имя для вашего устройства или введите своё:";

/// The platform a device name maps to; decides which app link is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Apple,
    Android,
    Desktop,
}

/// Recognize a device kind from a (user-chosen) device name.
pub fn device_kind(name: &str) -> Option<DeviceKind> {
    match name.to_lowercase().as_str() {
        "iphone" | "ipad" | "mac" | "айфон" | "айпад" | "мак" => Some(DeviceKind::Apple),
        "android" | "андроид" => Some(DeviceKind::Android),
        "windows" | "linux" | "виндовс" | "виндоус" | "линукс" => {
            Some(DeviceKind::Desktop)
        },
        _ => None,
    }
}

pub fn welcome(first_name: &str, has_subscriptions: bool) -> String {
    let mut text = format!(
        "Привет, {first_name}! 👋\n\nЯ бот для получения доступа к SANI_VPN.\n\n"
    );
    if has_subscriptions {
        text.push_str("Выберите действие:");
    } else {
        text.push_str("Нажмите кнопку ниже, чтобы настроить подключение.");
    }
    text
}

pub fn help(has_subscriptions: bool) -> String {
    let mut text = String::from(
        "📖 Справка по использованию бота:\n\n\
         • /start - Начать работу с ботом\n\
         • /help - Показать эту справку\n\
         • /get_vpn - Получить ссылку на VPN подписку\n\
         • /devices - Показать список ваших устройств\n\n",
    );
    if has_subscriptions {
        text.push_str("Используйте кнопки ниже для управления подписками.");
    } else {
        text.push_str(
            "Просто нажмите кнопку 'Получить VPN доступ' для создания вашей подписки.",
        );
    }
    text
}

/// App-download instructions for a device kind, optionally prefixed with the
/// confirmed device name (add-device flow).
pub fn download_instructions(kind: DeviceKind, device_name: Option<&str>) -> String {
    let mut text = match device_name {
        Some(name) => format!("✅ Имя устройства: **{name}**\n\n"),
        None => String::new(),
    };
    text.push_str(match kind {
        DeviceKind::Apple => {
            "🍎 **iPhone / Mac**\n\nСкачайте приложение для вашего устройства:\n\n\
             [HAPP Proxy Utility Plus](https://apps.apple.com/ru/app/happ-proxy-utility-plus/id6746188973)\n\n\
             После скачивания нажмите кнопку ниже"
        },
        DeviceKind::Android => {
            "🤖 **Android**\n\nСкачайте приложение для вашего устройства:\n\n\
             [v2rayNG](https://github.com/2dust/v2rayNG)\n\n\
             После скачивания нажмите кнопку ниже"
        },
        DeviceKind::Desktop => {
            "💻 **Windows / Linux**\n\nСкачайте приложение для вашего устройства:\n\n\
             [v2rayN](https://github.com/2dust/v2rayN)\n\n\
             После скачивания нажмите кнопку ниже"
        },
    });
    text
}

/// Asks for a device type when the chosen name maps to no known platform.
pub fn choose_type_for_named_device(device_name: &str) -> String {
    format!(
        "✅ Имя устройства: **{device_name}**\n\n\
         Теперь выберите тип устройства для скачивания приложения:"
    )
}

const SETUP_STEPS: &str = "Для настройки VPN приложения выполните следующие шаги:\n\n\
     1️⃣ Нажмите кнопку \"📋 Скопировать ссылку\" ниже - ссылка будет скопирована в буфер обмена\n\n\
     2️⃣ Откройте ваше VPN приложение (HAPP Proxy Utility Plus / v2rayNG / v2rayN)\n\n\
     3️⃣ Нажмите на ➕ в правом верхнем углу экрана\n\n\
     4️⃣ Нажмите «Вставить из буфера обмена» (Paste from Clipboard)\n\n\
     5️⃣ Подключитесь к VPN";

pub fn subscription_created(is_new: bool) -> String {
    let headline = if is_new {
        "✅ Ваша подписка успешно создана!"
    } else {
        "✅ У вас уже есть активная подписка!"
    };
    format!("{headline}\n\n{SETUP_STEPS}")
}

pub fn subscription_details(label: &DeviceLabel) -> String {
    let device_text = match label {
        DeviceLabel::Primary => "основного устройства",
        DeviceLabel::Named(name) => name.as_str(),
    };
    format!("✅ Подписка для {device_text}\n\n{SETUP_STEPS}")
}

pub fn label_text(label: &DeviceLabel) -> String {
    match label {
        DeviceLabel::Primary => "Основное устройство".to_string(),
        DeviceLabel::Named(name) => name.clone(),
    }
}

pub fn already_exists_unresolved(username: &str) -> String {
    format!(
        "⚠️ Пользователь с именем '{username}' уже существует в системе.\n\n\
         Пожалуйста, свяжитесь с администратором."
    )
}

pub fn rejection(reason: RejectReason) -> String {
    match reason {
        RejectReason::UsernameRequired => NO_USERNAME.to_string(),
        RejectReason::TooManyDeviceSlots => {
            "Слишком много устройств с таким именем. Попробуйте другое имя.".to_string()
        },
        RejectReason::NoInboundAvailable | RejectReason::CreateFailed => {
            "❌ Ошибка при создании подписки.\n\n\
             Пожалуйста, попробуйте позже или свяжитесь с администратором."
                .to_string()
        },
    }
}

pub fn device_list_header(count: usize) -> String {
    format!("📱 **Ваши устройства ({count}):**\n\n")
}

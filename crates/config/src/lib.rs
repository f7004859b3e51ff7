pub mod loader;
pub mod schema;

pub use {
    loader::{load, load_file},
    schema::{PanelConfig, SubgateConfig, TelegramConfig},
};

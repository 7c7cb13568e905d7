use std::path::Path;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use log::info;

use super::models::Settings;

pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    // As Rust has no native support for .env files,
    // we use the dotenv_flow crate to import to actual ENV vars.
    if let Ok(dotenv_path) = dotenv_flow::dotenv_flow() {
        info!("Loaded dotenv file: {:?}", dotenv_path);
    }

    let mut builder = with_defaults(Config::builder())?;
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    builder
        .add_source(Environment::default()
            .prefix("BAMBU")
            .separator("_")
            .prefix_separator("_")
            .try_parsing(true))
        .build()?
        .try_deserialize()
}

fn with_defaults(builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("session.timeout", "10s")?
        .set_default("session.port", "8883")?
        .set_default("watch.schedule", "60s")?
        .set_default("watch.retries", "2")
}

use std::{
    env::current_dir,
    fs, io,
    path::{Path, PathBuf},
};

use derive_more::{Display, Error, From};
use dialoguer::Input;

use crate::{
    commands::Init,
    service::{ProjectConfig, CONFIG_FILE},
};

/// `init` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum InitError {
    /// IO-related error.
    #[display(fmt = "unable to write {}", CONFIG_FILE)]
    Io(io::Error),

    /// Unable to serialize the configuration.
    #[display(fmt = "unable to serialize {}", CONFIG_FILE)]
    Yaml(serde_yaml::Error),

    /// Unable to read the asset path from the terminal.
    #[display(fmt = "unable to read asset path")]
    Prompt(dialoguer::Error),

    /// Configuration already exists and `--force` was not passed.
    #[from(ignore)]
    #[display(fmt = "{} already exists, pass --force to overwrite it", CONFIG_FILE)]
    AlreadyExists,
}

/// Init flow entrypoint.
pub(crate) fn init(Init { path, spa, force }: Init) -> Result<(), InitError> {
    println!("Initializing {CONFIG_FILE} config for static app...");

    let path = match path {
        Some(path) => path,
        None => Input::<String>::new()
            .with_prompt("Enter path of statically built assets, relative to repo root")
            .interact_text()?,
    };

    let config_path = write_config(&current_dir()?, &path, spa, force)?;

    println!("Saved {}", config_path.display());

    Ok(())
}

/// Write an initial configuration into `dir`, returning the written file path.
fn write_config(dir: &Path, path: &str, spa: bool, force: bool) -> Result<PathBuf, InitError> {
    let config_path = dir.join(CONFIG_FILE);

    if !force && config_path.exists() {
        return Err(InitError::AlreadyExists);
    }

    fs::write(&config_path, ProjectConfig::render_initial(path, spa)?)?;

    Ok(config_path)
}

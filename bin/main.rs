#![warn(clippy::pedantic, clippy::all, clippy::nursery)]

use std::path::PathBuf;

use mailsink::{config::Config, controller::Controller};

/// Find the configuration file using the following precedence:
/// 1. The first command line argument
/// 2. `MAILSINK_CONFIG` environment variable
/// 3. ./mailsink.toml (current working directory)
///
/// Returns `None` when nothing is found, in which case defaults apply.
fn find_config_file() -> anyhow::Result<Option<PathBuf>> {
    let explicit = std::env::args()
        .nth(1)
        .map(|arg| ("command line argument", arg))
        .or_else(|| {
            std::env::var("MAILSINK_CONFIG")
                .ok()
                .map(|path| ("MAILSINK_CONFIG", path))
        });

    if let Some((source, path)) = explicit {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!("{source} points to non-existent file: {}", path.display());
    }

    let default = PathBuf::from("./mailsink.toml");
    Ok(default.exists().then_some(default))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match find_config_file()? {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    Controller::new(config).run().await
}

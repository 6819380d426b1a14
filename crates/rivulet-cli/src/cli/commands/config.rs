//! `rivulet config` – show where the config lives and what is in effect.

use anyhow::{Context, Result};
use rivulet_core::config::{self, RivuletConfig};

pub fn run_config(cfg: &RivuletConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("# {}", path.display());
    let text = toml::to_string_pretty(cfg).context("serializing config")?;
    print!("{}", text);
    let http = cfg.http_backoff();
    let socket = cfg.socket_backoff();
    println!(
        "# http backoff: {:?} steps up to {:?}; socket backoff: {:?} steps up to {:?}",
        http.step(),
        http.max_delay(),
        socket.step(),
        socket.max_delay()
    );
    Ok(())
}

//! Offline validation: parse everything, contact nothing.

use std::fmt::Write as _;

use strum::IntoEnumIterator;

use shapesync_core::Service;

use super::Loaded;
use crate::cli::GlobalOpts;
use crate::error::CliError;

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = super::load(global)?;
    print!("{}", render(&loaded));
    Ok(())
}

fn render(loaded: &Loaded) -> String {
    let Loaded {
        path,
        config,
        registry,
    } = loaded;
    let mut out = String::new();

    let _ = writeln!(out, "config: {}", path.display());
    let _ = writeln!(out, "routers: {}", config.routers.len());
    for router in &config.routers {
        let services: Vec<String> = Service::iter()
            .filter(|s| router.is_enabled(*s))
            .map(|s| s.to_string())
            .collect();
        let services = if services.is_empty() {
            "no services, skipped".to_owned()
        } else {
            services.join(", ")
        };
        let scheme = if router.tls { "https" } else { "http" };
        let _ = writeln!(
            out,
            "  {} {scheme}://{}:{} ({services})",
            router.name, router.address, router.port
        );
    }

    let _ = writeln!(
        out,
        "static devices: {} from {}",
        registry.len(),
        config.static_devices.display()
    );
    for name in registry.flagged() {
        let _ = writeln!(
            out,
            "  warning: {name} does not start with {}",
            config.static_prefix
        );
    }
    for rejected in &registry.rejected {
        let _ = writeln!(out, "  skipped: {rejected}");
    }

    let _ = writeln!(
        out,
        "ShapedDevices.csv: {}",
        config.artifacts.shaped_devices.display()
    );
    let _ = writeln!(out, "network.json: {}", config.artifacts.network.display());
    out
}

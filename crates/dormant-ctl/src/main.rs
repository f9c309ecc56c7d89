//! Dormant control tool
//!
//! Loads a sleep profile, builds the sleep configuration it describes and
//! reports what the HAL would receive. Nothing here puts the host to sleep;
//! `check` runs the configuration against the mock HAL of the selected
//! platform.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use dormant_config::DormantConfig;
use dormant_hal::mock::MockSleepHal;
use dormant_hal::{PlatformProfile, SleepConfigDescriptor, SleepConfiguration, enter_sleep, image};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "dormant-ctl", version, about = "Inspect and dry-run sleep profiles")]
struct Cli {
    /// Configuration file; searched in /var/lib/dormant then /etc/dormant
    /// when not given. Environment overrides apply on top.
    #[arg(short, long, env = "DORMANT_CONFIG")]
    config: Option<PathBuf>,

    /// Platform profile: a built-in id or a TOML file
    #[arg(short, long)]
    platform: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the descriptor built from a profile
    Show {
        /// Profile name; defaults to `default_profile`
        profile: Option<String>,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Build a profile and hand it to the mock HAL of the platform
    Check { profile: Option<String> },
    /// List the known sleep profiles
    Profiles,
    /// List the built-in platform profiles
    Platforms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Hex,
}

/// Summary printed by `show`
#[derive(Serialize)]
struct Report<'a> {
    profile: &'a str,
    valid: bool,
    cloud_connection_must_persist: bool,
    descriptor: &'a SleepConfigDescriptor,
}

fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Show { profile, format } => {
            let (name, sleep) = build_profile(&config, profile.as_deref())?;
            match format {
                Format::Json => {
                    let report = Report {
                        profile: name,
                        valid: sleep.valid(),
                        cloud_connection_must_persist: sleep.cloud_connection_must_persist(),
                        descriptor: sleep.descriptor(),
                    };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Format::Hex => println!("{}", to_hex(&image::encode(sleep.descriptor()))),
            }
        }
        Command::Check { profile } => {
            let (name, sleep) = build_profile(&config, profile.as_deref())?;
            let platform = load_platform(cli.platform.as_deref().unwrap_or(&config.platform))?;
            info!("Checking profile {} against platform {}", name, platform.id);

            if sleep.cloud_connection_must_persist() {
                info!("No network wakeup configured: cloud session will be closed first");
            }

            let mut hal = MockSleepHal::new(platform);
            let reason = enter_sleep(&mut hal, &sleep)
                .with_context(|| format!("Profile {} rejected", name))?;
            println!("{}", serde_json::to_string(&reason)?);
        }
        Command::Profiles => {
            for (name, profile) in &config.profiles {
                let marker = if config.default_profile.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {:<16} {}", marker, name, profile.mode);
            }
        }
        Command::Platforms => {
            for id in PlatformProfile::builtin_ids() {
                let platform = PlatformProfile::builtin(id)?;
                println!("{:<10} {}", platform.id, platform.name);
            }
        }
    }

    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DormantConfig> {
    match path {
        Some(path) => DormantConfig::load_layered(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => DormantConfig::load_default().context("Failed to load default configuration"),
    }
}

fn build_profile<'a>(
    config: &'a DormantConfig,
    name: Option<&'a str>,
) -> Result<(&'a str, SleepConfiguration)> {
    let name = name
        .or(config.default_profile.as_deref())
        .context("No profile given and no default_profile configured")?;
    let profile = config.profile(Some(name))?;
    let sleep = profile.build()?;
    if !sleep.valid() {
        warn!("Profile {} does not produce a valid sleep configuration", name);
    }
    Ok((name, sleep))
}

fn load_platform(id: &str) -> Result<PlatformProfile> {
    let path = PathBuf::from(id);
    if path.extension().is_some_and(|ext| ext == "toml") {
        return PlatformProfile::from_profile_file(&path)
            .with_context(|| format!("Failed to load platform profile {}", path.display()));
    }
    match PlatformProfile::builtin(id) {
        Ok(platform) => Ok(platform),
        Err(e) => bail!("{} (known: {})", e, PlatformProfile::builtin_ids().join(", ")),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .map(|line| {
            line.iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_show() {
        let cli = Cli::parse_from(["dormant-ctl", "show", "night", "--format", "hex"]);
        assert!(matches!(
            cli.command,
            Command::Show { ref profile, format: Format::Hex } if profile.as_deref() == Some("night")
        ));
    }

    #[test]
    fn test_config_is_optional() {
        let cli = Cli::parse_from(["dormant-ctl", "profiles"]);
        if std::env::var_os("DORMANT_CONFIG").is_none() {
            assert!(cli.config.is_none());
        }

        let cli = Cli::parse_from(["dormant-ctl", "--config", "/tmp/sleep.toml", "platforms"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sleep.toml")));
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleep.toml");
        std::fs::write(&path, "default_profile = \"Nap\"\n\n[profiles.Nap]\nmode = \"stop\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        let (name, sleep) = build_profile(&config, None).unwrap();
        assert_eq!(name, "nap");
        assert!(sleep.valid());
    }

    #[test]
    fn test_to_hex_wraps_lines() {
        let bytes: Vec<u8> = (0..18).collect();
        let hex = to_hex(&bytes);
        assert_eq!(hex.lines().count(), 2);
        assert!(hex.starts_with("00 01 02"));
        assert!(hex.ends_with("10 11"));
    }

    #[test]
    fn test_load_platform_unknown() {
        assert!(load_platform("toaster").is_err());
        assert_eq!(load_platform("wifi").unwrap().id, "wifi");
    }
}

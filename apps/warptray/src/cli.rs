//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use warptray_connection::OperatingMode;

/// Tray control surface for the Cloudflare WARP client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Open the main window on start
    #[arg(long)]
    pub show: bool,

    /// Config file to use instead of ~/.config/warptray/config.toml
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Run one action and exit instead of starting the tray
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print the verified connection state and mode
    Status,
    /// Connect and wait until the connection is verified
    Connect,
    /// Disconnect and wait until the disconnection is verified
    Disconnect,
    /// Connect when disconnected, disconnect when connected
    Toggle,
    /// Create a new registration (accepts the terms of service)
    Register,
    /// Switch the operating mode
    SetMode {
        /// warp, doh, warp+doh, dot, warp+dot, proxy or tunnel_only
        #[arg(value_parser = parse_mode)]
        mode: OperatingMode,
    },
}

fn parse_mode(s: &str) -> Result<OperatingMode, String> {
    let mode = s.parse::<OperatingMode>().map_err(|e| e.to_string())?;
    if mode.is_selectable() {
        Ok(mode)
    } else {
        Err(format!("mode '{s}' cannot be selected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_starts_tray() {
        let args = Args::try_parse_from(["warptray"]).unwrap();
        assert!(!args.show);
        assert!(args.config.is_none());
        assert!(args.command.is_none());
    }

    #[test]
    fn show_and_config_flags() {
        let args =
            Args::try_parse_from(["warptray", "--show", "--config", "/tmp/w.toml"]).unwrap();
        assert!(args.show);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/w.toml")));
    }

    #[test]
    fn set_mode_parses_token() {
        let args = Args::try_parse_from(["warptray", "set-mode", "warp+doh"]).unwrap();
        assert_eq!(
            args.command,
            Some(Commands::SetMode {
                mode: OperatingMode::WarpDoH
            })
        );
    }

    #[test]
    fn set_mode_rejects_unknown_and_posture_only() {
        assert!(Args::try_parse_from(["warptray", "set-mode", "teleport"]).is_err());
        assert!(Args::try_parse_from(["warptray", "set-mode", "posture_only"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let args = Args::try_parse_from(["warptray", "status", "-c", "alt.toml"]).unwrap();
        assert_eq!(args.command, Some(Commands::Status));
        assert_eq!(args.config, Some(PathBuf::from("alt.toml")));
    }
}

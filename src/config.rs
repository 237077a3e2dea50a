use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:9111",
    "http://192.168.0.137:9111",
    "http://127.0.0.1:9111",
];

#[derive(Parser, Debug, Clone)]
#[command(
    name = "qr-menu",
    about = "QR table ordering backend",
    version = crate::version::VERSION,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server (default).
    Run,

    /// Regenerate tokens for tables 1..=N, replacing every existing mapping.
    Configure(ConfigureArgs),

    /// Write a ZIP with one QR code PNG per configured table.
    ExportQr(ExportQrArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigureArgs {
    #[arg(long, value_name = "N")]
    pub tables: i64,
}

#[derive(Args, Debug, Clone)]
pub struct ExportQrArgs {
    #[arg(long, value_name = "PATH", default_value = "all_table_qr_codes.zip")]
    pub out: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    #[arg(
        long,
        global = true,
        env = "QR_MENU_BIND",
        value_name = "ADDR",
        default_value = "0.0.0.0:8000"
    )]
    pub bind: SocketAddr,

    #[arg(
        long,
        global = true,
        env = "QR_MENU_DATA_DIR",
        value_name = "PATH",
        default_value = "./data"
    )]
    pub data_dir: PathBuf,

    /// Base URL encoded into QR codes. Detected from the LAN address when unset.
    #[arg(long, global = true, env = "FRONTEND_URL", value_name = "URL")]
    pub frontend_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "FRONTEND_PORT",
        value_name = "PORT",
        default_value_t = 9111,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub frontend_port: u16,

    #[arg(
        long = "cors-origin",
        global = true,
        env = "QR_MENU_CORS_ORIGINS",
        value_name = "ORIGIN",
        value_delimiter = ',',
        default_values = DEFAULT_CORS_ORIGINS
    )]
    pub cors_origins: Vec<String>,
}

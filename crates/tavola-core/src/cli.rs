use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tavola",
    version,
    about = "Tavola: restaurant admin console",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Config file to read instead of the default location.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Override one config key, e.g. `--set api.timeout_secs=10`.
    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    /// Answer "yes" to every confirmation prompt.
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Menu items.
    #[command(subcommand)]
    Menu(MenuCommand),
    /// Dining tables and their photos.
    #[command(subcommand)]
    Tables(TablesCommand),
    /// Restaurants on the platform (super-admin).
    #[command(subcommand)]
    Restaurants(RestaurantsCommand),
    /// Keep a list on screen, refreshing until Ctrl-C.
    Watch(WatchArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Case-insensitive search term.
    #[arg(short = 's', long = "search", default_value = "")]
    pub search: String,

    /// Category (menu) or status (tables, restaurants); `all` disables it.
    #[arg(short = 'c', long = "category", default_value = "all")]
    pub category: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MenuItemArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub price: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub dietary: Option<String>,
    #[arg(long)]
    pub cuisine: Option<String>,
    #[arg(long)]
    pub chef_special: Option<bool>,
    #[arg(long)]
    pub available: Option<bool>,
    #[command(flatten)]
    pub image: ImageArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ImageArgs {
    /// Image URL, sent as-is.
    #[arg(long = "image-url", conflicts_with = "image_file")]
    pub image_url: Option<String>,

    /// Local image, embedded as a data URL.
    #[arg(long = "image-file")]
    pub image_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum MenuCommand {
    List(ListArgs),
    Add(MenuItemArgs),
    Edit {
        id: String,
        #[command(flatten)]
        fields: MenuItemArgs,
    },
    /// Flip an item's availability.
    Toggle { id: String },
    Delete { id: String },
    /// Category facets of the current menu.
    Categories,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TableArgs {
    #[arg(long = "number")]
    pub table_number: Option<String>,
    #[arg(long)]
    pub capacity: Option<String>,
    #[arg(long = "type")]
    pub kind: Option<String>,
    #[arg(long)]
    pub features: Option<String>,
    #[arg(long = "x")]
    pub x_position: Option<String>,
    #[arg(long = "y")]
    pub y_position: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TablesCommand {
    List(ListArgs),
    Add(TableArgs),
    Delete { id: String },
    /// Upload one or more photos for a table.
    Upload {
        id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    DeleteImage { table: String, image: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RestaurantArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub cuisine: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub admin_id: Option<String>,
    #[arg(long)]
    pub admin_password: Option<String>,
    #[arg(long)]
    pub rating: Option<String>,
    #[command(flatten)]
    pub image: ImageArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RestaurantsCommand {
    List(ListArgs),
    Show { id: String },
    Add(RestaurantArgs),
    Edit {
        id: String,
        #[command(flatten)]
        fields: RestaurantArgs,
    },
    /// Activate or deactivate a restaurant.
    Toggle { id: String },
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[arg(value_enum)]
    pub target: WatchTarget,

    /// Refresh period in seconds; defaults to `refresh.interval_secs`.
    #[arg(long)]
    pub every: Option<u64>,

    #[command(flatten)]
    pub list: ListArgs,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTarget {
    Menu,
    Tables,
    Restaurants,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

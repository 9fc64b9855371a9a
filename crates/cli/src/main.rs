// PriceLens CLI - elasticity analysis and the pricing assistant, headless

mod analyze;
mod assistant;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use pricelens_core::ApiError;
use pricelens_io::{InputFormat, IoError};

use exit_codes::{
    api_exit_code, EXIT_DATA_EXPORT, EXIT_DATA_READ, EXIT_DATA_VALIDATION, EXIT_ERROR,
    EXIT_SUCCESS, EXIT_USAGE,
};

/// Environment variable holding the log filter (falls back to `RUST_LOG`).
const LOG_ENV: &str = "PRICELENS_LOG";

#[derive(Parser)]
#[command(name = "plens")]
#[command(about = "Price elasticity analysis and pricing assistant (CLI mode, headless)")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the columns of a dataset and the price/quantity roles detected
    #[command(after_help = "\
Examples:
  plens columns sales.csv
  plens columns sales.json --json")]
    Columns {
        /// Input file (CSV, TSV or JSON array of objects)
        file: PathBuf,

        /// Input format (default: from file extension)
        #[arg(long, short = 'f')]
        format: Option<DataFormat>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Own-price arc elasticity across adjacent price points
    #[command(after_help = "\
Examples:
  plens price sales.csv
  plens price sales.csv --price 'Unit price' --quantity Sold --decimals 2
  plens price sales.csv --export results.xlsx")]
    Price {
        /// Input file (CSV, TSV or JSON array of objects)
        file: PathBuf,

        /// Price column (default: first column containing 价格/price)
        #[arg(long)]
        price: Option<String>,

        /// Quantity column (default: first column containing 需求量/quantity)
        #[arg(long)]
        quantity: Option<String>,

        /// Input format (default: from file extension)
        #[arg(long, short = 'f')]
        format: Option<DataFormat>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Also write raw data and results to an .xlsx workbook
        #[arg(long, value_name = "OUT.xlsx")]
        export: Option<PathBuf>,

        /// Decimal places in text output (default from settings)
        #[arg(long)]
        decimals: Option<usize>,
    },

    /// Cross-price elasticity of good A's demand on good B's price
    #[command(after_help = "\
Examples:
  plens cross basket.csv
  plens cross basket.csv --price-b 'Coffee price' --quantity-a 'Milk quantity'
  plens cross basket.csv --json --export cross.xlsx")]
    Cross {
        /// Input file (CSV, TSV or JSON array of objects)
        file: PathBuf,

        /// Price column of good A (default: first price column)
        #[arg(long)]
        price_a: Option<String>,

        /// Quantity column of good A (default: first quantity column)
        #[arg(long)]
        quantity_a: Option<String>,

        /// Price column of good B (default: second price column)
        #[arg(long)]
        price_b: Option<String>,

        /// Quantity column of good B (default: second quantity column)
        #[arg(long)]
        quantity_b: Option<String>,

        /// Input format (default: from file extension)
        #[arg(long, short = 'f')]
        format: Option<DataFormat>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Also write raw data and results to an .xlsx workbook
        #[arg(long, value_name = "OUT.xlsx")]
        export: Option<PathBuf>,

        /// Decimal places in text output (default from settings)
        #[arg(long)]
        decimals: Option<usize>,
    },

    /// Talk to the pricing assistant (interactive when MESSAGE is omitted)
    #[command(after_help = "\
Examples:
  plens chat 'How should I price a seasonal product?'
  plens chat 'Explain these results' --file results.xlsx
  plens chat 'And for the premium tier?' --history previous.json
  plens chat                      # interactive, one message per line")]
    Chat {
        /// Message to send
        message: Option<String>,

        #[command(flatten)]
        call: CallArgs,

        /// Prior conversation as a JSON array of {role|isBot, text} objects
        #[arg(long, value_name = "FILE.json", conflicts_with = "file")]
        history: Option<PathBuf>,

        /// Upload a file first and reference it in the conversation
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Request a streamed (server-sent events) response
        #[arg(long)]
        stream: bool,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a file to the assistant service
    Upload {
        /// File to upload
        file: PathBuf,

        #[command(flatten)]
        call: CallArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assistant configuration
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Check assistant configuration and connectivity
    Doctor {
        /// Output as JSON for machine parsing
        #[arg(long)]
        json: bool,

        /// Send a one-line chat request to test connectivity (requires network)
        #[arg(long)]
        test: bool,

        /// API key (overrides keychain and environment)
        #[arg(long, env = "PRICELENS_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Store an API key in the system keychain (reads stdin when KEY is omitted)
    SetKey {
        key: Option<String>,
    },

    /// Remove the stored API key from the system keychain
    ClearKey,
}

/// Flags shared by every command that calls the assistant service.
#[derive(clap::Args, Clone, Debug, Default)]
struct CallArgs {
    /// API key (overrides keychain and environment)
    #[arg(long, env = "PRICELENS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Fail on the first error instead of retrying
    #[arg(long)]
    no_retry: bool,

    /// Retries after the first attempt (default from settings)
    #[arg(long, conflicts_with = "no_retry")]
    max_retries: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DataFormat {
    Csv,
    Tsv,
    Json,
}

impl From<DataFormat> for InputFormat {
    fn from(format: DataFormat) -> Self {
        match format {
            DataFormat::Csv => InputFormat::Csv,
            DataFormat::Tsv => InputFormat::Tsv,
            DataFormat::Json => InputFormat::Json,
        }
    }
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("PRICELENS_COMMIT"), ")",
            "\nengine:  pricelens-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("PRICELENS_TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("PRICELENS_COMMIT"), ")",
            "\nengine:  pricelens-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("PRICELENS_TARGET"),
        )
    }
}

/// Logs go to stderr so stdout stays parseable. `-v` flags win over the
/// environment filter.
fn init_logging(verbose: u8) {
    let env = env_logger::Env::new()
        .filter_or(LOG_ENV, std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()));
    let mut builder = env_logger::Builder::from_env(env);
    let level = match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show usage
            eprintln!("Usage: plens <command> [options]");
            eprintln!("       plens --help for more information");
            Ok(())
        }
        Some(Commands::Columns { file, format, json }) => {
            analyze::cmd_columns(file, format.map(Into::into), json)
        }
        Some(Commands::Price { file, price, quantity, format, json, export, decimals }) => {
            analyze::cmd_price(analyze::PriceArgs {
                file,
                price,
                quantity,
                format: format.map(Into::into),
                json,
                export,
                decimals,
            })
        }
        Some(Commands::Cross {
            file,
            price_a,
            quantity_a,
            price_b,
            quantity_b,
            format,
            json,
            export,
            decimals,
        }) => analyze::cmd_cross(analyze::CrossArgs {
            file,
            price_a,
            quantity_a,
            price_b,
            quantity_b,
            format: format.map(Into::into),
            json,
            export,
            decimals,
        }),
        Some(Commands::Chat { message, call, history, file, stream, model, json }) => {
            assistant::cmd_chat(assistant::ChatArgs {
                message,
                call: call.into(),
                history,
                file,
                stream,
                model,
                json,
            })
        }
        Some(Commands::Upload { file, call, json }) => {
            assistant::cmd_upload(file, call.into(), json)
        }
        Some(Commands::Ai { command }) => match command {
            AiCommands::Doctor { json, test, api_key } => {
                assistant::cmd_ai_doctor(json, test, api_key)
            }
            AiCommands::SetKey { key } => assistant::cmd_ai_set_key(key),
            AiCommands::ClearKey => assistant::cmd_ai_clear_key(),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

impl From<CallArgs> for assistant::CallOptions {
    fn from(args: CallArgs) -> Self {
        assistant::CallOptions {
            api_key: args.api_key,
            no_retry: args.no_retry,
            max_retries: args.max_retries,
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_DATA_READ, message: msg.into(), hint: None }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self { code: EXIT_DATA_EXPORT, message: msg.into(), hint: None }
    }

    /// System keychain unavailable or refused the operation.
    pub fn keychain(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Engine refused the dataset.
    pub fn engine(err: ApiError) -> Self {
        Self { code: EXIT_DATA_VALIDATION, message: err.message, hint: None }
    }

    /// Ingestion or export failure, split by which side failed.
    pub fn data(err: IoError) -> Self {
        match err {
            IoError::Xlsx(_) => Self::export(err.to_string()),
            IoError::UnsupportedFormat(_) => {
                Self::io(err.to_string()).with_hint("pass --format csv|tsv|json")
            }
            _ => Self::io(err.to_string()),
        }
    }

    /// Create error from an assistant call failure with proper exit code.
    pub fn assistant(err: ApiError) -> Self {
        let code = api_exit_code(&err);
        let hint = match code {
            exit_codes::EXIT_AI_MISSING_KEY => Some(format!(
                "pass --api-key or set {}",
                pricelens_config::ai::env_var_name(pricelens_config::ai::PROVIDER)
            )),
            exit_codes::EXIT_AI_AUTH => Some("check that the API key is valid".to_string()),
            exit_codes::EXIT_AI_NETWORK => Some(format!(
                "check connectivity to the endpoint ({} overrides it)",
                pricelens_config::settings::API_BASE_ENV
            )),
            _ => None,
        };
        Self { code, message: err.message, hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

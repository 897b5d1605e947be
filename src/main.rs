//! CLI entry point for `gettor`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use gettor::config::Config;
use gettor::{ParsedRequest, Rejection, RequestParser};

#[derive(Parser)]
#[command(
    name = "gettor",
    version,
    about = "Parse gettor package request mail",
    long_about = "Parse an email requesting a software package from a gettor mirror.\n\
                  Extracts the reply address, reply locale, requested package, split \
                  delivery and authenticated forwarding commands."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ~/.config/gettor/config.toml)
    #[arg(short, long, global = true, value_name = "FILE", env = "GETTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one request message from a file or stdin
    Parse {
        /// Message file; reads stdin when omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the SHA-256 hash to put in [command] password_hash
    HashPassword {
        /// Password; read from stdin when omitted
        password: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => gettor::config::load_config_from(path)?,
        None => gettor::config::load_config()?,
    };

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Parse { file, json } => cmd_parse(&config, file.as_deref(), json),
        Commands::HashPassword { password } => cmd_hash_password(password),
        Commands::Config => cmd_config(&config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = gettor::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "gettor.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Parse one message and print the request, or the rejection.
fn cmd_parse(config: &Config, file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let raw = match file {
        Some(path) => std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("cannot read '{}': {e}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let parser = RequestParser::from_config(config)?;
    match parser.parse(&raw) {
        Ok(request) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&request)?);
            } else {
                print_request_table(&request);
            }
            Ok(())
        }
        Err(rejection) => {
            if json {
                print_rejection_json(&rejection)?;
            } else {
                print_rejection_table(&rejection);
            }
            Err(rejection.into())
        }
    }
}

fn cmd_hash_password(password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        anyhow::bail!("Refusing to hash an empty password");
    }
    println!("{}", gettor::auth::hash_password(&password));
    Ok(())
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "gettor", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let man = clap_mangen::Man::new(Cli::command());
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn print_request_table(request: &ParsedRequest) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    println!();
    println!("  {:<20} {}", "Reply to", request.reply_to);
    println!("  {:<20} {}", "Locale", request.reply_locale);
    if let Some(ref requested) = request.unsupported_locale {
        println!("  {:<20} {}", "Unsupported locale", requested);
    }
    println!(
        "  {:<20} {}",
        "Package",
        request.requested_package.as_deref().unwrap_or("-")
    );
    println!("  {:<20} {}", "Split delivery", yes_no(request.split_delivery));
    println!("  {:<20} {}", "Signature", yes_no(request.signature_verified));
    println!(
        "  {:<20} {}",
        "Plus-address locale",
        yes_no(request.explicit_locale_requested)
    );
    if let Some(ref target) = request.command_target_address {
        println!("  {:<20} {}", "Forward to", target);
    }
    println!();
}

fn print_rejection_table(rejection: &Rejection) {
    println!();
    println!("  {:<20} {}", "Rejected", rejection.reason);
    match rejection.reply_to() {
        Some(addr) => println!("  {:<20} {}", "Notify", addr),
        None => println!("  {:<20} no reply possible", "Notify"),
    }
    println!();
}

fn print_rejection_json(rejection: &Rejection) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "rejected": rejection.reason.to_string(),
        "reply_to": rejection.reply_to(),
        "partial": rejection.partial,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

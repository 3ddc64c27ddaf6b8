use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use ticketwatch::config::{UrlTemplates, parse_dates};
use ticketwatch::extractor::{PriceExtractor, PricePolicy, RE_CURRENCY, lowest};
use ticketwatch::history::HistoryStore;
use ticketwatch::notify::{SmtpConfig, SmtpSecurity};
use ticketwatch::render::{RenderConfig, Renderer};
use ticketwatch::{ConfigError, HttpRenderer, SmtpNotifier, Tracker, TrackerConfig};

#[derive(Parser)]
#[command(name = "ticketwatch")]
#[command(about = "Tracks ticket prices and mails an alert on a new low", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
struct RenderArgs {
    #[arg(
        long,
        env = "USER_AGENT",
        help = "User agent sent with every page request"
    )]
    user_agent: Option<String>,

    #[arg(
        long,
        env = "RENDER_TIMEOUT_MS",
        default_value_t = 45_000,
        help = "Page load timeout in milliseconds"
    )]
    render_timeout_ms: u64,

    #[arg(
        long,
        env = "RENDER_SETTLE_MS",
        default_value_t = 1_500,
        help = "Delay after a page loads before it is read, in milliseconds"
    )]
    render_settle_ms: u64,
}

impl RenderArgs {
    fn into_config(self) -> RenderConfig {
        let defaults = RenderConfig::default();
        RenderConfig {
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            timeout: Duration::from_millis(self.render_timeout_ms),
            settle: Duration::from_millis(self.render_settle_ms),
        }
    }
}

#[derive(Debug, Args)]
struct PolicyArgs {
    #[arg(
        long,
        env = "PRICE_MIN_TOKEN",
        default_value_t = 40.0,
        help = "Amounts at or below this are treated as stray tokens"
    )]
    price_min_token: f64,

    #[arg(
        long,
        env = "PRICE_FLOOR",
        default_value_t = 10.0,
        help = "Lower bound (exclusive) of a plausible ticket price"
    )]
    price_floor: f64,

    #[arg(
        long,
        env = "PRICE_CEILING",
        default_value_t = 5000.0,
        help = "Upper bound (exclusive) of a plausible ticket price"
    )]
    price_ceiling: f64,
}

impl From<PolicyArgs> for PricePolicy {
    fn from(args: PolicyArgs) -> Self {
        PricePolicy {
            min_token: args.price_min_token,
            floor: args.price_floor,
            ceiling: args.price_ceiling,
        }
    }
}

#[derive(Debug, Args)]
struct TrackArgs {
    #[arg(
        long,
        env = "DATES",
        value_name = "YYYY-MM-DD,...",
        help = "Comma-separated travel dates to check"
    )]
    dates: String,

    #[arg(long, env = "KLOOK_URL", help = "Klook URL template containing {DATE}")]
    klook_url: String,

    #[arg(
        long,
        env = "TRIPCOM_URL",
        help = "Trip.com URL template containing {DATE}"
    )]
    tripcom_url: String,

    #[arg(long, env = "EMAIL_TO", help = "Recipient address")]
    email_to: Option<String>,

    #[arg(long, env = "EMAIL_FROM", help = "Sender address")]
    email_from: Option<String>,

    #[arg(long, env = "SMTP_HOST", default_value = "localhost")]
    smtp_host: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    smtp_port: u16,

    #[arg(long, env = "SMTP_USER")]
    smtp_user: Option<String>,

    #[arg(long, env = "SMTP_PASS", hide_env_values = true)]
    smtp_pass: Option<String>,

    #[arg(
        long,
        env = "SMTP_SECURITY",
        default_value = "starttls",
        value_parser = parse_security,
        help = "Connection security: tls, starttls or none"
    )]
    smtp_security: SmtpSecurity,

    #[arg(
        long,
        env = "NOTIFY_ENABLED",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        help = "Send alert and snapshot mails"
    )]
    notify_enabled: bool,

    #[arg(
        long,
        env = "PEOPLE_SUMMARY",
        default_value = "2 adults + child (22 months; check policy)",
        help = "Party description included in every mail"
    )]
    people_summary: String,

    #[arg(
        long,
        env = "HISTORY_PATH",
        default_value = "data/history.json",
        help = "Where the price history is stored"
    )]
    history_path: PathBuf,

    #[arg(
        long,
        env = "SUBJECT_PREFIX",
        default_value = "Shanghai Disneyland",
        help = "Prefix for mail subjects"
    )]
    subject_prefix: String,

    #[command(flatten)]
    render: RenderArgs,

    #[command(flatten)]
    policy: PolicyArgs,
}

impl TrackArgs {
    fn into_config(self, no_notify: bool) -> Result<TrackerConfig, ConfigError> {
        TrackerConfig {
            dates: parse_dates(&self.dates)?,
            urls: UrlTemplates {
                klook: self.klook_url,
                tripcom: self.tripcom_url,
            },
            email_from: self.email_from.unwrap_or_default(),
            email_to: self.email_to.unwrap_or_default(),
            smtp: SmtpConfig {
                host: self.smtp_host,
                port: self.smtp_port,
                username: self.smtp_user,
                password: self.smtp_pass,
                security: self.smtp_security,
            },
            notifications_enabled: self.notify_enabled && !no_notify,
            people: self.people_summary,
            history_path: self.history_path,
            subject_prefix: self.subject_prefix,
            render: self.render.into_config(),
            policy: self.policy.into(),
        }
        .validate()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check every configured date on both vendors, update history and send mail
    Run {
        #[command(flatten)]
        args: TrackArgs,

        #[arg(long, help = "Skip all mail for this run")]
        no_notify: bool,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Show the stored history snapshot
    History {
        #[arg(long, env = "HISTORY_PATH", default_value = "data/history.json")]
        history_path: PathBuf,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Load a single page and show the prices found on it
    Probe {
        #[arg(help = "URL of the page to check")]
        url: String,

        #[command(flatten)]
        render: RenderArgs,

        #[command(flatten)]
        policy: PolicyArgs,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn parse_security(s: &str) -> Result<SmtpSecurity, String> {
    SmtpSecurity::from_str(s).map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Run {
            args,
            no_notify,
            format,
        } => {
            let config = args.into_config(no_notify).unwrap_or_else(|e| {
                log::error!("Invalid configuration: {e}");
                process::exit(1);
            });

            let renderer = HttpRenderer::new(config.render.clone()).unwrap_or_else(|e| {
                log::error!("Error creating renderer: {}", e);
                process::exit(1);
            });
            let notifier = SmtpNotifier::new(&config.smtp).unwrap_or_else(|e| {
                log::error!("Error creating mail transport: {}", e);
                process::exit(1);
            });

            let report = Tracker::new(config, renderer, notifier).run().await;

            match format {
                OutputFormat::Json => serialize_json(&report),
                OutputFormat::Text => print!("{}", report),
            }
        }

        Commands::History {
            history_path,
            format,
        } => {
            let store = HistoryStore::new(history_path);
            let snapshot = match store.try_load() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    log::warn!("History at {} is unreadable: {}", store.path().display(), e);
                    None
                }
            };

            match (snapshot, format) {
                (Some(snapshot), OutputFormat::Json) => serialize_json(&snapshot),
                (Some(snapshot), OutputFormat::Text) => print!("{}", snapshot),
                (None, OutputFormat::Json) => println!("null"),
                (None, OutputFormat::Text) => println!("No history recorded yet."),
            }
        }

        Commands::Probe {
            url,
            render,
            policy,
            format,
        } => {
            let policy = PricePolicy::from(policy).validate().unwrap_or_else(|e| {
                log::error!("Invalid price policy: {e}");
                process::exit(1);
            });
            let renderer = HttpRenderer::new(render.into_config()).unwrap_or_else(|e| {
                log::error!("Error creating renderer: {}", e);
                process::exit(1);
            });

            let page = renderer.render(&url).await.unwrap_or_else(|e| {
                log::error!("Error loading {}: {}", url, e);
                process::exit(1);
            });

            let extractor = PriceExtractor::new(policy);
            let fragments = page.text_fragments(&RE_CURRENCY);
            let candidates = extractor.candidates(&fragments, page.html());
            let min_price = lowest(&candidates);

            match format {
                OutputFormat::Json => serialize_json(&serde_json::json!({
                    "url": page.url(),
                    "fragments": fragments,
                    "candidates": candidates,
                    "minPrice": min_price,
                })),
                OutputFormat::Text => {
                    println!("{} price fragment(s) on {}", fragments.len(), page.url());
                    for fragment in &fragments {
                        println!("  {}", fragment);
                    }
                    println!("Candidates: {:?}", candidates);
                    match min_price {
                        Some(price) => println!("Minimum:    {:.2}", price),
                        None => println!("Minimum:    none found"),
                    }
                }
            }
        }
    }
}

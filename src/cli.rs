use clap::{Args, Parser, Subcommand};
use sevenam::config::{AppConfig, GeminiConfig, WeatherSource};
use sevenam::types::push::VapidConfig;
use std::path::PathBuf;

use chrono::NaiveTime;

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(AppConfig),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    if let Some(Command::Init(args)) = cli.command {
        let code = run_init(args);
        return RunOutcome::Exit(code);
    }

    match resolve_config(cli) {
        Ok(config) => RunOutcome::Serve(config),
        Err(err) => {
            eprintln!("error: {err}");
            RunOutcome::Exit(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "sevenam",
    version,
    about = "Daily weather summaries delivered as push notifications"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    #[arg(long, env = "SEVENAM_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    /// Serve synthetic forecasts instead of calling met.no.
    #[arg(long)]
    use_placeholder: bool,
    #[arg(long, env = "GEMINI_API_KEY")]
    gemini_api_key: Option<String>,
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.0-flash")]
    gemini_model: String,
    #[arg(long, env = "MET_API_USER_AGENT")]
    met_api_user_agent: Option<String>,
    #[arg(long, env = "VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, env = "VAPID_PRIVATE_KEY_BASE64")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "VAPID_PUBLIC_KEY_BASE64")]
    vapid_public_key: Option<String>,
    /// Local time of day (HH:MM) at which summaries are refreshed.
    #[arg(long, env = "SEVENAM_UPDATE_AT", default_value = "07:00", value_parser = parse_update_at)]
    update_at: NaiveTime,
    /// Maximum concurrent deliveries per dispatch round.
    #[arg(long, env = "SEVENAM_FANOUT_LIMIT", default_value_t = 32)]
    fanout_limit: usize,
    /// Seconds a push service may hold an undelivered notification.
    #[arg(long, env = "SEVENAM_PUSH_TTL", default_value_t = 30)]
    push_ttl: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a VAPID key pair.
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

fn run_init(args: InitArgs) -> i32 {
    let credentials = match sevenam::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("VAPID_PRIVATE_KEY_BASE64=\"{}\"", credentials.private_key);
    println!("VAPID_PUBLIC_KEY_BASE64=\"{}\"", credentials.public_key);
    println!("VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace VAPID_SUBJECT with a contact URI you control.");
    }
    0
}

fn parse_update_at(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| format!("invalid update time '{raw}'; expected HH:MM"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_config(cli: Cli) -> Result<AppConfig, String> {
    let gemini_api_key = non_empty(cli.gemini_api_key);
    let met_user_agent = non_empty(cli.met_api_user_agent);
    let vapid_subject = non_empty(cli.vapid_subject);
    let vapid_private_key = non_empty(cli.vapid_private_key);
    let vapid_public_key = non_empty(cli.vapid_public_key);

    let mut missing = Vec::new();
    if gemini_api_key.is_none() {
        missing.push("GEMINI_API_KEY");
    }
    if met_user_agent.is_none() && !cli.use_placeholder {
        missing.push("MET_API_USER_AGENT");
    }
    if vapid_subject.is_none() {
        missing.push("VAPID_SUBJECT");
    }
    if vapid_private_key.is_none() {
        missing.push("VAPID_PRIVATE_KEY_BASE64");
    }
    if vapid_public_key.is_none() {
        missing.push("VAPID_PUBLIC_KEY_BASE64");
    }
    if !missing.is_empty() {
        return Err(format!(
            "missing required configuration: {}",
            missing.join(", ")
        ));
    }
    if cli.fanout_limit == 0 {
        return Err("fanout limit must be greater than 0".to_string());
    }

    let weather = match (cli.use_placeholder, met_user_agent) {
        (true, _) => WeatherSource::Placeholder,
        (false, Some(user_agent)) => WeatherSource::MetNo { user_agent },
        (false, None) => return Err("MET_API_USER_AGENT is required".to_string()),
    };

    Ok(AppConfig {
        port: cli.port,
        data_dir: cli.data_dir,
        weather,
        gemini: GeminiConfig {
            api_key: gemini_api_key.unwrap_or_default(),
            model: cli.gemini_model,
        },
        vapid: VapidConfig {
            private_key: vapid_private_key.unwrap_or_default(),
            public_key: vapid_public_key.unwrap_or_default(),
            subject: vapid_subject.unwrap_or_default(),
        },
        update_at: cli.update_at,
        fanout_limit: cli.fanout_limit,
        push_ttl: cli.push_ttl,
    })
}

//! postpilot: local driver for the PostPilot core
//!
//! Runs requests through the gateway and doubles as the scheduler entry
//! point for the cache sweep.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use postpilot::{BackendSelector, Config, Gateway, Mode, Outcome, ProcessRequest};

/// PostPilot core CLI
#[derive(Parser)]
#[command(name = "postpilot")]
#[command(version = postpilot::PKG_VERSION)]
#[command(about = "PostPilot admission, cache and generation core")]
struct Args {
    /// Config file (default: ~/.postpilot/config.toml, then /etc/postpilot/config.toml)
    #[arg(short, long, env = "POSTPILOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a piece of text
    Process {
        /// Text to process (or omit to read from stdin)
        text: Option<String>,
        /// summarize, context or replies
        #[arg(short, long, default_value = "summarize")]
        mode: Mode,
        #[arg(short, long, default_value = postpilot::gateway::DEFAULT_PERSONA)]
        persona: String,
        #[arg(short, long)]
        style: Option<String>,
        /// Client identity used for rate limiting
        #[arg(long, default_value = "cli")]
        client: String,
    },

    /// Show the rate-limit status of a client
    Status {
        client: String,
        #[arg(short, long)]
        endpoint: Option<String>,
    },

    /// Delete expired cache entries
    Sweep,

    /// Remove every cache entry
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Process {
            text,
            mode,
            persona,
            style,
            client,
        } => {
            let text = resolve_text(text)?;
            let prompt = build_prompt(&text, mode, &persona, style.as_deref());
            let mut request = ProcessRequest::new(client, text, mode, prompt).persona(persona);
            if let Some(style) = style {
                request = request.style(style);
            }

            let gateway = Gateway::from_config(&config).await?;
            match gateway.process(&request).await? {
                Outcome::Denied { retry_after } => {
                    println!("rate limited, retry after {retry_after:.1}s");
                }
                Outcome::Cached(entry) => {
                    println!("{}", entry.result.text);
                    println!("\n(cached, {} / {})", entry.result.provider, entry.result.model);
                }
                Outcome::Generated(result) => {
                    println!("{}", result.text);
                    println!(
                        "\n({} / {}, {:.2}s, {} tokens)",
                        result.provider, result.model, result.processing_time, result.tokens_used
                    );
                }
            }
        }

        Command::Status { client, endpoint } => {
            let limiter = BackendSelector::new(&config).rate_limiter().await;
            let status = limiter.status(&client, endpoint.as_deref()).await;
            println!("backend:   {}", limiter.backend_name());
            println!("allowed:   {}", status.allowed);
            println!("remaining: {}", status.remaining);
            println!("reset in:  {:.1}s", status.reset_after.as_secs_f64());
        }

        Command::Sweep => {
            let cache = BackendSelector::new(&config).cache_manager().await;
            let removed = cache.cleanup_expired().await;
            println!("removed {removed} expired entries ({})", cache.backend().backend_name());
        }

        Command::Clear => {
            let cache = BackendSelector::new(&config).cache_manager().await;
            if !cache.clear().await {
                return Err("cache clear failed".into());
            }
            println!("cache cleared ({})", cache.backend().backend_name());
        }
    }

    Ok(())
}

/// Minimal prompt for local runs. Production prompts come from the caller.
fn build_prompt(text: &str, mode: Mode, persona: &str, style: Option<&str>) -> String {
    let task = match mode {
        Mode::Summarize => "Summarize the tweet below in a few sentences.",
        Mode::Context => "Give background context for the tweet below.",
        Mode::Replies => "Suggest three reply options for the tweet below.",
    };
    let mut prompt = format!("{task}\nPersona: {persona}\n");
    if let Some(style) = style {
        prompt.push_str(&format!("Style: {style}\n"));
    }
    prompt.push_str(&format!("Tweet: {text}"));
    prompt
}

/// Text from the argument, else from piped stdin.
fn resolve_text(arg: Option<String>) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(text) = arg {
        return Ok(text);
    }
    if !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    Err("process: no input provided (pass text as argument or via stdin)".into())
}

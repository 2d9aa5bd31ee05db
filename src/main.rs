//! pyeonan - terminal mental health coach (Gemini powered)
//!
//! USAGE:
//!   pyeonan [--model <id>]        # interactive chat
//!   pyeonan doctor                # check config, key, network
//!   pyeonan config set <key> <v>  # non-interactive config

mod ui;

use anyhow::Result;

use pyeonan::config::{self, Config};
use pyeonan::models::SupportedModel;
use pyeonan::{client, logging};

// ═══════════════════════════════════════════════════════════════
// CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, PartialEq)]
enum Command {
    Interactive { model: Option<String> },
    Doctor,
    ConfigSet { key: String, value: String },
    Help,
}

fn parse_args(args: &[String]) -> Command {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Command::Help;
    }

    match args.first().map(|s| s.as_str()) {
        Some("doctor") => return Command::Doctor,
        Some("config") if args.get(1).map(|s| s.as_str()) == Some("set") => {
            return Command::ConfigSet {
                key: args.get(2).cloned().unwrap_or_default(),
                value: args.get(3).cloned().unwrap_or_default(),
            };
        }
        _ => {}
    }

    let mut model = None;
    let mut i = 0;
    while i < args.len() {
        if let "--model" | "-m" = args[i].as_str() {
            i += 1;
            model = args.get(i).cloned();
        }
        i += 1;
    }

    Command::Interactive { model }
}

fn print_help() {
    println!(r#"pyeonan - mental health coach chat (Gemini powered)

USAGE:
    pyeonan [--model <id>]        # interactive chat
    pyeonan doctor                # check config, key, network
    pyeonan config set <key> <v>  # set config value

FLAGS:
    -m, --model <id>        Use specific model ID
    -h, --help              Show this help

MODELS:
    gemini-2.5-flash-preview-09-2025 (default)
    gemini-2.5-pro-preview-09-2025

CONFIG KEYS:
    key, model, retries, delay, window, base_url

FILES:
    ~/.config/pyeonan/config.json     API key, preferences
    ~/.local/state/pyeonan/pyeonan.log

ENVIRONMENT:
    GEMINI_API_KEY          Override API key from config
    PYEONAN_LOG             Log filter (default: pyeonan=info)

CONTROLS (interactive mode):
    Enter   Send
    Ctrl-R  Reset conversation
    F2      Switch model
    Esc     Quit
"#);
}

// ═══════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match parse_args(&args) {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Doctor => {
            logging::init_stderr()?;
            run_doctor().await
        }
        Command::ConfigSet { key, value } => {
            logging::init_stderr()?;
            run_config_set(&key, &value)
        }
        Command::Interactive { model } => {
            logging::init_file(&logging::log_path()?)?;
            run_interactive(model).await
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════

async fn run_doctor() -> Result<()> {
    println!("pyeonan doctor\n");

    let cfg = Config::load()?;
    println!("[✓] Config: {}", config::config_path()?.display());

    let has_key = config::resolve_api_key(std::env::var(config::API_KEY_ENV).ok(), &cfg).is_some();
    println!("[{}] API key: {}",
        if has_key { "✓" } else { "✗" },
        if has_key { "configured" } else { "missing" }
    );

    println!("[✓] Model: {}", cfg.default_model);
    println!("[✓] Retries: {} (initial delay {:.1}s), history window: {} turns",
        cfg.max_retries, cfg.initial_delay_secs, cfg.history_window);

    print!("[?] Network: checking...");
    match client::check_connectivity(&cfg.api_base_url).await {
        Ok(()) => println!("\r[✓] Network: connected         "),
        Err(e) => println!("\r[✗] Network: {}", e),
    }

    Ok(())
}

fn run_config_set(key: &str, value: &str) -> Result<()> {
    let mut cfg = Config::load()?;
    cfg.set(key, value)?;
    cfg.save()?;
    tracing::info!(key, "config updated");
    println!("Saved {} to {}", key, config::config_path()?.display());
    Ok(())
}

async fn run_interactive(model: Option<String>) -> Result<()> {
    let mut cfg = Config::load()?;

    let model: SupportedModel = match model {
        Some(m) => m.parse()?,
        None => cfg.default_model,
    };

    let api_key = match config::resolve_api_key(std::env::var(config::API_KEY_ENV).ok(), &cfg) {
        Some(key) => Some(key),
        None => {
            println!("⚠️ API 키가 설정되어 있지 않습니다. (GEMINI_API_KEY 또는 config.json)\n");
            match ui::prompt_api_key() {
                Ok(key) => {
                    cfg.api_key = Some(key.clone());
                    cfg.save()?;
                    println!("\nKey saved to {}\n", config::config_path()?.display());
                    Some(key)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "starting without an API key");
                    None
                }
            }
        }
    };

    tracing::info!(model = %model, has_key = api_key.is_some(), "starting chat");
    ui::run_tui(api_key, cfg, model).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_default_interactive() {
        assert_eq!(parse_args(&[]), Command::Interactive { model: None });
    }

    #[test]
    fn test_parse_model_flag() {
        assert_eq!(
            parse_args(&args(&["-m", "gemini-2.5-pro"])),
            Command::Interactive { model: Some("gemini-2.5-pro".into()) }
        );
    }

    #[test]
    fn test_parse_subcommands() {
        assert_eq!(parse_args(&args(&["doctor"])), Command::Doctor);
        assert_eq!(
            parse_args(&args(&["config", "set", "retries", "3"])),
            Command::ConfigSet { key: "retries".into(), value: "3".into() }
        );
        assert_eq!(parse_args(&args(&["doctor", "--help"])), Command::Help);
    }
}

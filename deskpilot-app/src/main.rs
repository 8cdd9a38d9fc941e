use anyhow::{Context, Result};
use deskpilot_app::bootstrap::build_session;
use deskpilot_app::config::Config;
use deskpilot_app::repl;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn config_init(force: bool) -> Result<()> {
    let path = Config::default_path();
    if Config::write_template(&path, force)? {
        println!("✅ Wrote {}", path.display());
    } else {
        println!("ℹ️  {} already exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("warn");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["config", "init", rest @ ..] => return config_init(rest.contains(&"--force")),
        ["config", "path"] => {
            println!("{}", Config::default_path().display());
            return Ok(());
        }
        [] => {}
        other => {
            eprintln!("Usage: deskpilot [config init [--force] | config path]");
            anyhow::bail!("unrecognized arguments: {}", other.join(" "));
        }
    }

    let path = Config::default_path();
    let config = Config::load(&path).with_context(|| {
        format!("Invalid configuration. Run 'deskpilot config init --force' to reset {}", path.display())
    })?;

    let session = build_session(&config)?;
    repl::run(session).await.context("Terminal I/O failed")?;
    Ok(())
}

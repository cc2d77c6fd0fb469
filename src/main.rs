//! page-speaker - reads PDF books aloud, one page per request
//!
//! Console front end: each stdin line is one chat message from a single user.

use clap::Parser;
use page_speaker::config_loader::Settings;
use page_speaker::dialog::{Action, ChatTransport, Dialog, Incoming, Keyboard};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reads uploaded PDF books aloud, one page per request
#[derive(Parser)]
#[command(name = "page-speaker")]
#[command(author = "StarTuz")]
#[command(version)]
#[command(about = "Reads PDF books aloud page by page", long_about = None)]
struct Cli {
    /// Extra settings file (toml, yaml, json, ...)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Chat identity to act as (defaults to $USER)
    #[arg(short, long)]
    user: Option<String>,

    /// Overrides the working directory for uploads and clips
    #[arg(short, long)]
    workdir: Option<PathBuf>,
}

/// Prints replies to stdout and treats an existing clip file as delivered.
struct ConsoleTransport<W: Write> {
    out: W,
}

impl<W: Write> ChatTransport for ConsoleTransport<W> {
    fn send_text(&mut self, _user: &str, text: &str, keyboard: Option<Keyboard>) {
        let _ = writeln!(self.out, "{}", text);
        let buttons: Vec<String> = match keyboard {
            Some(Keyboard::Reply(keys)) => keys.iter().map(|k| format!("[{}]", k)).collect(),
            Some(Keyboard::Inline(keys)) => keys
                .iter()
                .map(|(label, action)| format!("[{} -> {}]", label, action.data()))
                .collect(),
            None => Vec::new(),
        };
        if !buttons.is_empty() {
            let _ = writeln!(self.out, "  {}", buttons.join(" "));
        }
    }

    fn send_audio(&mut self, _user: &str, path: &Path) -> io::Result<()> {
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} was not produced", path.display()),
            ));
        }
        writeln!(self.out, "♪ {}", path.display())
    }
}

/// Expands a leading `~/` the way a shell would.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn parse_line(line: &str) -> io::Result<Incoming> {
    let line = line.trim();
    if line == "/start" {
        return Ok(Incoming::Start);
    }
    if let Some(path) = line.strip_prefix("/upload ") {
        let path = expand_home(path.trim());
        let bytes = std::fs::read(&path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(Incoming::Document { file_name, bytes });
    }
    if let Some(action) = Action::from_data(line).or(match line {
        "next" => Some(Action::NextPage),
        _ => None,
    }) {
        return Ok(Incoming::Callback(action));
    }
    Ok(Incoming::Text(line.to_string()))
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "page_speaker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(workdir) = cli.workdir {
        settings.workdir = workdir.to_string_lossy().into_owned();
    }
    let user = cli
        .user
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "console".to_string());

    let mut dialog = Dialog::from_settings(&settings)?;
    let mut transport = ConsoleTransport { out: io::stdout() };

    tracing::info!(user = user.as_str(), "page-speaker started");
    dialog.handle(&user, Incoming::Start, &mut transport);

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(incoming) => dialog.handle(&user, incoming, &mut transport),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read upload");
                transport.send_text(&user, "Cannot read that file.", None);
            }
        }
    }

    tracing::info!("page-speaker stopped");
    Ok(())
}

//! `sunga`: command-line client for the Sunga medical records API
//!
//! Every command prints its result as JSON on stdout. Logs go to stderr.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use structopt::StructOpt;
use sunga_infra::api::{ApiError, LoginOutcome, SessionService, UploadFile};
use sunga_infra::store::session_file_path;
use sunga_infra::{config, init_tracing, LogFormat};
use tracing::debug;

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case", about = "Command-line client for the Sunga medical records API")]
struct Opt {
    /// Base URL of the API, overriding the config file
    #[structopt(global = true, long = "api-url", env = "SUNGA_API_URL")]
    api_url: Option<String>,

    /// Config file (TOML or JSON)
    #[structopt(global = true, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Log more messages. `-v` for debug output from sunga, `-vv` for
    /// everything.
    #[structopt(global = true, long, short = "v", parse(from_occurrences))]
    verbose: u8,

    /// Emit logs as JSON lines
    #[structopt(global = true, long)]
    json_logs: bool,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt, Debug)]
enum CollectionsCommand {
    List,
    Get { id: i64 },
    /// Records filed in a collection
    Records { id: i64 },
}

#[derive(StructOpt, Debug)]
enum RecordsCommand {
    List,
    Get { id: i64 },
    /// Case-insensitive search over title, content and filename
    Search { query: String },
    /// Records not filed in any collection
    Unorganized,
    /// Download the rendered PDF of a record
    Pdf {
        id: i64,
        #[structopt(long, short, parse(from_os_str))]
        output: PathBuf,
    },
}

#[derive(StructOpt, Debug)]
enum QrCommand {
    Record {
        id: i64,
        #[structopt(long, short, parse(from_os_str))]
        output: PathBuf,
    },
    Collection {
        id: i64,
        #[structopt(long, short, parse(from_os_str))]
        output: PathBuf,
    },
}

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
enum Command {
    /// Sign in with an email or username. The password is read from
    /// `SUNGA_PASSWORD`, or from the first line of stdin when unset.
    Login {
        #[structopt(long, short)]
        username: String,
    },

    /// Complete a sign-in that asked for a TOTP code
    VerifyTotp { user_id: i64, code: String },

    Logout,

    /// Rotate the access token now
    Refresh,

    /// Show the signed-in user's profile
    Whoami,

    /// Summarize configuration and session state
    Status,

    Collections {
        #[structopt(subcommand)]
        cmd: CollectionsCommand,
    },

    Records {
        #[structopt(subcommand)]
        cmd: RecordsCommand,
    },

    /// Upload images for text extraction
    Ocr {
        #[structopt(parse(from_os_str), required = true)]
        files: Vec<PathBuf>,

        /// File the created records into this collection
        #[structopt(long)]
        collection: Option<i64>,
    },

    /// Generate share-link QR codes (PNG)
    Qr {
        #[structopt(subcommand)]
        cmd: QrCommand,
    },
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    let format = if opt.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    init_tracing(format, opt.verbose);
    debug!("Args parsed, starting up");

    match run(opt).await.and_then(print_result_json) {
        Ok(()) => {}
        Err(err) => {
            // Be graceful about stdout closed by a pipe (`| head`)
            if let Some(io_err) = err.root_cause().downcast_ref::<std::io::Error>() {
                if io_err.kind() == std::io::ErrorKind::BrokenPipe {
                    std::process::exit(0);
                }
            }
            match err.downcast_ref::<ApiError>() {
                Some(api_err) => eprintln!("Error: {}", api_err.user_message()),
                None => eprintln!("Error: {err:#}"),
            }
            std::process::exit(1);
        }
    }
}

fn print_result_json(result: Option<Value>) -> Result<()> {
    if let Some(val) = result {
        writeln!(&mut std::io::stdout(), "{}", serde_json::to_string_pretty(&val)?)?;
    }
    Ok(())
}

fn load_config(opt: &Opt) -> Result<sunga_domain::ClientConfig> {
    let mut config = config::load_with(opt.config.clone())?;
    if let Some(url) = &opt.api_url {
        config.api.base_url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

async fn run(opt: Opt) -> Result<Option<Value>> {
    let config = load_config(&opt)?;
    let session = SessionService::from_config(&config)?;

    let result = match opt.cmd {
        Command::Login { username } => {
            let password =
                login_password(std::env::var(PASSWORD_VAR).ok(), std::io::stdin().lock())?;
            match session.login(&username, &password).await? {
                LoginOutcome::Authenticated(profile) => {
                    json!({ "status": "signed_in", "user": profile })
                }
                LoginOutcome::TotpRequired { user_id } => {
                    json!({ "status": "totp_required", "user_id": user_id })
                }
            }
        }
        Command::VerifyTotp { user_id, code } => {
            let profile = session.verify_totp(user_id, &code).await?;
            json!({ "status": "signed_in", "user": profile })
        }
        Command::Logout => {
            session.logout().await?;
            json!({ "status": "signed_out" })
        }
        Command::Refresh => {
            let claims = session.refresh().await?;
            json!({
                "status": "refreshed",
                "expires_at": claims.as_ref().and_then(|c| c.exp),
            })
        }
        Command::Whoami => {
            let profile = session.restore().await?.ok_or_else(|| anyhow!("not signed in"))?;
            serde_json::to_value(profile)?
        }
        Command::Status => {
            let claims = session.claims().await;
            json!({
                "api_url": config.api.base_url,
                "storage_backend": config.storage.backend,
                "session_file": session_file_path(&config.storage),
                "authenticated": session.is_authenticated().await,
                "user_id": claims.as_ref().and_then(|c| c.user_id),
                "role": claims.as_ref().and_then(|c| c.role.clone()),
                "expires_at": claims.as_ref().and_then(|c| c.exp),
                "expired": claims.as_ref().map(|c| c.is_expired()),
            })
        }
        Command::Collections { cmd } => {
            let collections = session.client().collections();
            match cmd {
                CollectionsCommand::List => collections.list().await?,
                CollectionsCommand::Get { id } => collections.get(id).await?,
                CollectionsCommand::Records { id } => collections.records(id).await?,
            }
        }
        Command::Records { cmd } => {
            let records = session.client().records();
            match cmd {
                RecordsCommand::List => records.list().await?,
                RecordsCommand::Get { id } => records.get(id).await?,
                RecordsCommand::Search { query } => Value::Array(records.search(&query).await?),
                RecordsCommand::Unorganized => Value::Array(records.unorganized().await?),
                RecordsCommand::Pdf { id, output } => {
                    save_bytes(&output, &records.pdf(id).await?).await?
                }
            }
        }
        Command::Ocr { files, collection } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                uploads.push(UploadFile::from_path(path).await?);
            }
            session.client().ocr().extract_text(uploads, collection).await?
        }
        Command::Qr { cmd } => {
            let qr = session.client().qr();
            match cmd {
                QrCommand::Record { id, output } => save_bytes(&output, &qr.record(id).await?).await?,
                QrCommand::Collection { id, output } => {
                    save_bytes(&output, &qr.collection(id).await?).await?
                }
            }
        }
    };
    Ok(Some(result))
}

const PASSWORD_VAR: &str = "SUNGA_PASSWORD";

/// The password from the environment if set, else the first line of
/// `input` without its line ending. Never taken from argv.
fn login_password(from_env: Option<String>, mut input: impl BufRead) -> Result<String> {
    if let Some(password) = from_env.filter(|p| !p.is_empty()) {
        return Ok(password);
    }
    let mut line = String::new();
    input.read_line(&mut line).context("failed to read password from stdin")?;
    let password = line.trim_end_matches(&['\r', '\n'][..]);
    if password.is_empty() {
        bail!("no password given; set {PASSWORD_VAR} or pipe it on stdin");
    }
    Ok(password.to_string())
}

async fn save_bytes(path: &Path, bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        bail!("server returned an empty file");
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(json!({ "path": path, "bytes": bytes.len() }))
}

use anyhow::{Context, Result};
use clap::Parser;

use rftp::config::{Endpoint, UploadConfig, make_absolute, normalize_remote_path, parse_server_url};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rftp",
    version,
    about = "Mirror a local directory subtree onto an FTP server",
    long_about = "`rftp` uploads a local directory subtree (or a single file) onto an FTP
server over one shared session.

EXAMPLE:
    # Upload the site build, replacing the previous remote contents
    rftp ./public --server ftp://ftp.example.com --user deploy \\
        --remote-path /site --clean --overwrite --progress

The password is taken from --password or the RFTP_PASSWORD environment
variable. The whole upload is a single best-effort pass: the first failing
operation fails the task."
)]
struct Args {
    // Connection
    /// FTP server URL, e.g. ftp://host[:port]
    ///
    /// The ftps:// scheme selects the encrypted variant of the protocol.
    #[arg(long, value_name = "URL", help_heading = "Connection")]
    server: String,

    /// User name for the server endpoint
    #[arg(long, value_name = "NAME", help_heading = "Connection")]
    user: String,

    /// Password for the server endpoint
    ///
    /// Falls back to the RFTP_PASSWORD environment variable, which keeps
    /// the secret out of the shell history.
    #[arg(long, value_name = "PASSWORD", help_heading = "Connection")]
    password: Option<String>,

    // Upload options
    /// Remote directory to upload into
    #[arg(long, value_name = "PATH", help_heading = "Upload options")]
    remote_path: String,

    /// Glob pattern selecting entries to upload (can be specified multiple times)
    ///
    /// Patterns use glob syntax: * matches anything except /, ** matches
    /// anything including /, ? matches a single character, [...] for
    /// character classes. A pattern without / also matches file base names
    /// at any depth below the root folder; a pattern with / must match the
    /// full path relative to it. A sole * selects everything. Defaults
    /// to * when no pattern is given.
    #[arg(short = 'p', long = "pattern", value_name = "PATTERN", action = clap::ArgAction::Append, help_heading = "Upload options")]
    pattern: Vec<String>,

    /// Remove the entire remote target directory before uploading
    #[arg(long, help_heading = "Upload options")]
    clean: bool,

    /// Upload files even if they already exist remotely
    ///
    /// Without this flag every candidate file costs one remote directory
    /// listing, and files already present are skipped.
    #[arg(long, help_heading = "Upload options")]
    overwrite: bool,

    /// Place all files directly under the remote path, discarding the
    /// local directory structure
    #[arg(long, help_heading = "Upload options")]
    flatten: bool,

    /// Directory used to resolve a relative root folder (defaults to the
    /// current directory)
    #[arg(long, value_name = "PATH", help_heading = "Upload options")]
    repo_root: Option<std::path::PathBuf>,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    // ARGUMENTS
    /// Local folder (or single file) to upload
    #[arg(value_name = "ROOT")]
    root_folder: std::path::PathBuf,
}

fn build_config(args: &Args) -> Result<UploadConfig> {
    let (host, port, secure) = parse_server_url(&args.server)?;
    let password = match &args.password {
        Some(password) => password.clone(),
        None => std::env::var("RFTP_PASSWORD")
            .context("no password given, use --password or set RFTP_PASSWORD")?,
    };
    let repo_root = match &args.repo_root {
        Some(repo_root) => repo_root.clone(),
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };
    let patterns = if args.pattern.is_empty() {
        vec!["*".to_string()]
    } else {
        args.pattern.clone()
    };
    Ok(UploadConfig {
        root_folder: make_absolute(&args.root_folder, &repo_root),
        patterns,
        remote_path: normalize_remote_path(&args.remote_path),
        clean: args.clean,
        overwrite: args.overwrite,
        flatten: args.flatten,
        endpoint: Endpoint {
            host,
            port,
            user: args.user.clone(),
            password,
            secure,
        },
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let show_progress = args.progress;
    let func = move || async move {
        let transport = rftp::transport::FtpTransport::new();
        rftp::upload::run_upload(&config, transport, show_progress).await
    };
    match common::run(output, runtime, func) {
        Some(report) => {
            println!("{report}");
            Ok(())
        }
        None => std::process::exit(1),
    }
}

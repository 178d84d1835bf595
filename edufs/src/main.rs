mod config;
mod output;
mod progress;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::Settings;
use edufs_core::{
    CancelToken, CasNode, ContentId, DirectoryPublisher, Error, HttpNode, NamePublisher,
    Retriever, RootSource, RootStrategy, WalkOptions,
};
use output::{
    CancelledOutput, DownloadOutput, NameBinding, OutputWriter, PublishOutput, ResolveOutput,
    Status, StatusOutput,
};
use progress::TerminalProgress;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// eduFs - publish files to an IPFS-compatible network
#[derive(Parser)]
#[command(name = "edufs")]
#[command(about = "Publish files and directories to an IPFS-compatible node", long_about = None)]
#[command(version)]
struct Cli {
    /// Node RPC endpoint, URL or multiaddress (defaults to EDUFS_NODE env var or http://127.0.0.1:5001)
    #[arg(long, global = true)]
    node: Option<String>,

    /// Gateway used for links (defaults to EDUFS_GATEWAY env var or https://ipfs.io)
    #[arg(long, global = true)]
    gateway: Option<String>,

    /// Per-request timeout in seconds, 0 waits forever (defaults to EDUFS_TIMEOUT env var)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the identity of the connected node
    Status,

    /// Upload and pin a file or directory
    Add {
        /// File or directory to add
        #[arg(long)]
        path: PathBuf,

        #[command(flatten)]
        options: PublishArgs,
    },

    /// Write content to stdout
    Cat {
        /// Content identifier
        #[arg(long)]
        cid: String,
    },

    /// Add a file or directory and optionally point a name at it
    Publish {
        /// File or directory to publish
        #[arg(long)]
        path: PathBuf,

        /// Key whose name should point at the new root
        #[arg(long)]
        ipns_key: Option<String>,

        #[command(flatten)]
        options: PublishArgs,
    },

    /// Save content to a file
    Download {
        /// Content identifier
        #[arg(long)]
        cid: String,

        /// Destination path
        #[arg(long)]
        output: PathBuf,
    },

    /// Resolve a name to the identifier it points at
    Resolve {
        /// Name to resolve
        #[arg(long)]
        name: String,
    },
}

#[derive(Args)]
struct PublishArgs {
    /// Use the first uploaded file as the root instead of a directory upload
    #[arg(long)]
    first_entry_root: bool,

    /// Skip files excluded by .gitignore and .ignore
    #[arg(long)]
    respect_ignore: bool,

    /// Do not render upload progress
    #[arg(long)]
    no_progress: bool,

    /// Stop starting new uploads after this many seconds
    #[arg(long)]
    deadline: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = OutputWriter::new(cli.json);
    match run(cli, &output) {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            let status = Status::Error;
            output.write_error(&err, status.code());
            ExitCode::from(status.code())
        }
    }
}

/// Logs go to stderr so `cat` output stays clean.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli, output: &OutputWriter) -> Result<Status> {
    // Settings: flag > EDUFS_* env var > default
    let settings = Settings::resolve(cli.node, cli.gateway, cli.timeout)?;
    let node = HttpNode::new(settings.node.clone())
        .with_context(|| format!("Failed to set up client for {}", settings.node.base_url))?;

    match cli.command {
        Commands::Status => cmd_status(&node, output),
        Commands::Add { path, options } => {
            cmd_publish(&node, &settings, output, &path, None, &options)
        }
        Commands::Cat { cid } => cmd_cat(&node, &cid),
        Commands::Publish {
            path,
            ipns_key,
            options,
        } => cmd_publish(&node, &settings, output, &path, ipns_key.as_deref(), &options),
        Commands::Download { cid, output: dest } => cmd_download(&node, output, &cid, &dest),
        Commands::Resolve { name } => cmd_resolve(&node, &settings, output, &name),
    }
}

fn parse_cid(cid_str: &str) -> Result<ContentId> {
    ContentId::parse(cid_str).with_context(|| format!("Invalid CID: {}", cid_str))
}

fn cmd_status(node: &HttpNode, output: &OutputWriter) -> Result<Status> {
    let info = node
        .id()
        .with_context(|| format!("Failed to reach node at {}", node.base_url()))?;

    let data = StatusOutput {
        success: true,
        result_code: 0,
        endpoint: node.base_url().to_string(),
        node: info,
    };

    output.write(&data, || {
        format!(
            "Node: {}\nID: {}\nAgent: {}\nProtocol: {}\n",
            data.endpoint, data.node.id, data.node.agent_version, data.node.protocol_version
        )
    })?;

    Ok(Status::Success)
}

fn cmd_publish(
    node: &dyn CasNode,
    settings: &Settings,
    output: &OutputWriter,
    path: &Path,
    ipns_key: Option<&str>,
    options: &PublishArgs,
) -> Result<Status> {
    let strategy = if options.first_entry_root {
        RootStrategy::FirstEntry
    } else {
        RootStrategy::Directory
    };

    let mut publisher = DirectoryPublisher::new(node)
        .with_strategy(strategy)
        .with_walk_options(WalkOptions {
            respect_ignore_files: options.respect_ignore,
        });
    if !options.no_progress && !output.is_json() && atty::is(atty::Stream::Stderr) {
        publisher = publisher.with_observer(Arc::new(TerminalProgress::stderr()));
    }
    if let Some(secs) = options.deadline {
        let token = CancelToken::with_timeout(Duration::from_secs(secs));
        publisher = publisher.with_cancel_token(token);
    }

    let result = match publisher.publish(path) {
        Ok(result) => result,
        Err(Error::Cancelled { results }) => {
            let message = format!(
                "Publish of {} cancelled after {} file(s)",
                path.display(),
                results.len()
            );
            let data = CancelledOutput::new(message, results);
            output.write(&data, || data.to_text())?;
            return Ok(Status::Error);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to publish {}", path.display()));
        }
    };

    if result.root_source == RootSource::FirstEntry {
        warn!(
            root = %result.root_cid,
            "root identifier is the first uploaded file and does not represent the whole directory"
        );
    }

    let url = settings.ipfs_url(result.root_cid.as_str());
    let root_cid = result.root_cid.clone();
    let mut data = PublishOutput::new(result, url);

    if let Some(key) = ipns_key {
        let record = NamePublisher::new(node)
            .publish_name(key, &root_cid)
            .with_context(|| format!("Failed to publish name for key {} -> {}", key, root_cid))?;
        data.name = Some(NameBinding {
            key: key.to_string(),
            url: settings.ipns_url(&record.name),
            name: record.name,
            value: record.value,
        });
    }

    output.write(&data, || data.to_text())?;

    Ok(data.status)
}

fn cmd_cat(node: &HttpNode, cid_str: &str) -> Result<Status> {
    let cid = parse_cid(cid_str)?;

    let retrieval = Retriever::new(node)
        .retrieve(&cid)
        .with_context(|| format!("Failed to fetch {}", cid))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    retrieval
        .copy_to(&mut handle)
        .with_context(|| format!("Failed to output content {}", cid))?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(Status::Success)
}

fn cmd_download(
    node: &HttpNode,
    output: &OutputWriter,
    cid_str: &str,
    dest: &Path,
) -> Result<Status> {
    let cid = parse_cid(cid_str)?;

    let bytes = Retriever::new(node)
        .retrieve(&cid)
        .and_then(|retrieval| retrieval.save_to(dest))
        .with_context(|| format!("Failed to download {} to {}", cid, dest.display()))?;

    let data = DownloadOutput {
        success: true,
        result_code: 0,
        cid: cid.to_string(),
        destination: dest.display().to_string(),
        bytes,
    };

    output.write(&data, || {
        format!(
            "Downloaded {} to {} ({})\n",
            data.cid,
            data.destination,
            progress::human_bytes(data.bytes)
        )
    })?;

    Ok(Status::Success)
}

fn cmd_resolve(
    node: &HttpNode,
    settings: &Settings,
    output: &OutputWriter,
    name: &str,
) -> Result<Status> {
    let cid = NamePublisher::new(node)
        .resolve(name)
        .with_context(|| format!("Failed to resolve name {}", name))?;

    let data = ResolveOutput {
        success: true,
        result_code: 0,
        name: name.to_string(),
        url: settings.ipfs_url(cid.as_str()),
        cid: cid.to_string(),
    };

    output.write(&data, || format!("{} -> {}\nURL: {}\n", data.name, data.cid, data.url))?;

    Ok(Status::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edufs_core::MemoryNode;
    use std::fs;
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings::resolve_with(None, None, None, |_| None).unwrap()
    }

    fn quiet() -> PublishArgs {
        PublishArgs {
            first_entry_root: false,
            respect_ignore: false,
            no_progress: true,
            deadline: None,
        }
    }

    #[test]
    fn test_cli_parses_publish() {
        let cli = Cli::try_parse_from([
            "edufs",
            "--json",
            "publish",
            "--path",
            "site",
            "--ipns-key",
            "website",
            "--first-entry-root",
            "--node",
            "/ip4/127.0.0.1/tcp/5001",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.node.as_deref(), Some("/ip4/127.0.0.1/tcp/5001"));
        match cli.command {
            Commands::Publish {
                path,
                ipns_key,
                options,
            } => {
                assert_eq!(path, PathBuf::from("site"));
                assert_eq!(ipns_key.as_deref(), Some("website"));
                assert!(options.first_entry_root);
                assert!(!options.respect_ignore);
            }
            _ => panic!("expected publish"),
        }
    }

    #[test]
    fn test_cli_requires_path() {
        assert!(Cli::try_parse_from(["edufs", "add"]).is_err());
    }

    #[test]
    fn test_publish_complete_and_partial() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"hello").unwrap();
        fs::write(temp_dir.path().join("b.txt"), b"world").unwrap();
        let output = OutputWriter::new(true);

        let node = MemoryNode::new();
        let status = cmd_publish(&node, &settings(), &output, temp_dir.path(), None, &quiet())
            .unwrap();
        assert_eq!(status, Status::Success);

        let failing = MemoryNode::new();
        failing.fail_add("b.txt");
        let status = cmd_publish(
            &failing,
            &settings(),
            &output,
            temp_dir.path(),
            Some("website"),
            &quiet(),
        )
        .unwrap();
        assert_eq!(status, Status::Partial);
        assert_eq!(status.code(), 2);
    }

    #[test]
    fn test_publish_with_every_pin_failing_is_partial() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"hello").unwrap();
        fs::write(temp_dir.path().join("b.txt"), b"world").unwrap();
        let output = OutputWriter::new(true);

        let node = MemoryNode::new();
        node.fail_pin(&MemoryNode::cid_for(b"hello"));
        node.fail_pin(&MemoryNode::cid_for(b"world"));

        let status = cmd_publish(&node, &settings(), &output, temp_dir.path(), None, &quiet())
            .unwrap();
        assert_eq!(status, Status::Partial);
        assert_eq!(status.code(), 2);
    }

    #[test]
    fn test_publish_past_deadline_reports_cancellation() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"hello").unwrap();
        let output = OutputWriter::new(true);
        let node = MemoryNode::new();
        let options = PublishArgs {
            deadline: Some(0),
            ..quiet()
        };

        let status =
            cmd_publish(&node, &settings(), &output, temp_dir.path(), None, &options).unwrap();
        assert_eq!(status, Status::Error);
        assert!(node.uploads().is_empty());
    }

    #[test]
    fn test_cli_parses_deadline() {
        let cli = Cli::try_parse_from(["edufs", "add", "--path", "site", "--deadline", "30"])
            .unwrap();
        match cli.command {
            Commands::Add { options, .. } => assert_eq!(options.deadline, Some(30)),
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_publish_missing_path_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let output = OutputWriter::new(true);
        let node = MemoryNode::new();

        let err = cmd_publish(
            &node,
            &settings(),
            &output,
            &temp_dir.path().join("missing"),
            None,
            &quiet(),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to publish"));
    }
}

use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use bytes::Bytes;
use colored::Colorize;
use ferry_server::{AppState, FerryConfig, FerryServer, MetadataBackend, StorageBackend};
use ferry_types::{DedupRecord, SessionStatus, UploadOutcome};
use ferry_upload::{PartSubmission, UploadCoordinator};

use crate::cli::*;
use crate::logging::init_logging;

pub async fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args, cli.verbose).await,
        Command::Upload(args) => cmd_upload(args, cli.verbose, &cli.format).await,
        Command::Lookup(args) => cmd_lookup(args, cli.verbose, &cli.format).await,
        Command::Config(args) => cmd_config(args),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<FerryConfig> {
    match path {
        Some(path) => Ok(FerryConfig::load(path)?),
        None => Ok(FerryConfig::default()),
    }
}

/// Config for commands that work directly on a local data directory.
fn local_config(root: &std::path::Path) -> FerryConfig {
    let mut config = FerryConfig::default();
    config.storage.backend = StorageBackend::Filesystem;
    config.storage.root = root.join("objects");
    config.metadata.backend = MetadataBackend::File;
    config.metadata.path = root.join("metadata.json");
    config
}

async fn local_coordinator(root: &std::path::Path) -> Result<Arc<UploadCoordinator>> {
    let state = AppState::from_config(&local_config(root))
        .await
        .with_context(|| format!("opening data directory {}", root.display()))?;
    Ok(state.coordinator)
}

async fn cmd_serve(args: ServeArgs, verbose: bool) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind}"))?;
    }
    init_logging(&config.log, verbose);
    tracing::info!("ferry v{}", env!("CARGO_PKG_VERSION"));

    let server = FerryServer::from_config(config).await?;
    server.serve().await?;
    Ok(())
}

/// Number of parts `total_size` bytes split into. An empty file is one
/// empty part.
fn part_count(total_size: u64, part_size: u64) -> u64 {
    total_size.div_ceil(part_size).max(1)
}

async fn cmd_upload(args: UploadArgs, verbose: bool, format: &OutputFormat) -> Result<()> {
    init_logging(&FerryConfig::default().log, verbose);
    ensure!(args.part_size > 0, "part size must be positive");

    let data = Bytes::from(
        tokio::fs::read(&args.file)
            .await
            .with_context(|| format!("reading {}", args.file.display()))?,
    );
    let name = match args.name {
        Some(name) => name,
        None => args
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .context("cannot derive an object name from the file path, pass --name")?,
    };
    let identifier = blake3::hash(&data).to_hex().to_string();
    let total_size = data.len() as u64;
    let total_parts = u32::try_from(part_count(total_size, args.part_size))
        .context("too many parts, increase --part-size")?;

    let coordinator = local_coordinator(&args.root).await?;
    let store = coordinator.store();
    if !store.container_exists(&args.bucket).await? {
        if !args.create_bucket {
            bail!("bucket {} does not exist (pass --create-bucket)", args.bucket);
        }
        store.create_container(&args.bucket).await?;
    }

    let mut last: Option<SessionStatus> = None;
    for index in 1..=total_parts {
        let start = u64::from(index - 1) * args.part_size;
        let end = (start + args.part_size).min(total_size);
        let part = data.slice(start as usize..end as usize);

        let status = coordinator
            .submit_part(
                PartSubmission::new(part)
                    .identifier(identifier.as_str())
                    .part_size(args.part_size)
                    .part(index, total_parts)
                    .total_size(total_size)
                    .target(args.bucket.as_str(), name.as_str()),
            )
            .await?;
        if matches!(format, OutputFormat::Text) && !status.complete {
            println!(
                "  part {}/{} {} ({} bytes stored)",
                index,
                total_parts,
                "ok".green(),
                status.progress.uploaded_bytes
            );
        }
        let done = status.complete;
        last = Some(status);
        if done {
            break;
        }
    }

    let status = last.context("no parts were submitted")?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => print_status(&status, &identifier),
    }
    Ok(())
}

fn print_status(status: &SessionStatus, identifier: &str) {
    let location = status
        .location
        .as_ref()
        .map(|l| l.to_string())
        .unwrap_or_else(|| "-".into());
    match status.outcome {
        UploadOutcome::Deduplicated => println!(
            "{} Already stored at {} (no data sent)",
            "✓".green().bold(),
            location.bold()
        ),
        UploadOutcome::Assembled => println!(
            "{} Uploaded {} in {} part(s)",
            "✓".green().bold(),
            location.bold(),
            status.progress.total_parts
        ),
        UploadOutcome::InProgress | UploadOutcome::Merging => println!(
            "{} Upload incomplete: {}/{} parts",
            "!".yellow().bold(),
            status.progress.uploaded_parts,
            status.progress.total_parts
        ),
    }
    println!("  Identifier: {}", identifier.cyan());
}

async fn cmd_lookup(args: LookupArgs, verbose: bool, format: &OutputFormat) -> Result<()> {
    init_logging(&FerryConfig::default().log, verbose);
    let coordinator = local_coordinator(&args.root).await?;

    let record = match (&args.identifier, &args.bucket, &args.name) {
        (Some(id), _, _) => coordinator.dedup_by_identifier(id).await?,
        (None, Some(bucket), Some(name)) => coordinator.dedup_by_location(bucket, name).await?,
        _ => bail!("pass an identifier or --bucket with --name"),
    };

    match (record, format) {
        (Some(record), OutputFormat::Json) => println!("{}", serde_json::to_string_pretty(&record)?),
        (Some(record), OutputFormat::Text) => print_record(&record),
        (None, OutputFormat::Json) => println!("null"),
        (None, OutputFormat::Text) => println!("{}", "No matching upload.".dimmed()),
    }
    Ok(())
}

fn print_record(record: &DedupRecord) {
    println!("{} {}", "✓".green().bold(), record.location.to_string().bold());
    println!("  Identifier: {}", record.identifier.as_str().cyan());
    println!("  Size: {} bytes", record.size);
    println!("  Stored: {}", record.created_at.to_rfc3339());
}

fn cmd_config(args: ConfigArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_counts() {
        assert_eq!(part_count(0, 4), 1);
        assert_eq!(part_count(4, 4), 1);
        assert_eq!(part_count(5, 4), 2);
        assert_eq!(part_count(12, 4), 3);
    }

    #[test]
    fn local_config_points_into_root() {
        let config = local_config(std::path::Path::new("/tmp/ferry"));
        assert_eq!(config.storage.root, std::path::PathBuf::from("/tmp/ferry/objects"));
        assert_eq!(config.metadata.path, std::path::PathBuf::from("/tmp/ferry/metadata.json"));
    }

    #[tokio::test]
    async fn upload_then_dedup_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("song.ogg");
        std::fs::write(&file, b"0123456789abcdefghij").unwrap();
        let root = dir.path().join("data");

        let args = |name: &str| UploadArgs {
            file: file.clone(),
            bucket: "music".into(),
            name: Some(name.into()),
            part_size: 6,
            create_bucket: true,
            root: root.clone(),
        };
        cmd_upload(args("song.ogg"), false, &OutputFormat::Json).await.unwrap();

        let coordinator = local_coordinator(&root).await.unwrap();
        let data = coordinator.store().get("music", "song.ogg").await.unwrap();
        assert_eq!(&data[..], b"0123456789abcdefghij");

        let id = blake3::hash(b"0123456789abcdefghij").to_hex().to_string();
        let record = coordinator.dedup_by_identifier(&id).await.unwrap().unwrap();
        assert_eq!(record.size, 20);
        drop(coordinator);

        // Same bytes under another name resolve to the first location.
        cmd_upload(args("copy.ogg"), false, &OutputFormat::Json).await.unwrap();
        let coordinator = local_coordinator(&root).await.unwrap();
        assert!(coordinator.store().stat("music", "copy.ogg").await.unwrap().is_none());
    }
}

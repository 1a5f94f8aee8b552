//! m3umount - Mount an m3u playlist as a FUSE filesystem.
//!
//! Usage: m3umount --m3u <playlist> --mountpoint <dir> [--strip-prefix <prefix>]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use m3ufs_core::{M3uConfig, Operations};
use m3ufs_fuse::{M3uFS, MountConfig};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "m3umount")]
#[command(about = "Mount an m3u playlist as a FUSE filesystem")]
#[command(version)]
struct Cli {
    /// Playlist file to expose
    #[arg(long, value_name = "PATH")]
    m3u: PathBuf,

    /// Mountpoint for the filesystem
    #[arg(long, value_name = "PATH")]
    mountpoint: PathBuf,

    /// Leading path removed from every playlist entry (implies --emulated-m3u)
    #[arg(long, value_name = "PREFIX")]
    strip_prefix: Option<String>,

    /// Show the playlist, rewritten relative to the mount, at the root
    #[arg(long)]
    emulated_m3u: bool,

    /// Allow other users to access the mount
    #[arg(long)]
    allow_other: bool,

    /// Seconds the kernel may cache attributes
    #[arg(long, value_name = "SECS", default_value_t = 1)]
    attr_ttl: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    if !cli.m3u.is_file() {
        anyhow::bail!("Playlist does not exist: {}", cli.m3u.display());
    }
    if !cli.mountpoint.is_dir() {
        anyhow::bail!("Mountpoint does not exist: {}", cli.mountpoint.display());
    }

    let config = M3uConfig::new(&cli.m3u, cli.strip_prefix.clone(), cli.emulated_m3u)
        .context("Invalid playlist configuration")?;

    info!(
        m3u = %cli.m3u.display(),
        mountpoint = %cli.mountpoint.display(),
        strip_prefix = config.strip_prefix(),
        emulated = config.emulate_manifest(),
        "Mounting playlist"
    );

    let ops = Operations::new(config).context("Failed to load playlist")?;
    let mount = MountConfig::default()
        .attr_ttl(Duration::from_secs(cli.attr_ttl))
        .allow_other(cli.allow_other)
        .fs_name(format!("m3ufs:{}", ops.config().mount_name()));
    let options = mount.mount_options();
    let fs = M3uFS::new(ops, mount);

    let (tx, rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;

    info!("Mounting filesystem (press Ctrl+C to unmount)");

    let session = fuser::spawn_mount2(fs, &cli.mountpoint, &options).map_err(|e| {
        error!(error = %e, "Mount failed");
        anyhow::anyhow!("Failed to mount filesystem: {e}")
    })?;

    info!("Filesystem mounted at {}", cli.mountpoint.display());

    match rx.recv() {
        Ok(()) => info!("Received interrupt signal, unmounting..."),
        Err(_) => warn!("Signal channel closed unexpectedly"),
    }

    drop(session);
    info!("Filesystem unmounted");
    Ok(())
}

//! ptwalk: translate one process virtual address in a memory image.
//!
//! Prints a single record on stdout; logs go to stderr.

use anyhow::Context;
use clap::Parser;
use ptwalk::config::{Args, ImageConfig};
use ptwalk::memory::image::MemoryImage;
use ptwalk::request::{self, TranslationRequest};
use ptwalk::walk::TranslationWalker;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs to stderr so stdout carries only the record
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ImageConfig::load(&args.config)?;

    let image_path = config.image_path(args.image.as_deref())?;
    let image = MemoryImage::open(&image_path)
        .with_context(|| format!("Failed to open memory image {}", image_path.display()))?;
    let resolver = config.build_resolver(image.physical_layer())?;
    let walker = TranslationWalker::for_mode(config.paging);

    let request = TranslationRequest::new(args.pid, args.addr);
    let record = request::run(&request, resolver.as_ref(), &walker)
        .inspect_err(|e| tracing::error!("Rejected request: {}", e))?;

    println!("{}", record.render(args.format)?);
    Ok(())
}

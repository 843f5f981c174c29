use std::io::Write;

use clap::Parser;
use oci_artifact::{remote, Artifact, EventHandler, Reference};

/// List the artifacts that refer to an image.
#[derive(Parser, Debug)]
struct Args {
    /// Show a line for each referrer, instead of the response from the
    /// registry.
    #[arg(short, long)]
    summary: bool,

    /// Image reference.
    image: String,
}

struct Logger;

impl EventHandler for Logger {
    fn registry_request(&self, url: &str) {
        eprintln!("GET {url}");
    }

    fn registry_auth(&self, url: &str) {
        eprintln!("AUTH {url}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let reference = Reference::try_from(args.image.as_str())?;

    let subject = match &reference.digest {
        Some(digest) => digest.clone(),
        None => remote::fetch(&reference, Logger)?.digest()?,
    };

    let referrers = remote::referrers(&reference, &subject, Logger)?;

    if !args.summary {
        std::io::stdout().lock().write_all(&referrers.raw)?;
        return Ok(());
    }

    for descriptor in &referrers.index.manifests {
        let artifact_type = descriptor
            .artifact_type
            .as_ref()
            .map(|t| t.as_str())
            .unwrap_or("-");

        println!("{}\t{}\t{}", descriptor.digest, descriptor.size, artifact_type);
    }

    Ok(())
}

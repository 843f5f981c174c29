use std::{io::Write, path::PathBuf};

use clap::Parser;
use oci_artifact::{mutate, remote, Artifact, EventHandler, MediaType, Reference};

/// Build an artifact to attach a file to a remote image, and print its
/// manifest.
#[derive(Parser, Debug)]
struct Args {
    /// Type of the new artifact.
    #[arg(short, long, default_value = "application/vnd.oci.image.config.v1+json")]
    artifact_type: String,

    /// Media type of the attached file.
    #[arg(short, long, default_value = "application/vnd.oci.image.layer.v1.tar")]
    media_type: String,

    /// Image reference.
    image: String,

    /// File to attach.
    file: PathBuf,
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

    let subject = remote::fetch(&Reference::try_from(args.image.as_str())?, Logger)?;

    let artifact = mutate::attach(
        &subject,
        std::fs::read(&args.file)?,
        MediaType::new(args.artifact_type),
        MediaType::new(args.media_type),
    )?;

    eprintln!("subject:  {}", subject.digest()?);
    eprintln!("artifact: {}", artifact.digest()?);

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&artifact.raw_manifest()?)?;
    writeln!(stdout)?;

    Ok(())
}

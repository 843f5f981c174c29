use std::{io, sync::Arc};

use oci_artifact::{
    artifact, blob::read_compressed, Addendum, Artifact, Blob, ConfigFile, Digest, Error,
    MediaType, MemoryArtifact, Mutate, StreamBlob,
};

mod common;

use common::blobs::{tar_entries, TestBlob};

fn base_artifact() -> Arc<MemoryArtifact> {
    let layers = vec![
        TestBlob::archive(MediaType::OCI_LAYER_GZIP)
            .regular("etc/hostname", "base")
            .build()
            .to_blob(),
        TestBlob::new(MediaType::OCI_LAYER, b"plain".to_vec()).to_blob(),
    ];

    let config = ConfigFile {
        architecture: Some("amd64".into()),
        os: Some("linux".into()),
        ..Default::default()
    };

    Arc::new(MemoryArtifact::from_parts(MediaType::OCI_CONFIG, &config, layers).unwrap())
}

fn addendum(data: &[u8]) -> Addendum {
    Addendum::new(TestBlob::new(MediaType::OCI_LAYER, data.to_vec()).to_blob())
}

#[test]
fn same_inputs_same_manifest() {
    let build = || {
        Mutate::new(base_artifact())
            .append(addendum(b"a").annotation("k", "v"))
            .append(addendum(b"b"))
            .build()
    };

    let (first, second) = (build(), build());

    assert_eq!(first.raw_manifest().unwrap(), second.raw_manifest().unwrap());
    assert_eq!(first.digest().unwrap(), second.digest().unwrap());
}

#[test]
fn order_of_appended_blobs() {
    let ab = Mutate::new(base_artifact())
        .append(addendum(b"a"))
        .append(addendum(b"b"))
        .build();

    let ba = Mutate::new(base_artifact())
        .append(addendum(b"b"))
        .append(addendum(b"a"))
        .build();

    assert_ne!(ab.digest().unwrap(), ba.digest().unwrap());

    let digests: Vec<_> = ab
        .manifest()
        .unwrap()
        .layers
        .into_iter()
        .map(|l| l.digest)
        .skip(2)
        .collect();

    assert_eq!(digests, [Digest::compute(b"a"), Digest::compute(b"b")]);
}

#[test]
fn no_changes_keep_base_bytes() {
    // Non-canonical JSON, to verify that the manifest is not serialized
    // again.
    let raw = format!(
        "{{\n  \"schemaVersion\": 2,\n  \"mediaType\": \"{}\",\n  \"config\": {{ \"mediaType\": \"{}\", \"digest\": \"{}\", \"size\": 2 }},\n  \"layers\": []\n}}\n",
        MediaType::OCI_MANIFEST,
        MediaType::OCI_CONFIG,
        Digest::compute(b"{}"),
    );

    let base = Arc::new(MemoryArtifact::new(raw.clone(), &b"{}"[..], vec![]).unwrap());
    let artifact = Mutate::new(base.clone()).build();

    assert_eq!(&*artifact.raw_manifest().unwrap(), raw.as_bytes());
    assert_eq!(artifact.digest().unwrap(), base.digest().unwrap());
    assert_eq!(artifact.size().unwrap(), raw.len() as i64);
}

#[test]
fn keep_base_descriptor_fields() {
    let foreign = Digest::compute(b"foreign");
    let raw = format!(
        r#"{{"schemaVersion":2,"mediaType":"{}","config":{{"mediaType":"{}","digest":"{}","size":2}},"layers":[{{"mediaType":"{}","digest":"{foreign}","size":7,"urls":["https://example.com/foreign"]}}],"x-vendor":true}}"#,
        MediaType::OCI_MANIFEST,
        MediaType::OCI_CONFIG,
        Digest::compute(b"{}"),
        MediaType::OCI_LAYER,
    );

    let base = Arc::new(MemoryArtifact::new(raw, &b"{}"[..], vec![]).unwrap());
    let artifact = Mutate::new(base.clone()).append(addendum(b"x")).build();

    let manifest = artifact.manifest().unwrap();
    assert_eq!(manifest.layers[0], base.manifest().unwrap().layers[0]);
    assert_eq!(manifest.extra.get("x-vendor"), Some(&serde_json::Value::Bool(true)));

    let raw = String::from_utf8(artifact.raw_manifest().unwrap().to_vec()).unwrap();
    assert!(raw.contains(r#""size":7,"urls":["https://example.com/foreign"]}"#));
    assert!(raw.ends_with(r#""x-vendor":true}"#));
}

#[test]
fn find_every_referenced_blob() {
    let artifact = Mutate::new(base_artifact())
        .append(addendum(b"first"))
        .append(addendum(b"second"))
        .build();

    let manifest = artifact.manifest().unwrap();
    assert_eq!(manifest.layers.len(), 4);

    for layer in &manifest.layers {
        let blob = artifact.blob_by_digest(&layer.digest).unwrap();
        assert_eq!(blob.digest().unwrap(), layer.digest);
        assert_eq!(blob.size().unwrap(), layer.size);
    }

    let config = manifest.config.unwrap();
    let blob = artifact.blob_by_digest(&config.digest).unwrap();
    assert_eq!(
        Digest::compute(read_compressed(&*blob).unwrap()),
        config.digest
    );

    let missing = Digest::compute(b"missing");
    match artifact.blob_by_digest(&missing) {
        Err(Error::NotFound(d)) => assert_eq!(d, missing),
        Err(e) => panic!("Unexpected error: {e}"),
        Ok(_) => panic!("Blob should not be found"),
    }
}

#[test]
fn manifest_copies_are_independent() {
    let artifact = Mutate::new(base_artifact())
        .append(addendum(b"extra"))
        .build();

    let digest = artifact.digest().unwrap();

    let mut manifest = artifact.manifest().unwrap();
    manifest.layers.clear();
    manifest.annotations.insert("changed".into(), "yes".into());

    let mut config = artifact.config_file().unwrap();
    config.os = Some("plan9".into());

    assert_eq!(artifact.manifest().unwrap().layers.len(), 3);
    assert!(artifact.manifest().unwrap().annotations.is_empty());
    assert_eq!(artifact.config_file().unwrap().os.as_deref(), Some("linux"));
    assert_eq!(artifact.digest().unwrap(), digest);
}

#[test]
fn uncompressed_layer_views() {
    let base = base_artifact();
    let blobs = base.blobs().unwrap();

    let entries = tar_entries(blobs[0].uncompressed().unwrap());
    assert_eq!(entries, [("etc/hostname".to_owned(), b"base".to_vec())]);

    #[cfg(feature = "zstd")]
    {
        let layer = TestBlob::archive(MediaType::OCI_LAYER_ZSTD)
            .regular("from.zstd", "01234")
            .build();

        let entries = tar_entries(layer.to_blob().uncompressed().unwrap());
        assert_eq!(entries, [("from.zstd".to_owned(), b"01234".to_vec())]);
    }
}

#[test]
fn compose_with_streamed_layer() {
    let tar = TestBlob::archive(MediaType::OCI_LAYER)
        .regular("data/file.txt", "streamed")
        .build();

    let stream = Arc::new(StreamBlob::new(io::Cursor::new(tar.data.clone())));

    let artifact = Mutate::new(Arc::new(artifact::empty()))
        .append(Addendum::new(stream.clone()))
        .artifact_type(MediaType::new("application/vnd.example.bundle"))
        .build();

    assert!(matches!(artifact.manifest(), Err(Error::NotComputed)));

    // Consume the stream, like an upload would do.
    let compressed = read_compressed(&*stream).unwrap();

    assert_eq!(stream.diff_id().unwrap(), tar.digest);
    assert_eq!(stream.digest().unwrap(), Digest::compute(&compressed));

    let layer = &artifact.manifest().unwrap().layers[0];
    assert_eq!(layer.digest, Digest::compute(&compressed));
    assert_eq!(layer.media_type, MediaType::OCI_LAYER_GZIP);

    // Compressed data can be read with a static blob.
    let copy = TestBlob::new(MediaType::OCI_LAYER_GZIP, compressed).to_blob();
    let entries = tar_entries(copy.uncompressed().unwrap());
    assert_eq!(entries, [("data/file.txt".to_owned(), b"streamed".to_vec())]);
}

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use oci_artifact::{Digest, MediaType};
use tiny_http::{Header, Request, Response, Server};

use super::blobs::TestBlob;

/// Documents served by the test registry, by request path.
pub struct Registry {
    repository: &'static str,
    documents: HashMap<String, (MediaType, Vec<u8>)>,
}

/// Running registry.
pub struct RunningRegistry {
    pub port: u16,
    requests: Arc<AtomicUsize>,
}

impl RunningRegistry {
    pub fn reference(&self, repository: &str, suffix: &str) -> String {
        format!("127.0.0.1:{}/{repository}{suffix}", self.port)
    }

    /// Number of requests received by the registry.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Registry {
    pub fn new(repository: &'static str) -> Registry {
        Registry {
            repository,
            documents: HashMap::new(),
        }
    }

    /// Serve a manifest by its tag and by its digest.
    pub fn manifest(mut self, tag: &str, media_type: MediaType, raw: &[u8]) -> Self {
        let digest = Digest::compute(raw);

        for name in [tag.to_owned(), digest.to_string()] {
            let path = format!("/v2/{}/manifests/{name}", self.repository);
            self.documents.insert(path, (media_type.clone(), raw.to_vec()));
        }

        self
    }

    pub fn blob(mut self, blob: &TestBlob) -> Self {
        let path = format!("/v2/{}/blobs/{}", self.repository, blob.digest);
        self.documents
            .insert(path, (MediaType::new("application/octet-stream"), blob.data.clone()));
        self
    }

    /// Serve the response of the referrers API for `subject`.
    pub fn referrers(mut self, subject: &Digest, raw_index: &[u8]) -> Self {
        let path = format!("/v2/{}/referrers/{subject}", self.repository);
        self.documents
            .insert(path, (MediaType::OCI_INDEX, raw_index.to_vec()));
        self
    }

    /// Start the registry in a random port.
    pub fn start(self) -> RunningRegistry {
        let server = Server::http("127.1:0").expect("start registry server");
        let port = server.server_addr().to_ip().unwrap().port();

        let requests = Arc::new(AtomicUsize::new(0));

        {
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                let timeout = Duration::from_secs(30);
                while let Ok(Some(request)) = server.recv_timeout(timeout) {
                    requests.fetch_add(1, Ordering::SeqCst);
                    self.handle(request);
                }
            });
        }

        RunningRegistry { port, requests }
    }

    fn handle(&self, request: Request) {
        let response = match self.documents.get(request.url()) {
            Some((media_type, body)) if request.method() == &tiny_http::Method::Get => {
                Response::from_data(body.clone()).with_header(
                    Header::from_bytes("Content-Type", media_type.as_str()).unwrap(),
                )
            }

            _ => Response::from_string("Not Found").with_status_code(404),
        };

        request.respond(response).expect("Send response");
    }
}

//! Blocking client for the registry HTTP API.

use std::{
    io::{self, Read},
    net::SocketAddr,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{Digest, EventHandler, MediaType, Reference};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Errors from the registry client.
#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("{0}")]
    Client(#[from] Box<ureq::Error>),

    #[error("No token in the response from the authentication server.")]
    MissingTokens,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected Content-Type: {0:?}")]
    InvalidContentType(String),

    #[error("Failed to read response: {0}")]
    Io(#[from] io::Error),
}

impl From<ureq::Error> for HttpError {
    fn from(value: ureq::Error) -> Self {
        HttpError::Client(Box::new(value))
    }
}

/// Client for a single repository.
///
/// A bearer token is requested the first time the registry responds with
/// `401`, and it is reused by every later request, from any thread.
pub(crate) struct Client {
    base_url: String,
    token: RwLock<Option<String>>,
    event_handler: Arc<dyn EventHandler>,
}

impl Client {
    pub fn new(reference: &Reference, event_handler: Arc<dyn EventHandler>) -> Self {
        let scheme = if is_plain_http(reference.registry) {
            "http"
        } else {
            "https"
        };

        Client {
            base_url: format!(
                "{scheme}://{}/v2/{}",
                reference.registry, reference.repository
            ),
            token: RwLock::new(None),
            event_handler,
        }
    }

    pub fn event_handler(&self) -> &dyn EventHandler {
        &*self.event_handler
    }

    /// Download a document (like a manifest or an index) whose
    /// `Content-Type` must be one of `accept`.
    ///
    /// If `expected` is present, the body must match that digest.
    pub fn get_document(
        &self,
        path: &str,
        accept: &[MediaType],
        expected: Option<&Digest>,
    ) -> Result<(MediaType, Vec<u8>), HttpError> {
        let accept_header = accept
            .iter()
            .map(MediaType::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let response = self.get(path, Some(&accept_header))?;

        let media_type = response
            .content_type()
            .parse::<MediaType>()
            .ok()
            .filter(|mt| accept.contains(mt))
            .ok_or_else(|| HttpError::InvalidContentType(response.content_type().to_owned()))?;

        let mut body = Vec::new();
        match expected {
            Some(digest) => digest
                .wrap_reader(response.into_reader())
                .read_to_end(&mut body)?,
            None => response.into_reader().read_to_end(&mut body)?,
        };

        Ok((media_type, body))
    }

    /// Start the download of a blob. The reader fails at EOF if the data
    /// does not match `digest`.
    pub fn download_blob(&self, digest: &Digest) -> Result<impl Read + Send, HttpError> {
        let response = self.get(&format!("blobs/{digest}"), None)?;
        Ok(digest.wrap_reader(response.into_reader()))
    }

    /// Send a `GET` request for `path`, relative to `/v2/$repository`.
    pub fn get(&self, path: &str, accept: Option<&str>) -> Result<ureq::Response, HttpError> {
        let url = format!("{}/{path}", self.base_url);

        self.event_handler.registry_request(&url);
        tracing::trace!(%url, "registry request");

        let request = || {
            let request = ureq::get(&url).set("User-Agent", USER_AGENT);
            match accept {
                Some(accept) => request.set("Accept", accept),
                None => request,
            }
        };

        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(token) = token {
            return Ok(request().set("Authorization", &token).call()?);
        }

        match request().call() {
            Err(ureq::Error::Status(401, response)) => {
                let token = self.authenticate(response)?;
                Ok(request().set("Authorization", &token).call()?)
            }

            result => Ok(result?),
        }
    }

    /// Get a token from the server in the `WWW-Authenticate` header of
    /// `unauthorized`, and return the value for the `Authorization` header.
    fn authenticate(&self, unauthorized: ureq::Response) -> Result<String, HttpError> {
        let mut token = self.token.write().unwrap_or_else(PoisonError::into_inner);

        // Another thread got the token while this one was waiting for
        // the lock.
        if let Some(token) = &*token {
            return Ok(token.clone());
        }

        let Some(challenge) = unauthorized
            .header("www-authenticate")
            .and_then(Challenge::parse)
        else {
            return Err(ureq::Error::Status(401, unauthorized).into());
        };

        let request = challenge.token_request();
        self.event_handler.registry_auth(request.url());
        tracing::debug!(url = request.url(), "requesting registry token");

        #[derive(serde::Deserialize)]
        struct TokenResponse {
            token: Option<String>,
            access_token: Option<String>,
        }

        let response: TokenResponse = serde_json::from_reader(request.call()?.into_reader())?;
        let value = response
            .token
            .or(response.access_token)
            .ok_or(HttpError::MissingTokens)?;

        let value = format!("Bearer {value}");
        *token = Some(value.clone());
        Ok(value)
    }
}

/// Registries on a loopback address, or on port 80, are accessed with
/// plain HTTP.
fn is_plain_http(registry: &str) -> bool {
    if registry.ends_with(":80") || registry == "localhost" || registry.starts_with("localhost:")
    {
        return true;
    }

    registry
        .parse::<SocketAddr>()
        .is_ok_and(|address| address.ip().is_loopback())
}

/// Parameters of a `WWW-Authenticate: Bearer ...` header.
///
/// See <https://distribution.github.io/distribution/spec/auth/token/>.
#[derive(Debug, PartialEq)]
struct Challenge<'a> {
    realm: &'a str,
    params: Vec<(&'a str, &'a str)>,
}

impl<'a> Challenge<'a> {
    /// Parse a list of `key="value"` pairs after `Bearer`. Return `None`
    /// if the header is malformed, or if it has no `realm`.
    fn parse(header: &'a str) -> Option<Self> {
        let mut rest = header.strip_prefix("Bearer ")?.trim_ascii_start();
        let mut realm = None;
        let mut params = Vec::new();

        while !rest.is_empty() {
            let (key, value) = rest.split_once('=')?;
            let (value, tail) = value.strip_prefix('"')?.split_once('"')?;

            match key.trim_ascii() {
                "realm" => realm = Some(value),
                key => params.push((key, value)),
            }

            rest = match tail.trim_ascii_start() {
                "" => "",
                tail => tail.strip_prefix(',')?.trim_ascii_start(),
            };
        }

        Some(Challenge {
            realm: realm?,
            params,
        })
    }

    fn token_request(&self) -> ureq::Request {
        self.params
            .iter()
            .fold(ureq::get(self.realm), |request, (k, v)| request.query(k, v))
    }
}

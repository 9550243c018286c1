use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No method")]
    NoMethod,
    #[error("Invalid method: {0}")]
    InvalidMethod(String),
    #[error("Unknown configuration {0}")]
    UnknownConfig(u64),
    #[error("Configuration {0} is already enabled")]
    AlreadyEnabled(u64),
    #[error("Auto configuration requires a script or a script url")]
    MissingScript,
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

/// Malformed rule or URI. Batch parsers drop the offending entry and keep going,
/// except for `UnknownProtocol`, which fails the whole batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Path not allowed in {0}")]
    Path(String),
    #[error("Credentials not allowed in exclusion {0}")]
    Credentials(String),
    #[error("Port not allowed in exclusion {0}")]
    PortInExclusion(String),
    #[error("Invalid port in {0}")]
    InvalidPort(String),
    #[error("Unterminated IPv6 literal in {0}")]
    Ipv6Literal(String),
    #[error("Empty host in {0}")]
    EmptyHost(String),
    #[error("Host too long in {0}")]
    HostTooLong(String),
    #[error("Misplaced hyphen in {0}")]
    Hyphen(String),
    #[error("Forbidden character {1:?} in {0}")]
    ForbiddenChar(String, char),
    #[error("Unknown protocol {0}")]
    UnknownProtocol(String),
    #[error("Servers are required for a manual configuration")]
    MissingServers,
    #[error("Invalid domain rule: {0}")]
    Domain(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("No script driver available")]
    NoDriver,
    #[error("Script engine {0} is gone")]
    EngineGone(&'static str),
    #[error("Failed to initialize {0}: {1}")]
    Init(&'static str, String),
    #[error("Unknown sandbox {0}")]
    UnknownSandbox(u64),
    #[error("Compile error: {0}")]
    Compile(String),
    #[error("Missing FindProxyForURL")]
    MissingEntry,
    #[error("Exception: {0}")]
    Exception(String),
    #[error("FindProxyForURL returned {0} instead of a string")]
    NotAString(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Unsupported script url {0}")]
    UnsupportedUrl(String),
    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Status {0} for {1}")]
    Status(u16, String),
}

#[derive(Error, Debug)]
pub enum FileError {
    #[error("{0} io error: {1}")]
    Io(String, std::io::Error),
    #[error("{0} deserialization error: {1}")]
    Serde(String, serde_yaml::Error),
}

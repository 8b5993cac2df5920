use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

pub(crate) const HEALTH_CHECK_PATH: &str = "/health";

fn default_listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4000)
}

fn default_graphql_path() -> String {
    String::from("/")
}

fn default_health_check() -> bool {
    true
}

fn default_introspection() -> bool {
    true
}

/// Configuration options pertaining to the http server component.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Server {
    /// The socket address and port to listen on
    /// Defaults to 127.0.0.1:4000
    pub(crate) listen: SocketAddr,

    /// The HTTP path on which GraphQL requests will be served.
    /// default: "/"
    pub(crate) path: String,

    /// Serve `{"status":"UP"}` on `/health`.
    /// default: true
    pub(crate) health_check: bool,

    /// Answer `__schema` and `__type` queries.
    /// default: true
    pub(crate) introspection: bool,
}

#[buildstructor::buildstructor]
impl Server {
    #[builder(visibility = "pub")]
    fn new(
        listen: Option<SocketAddr>,
        path: Option<String>,
        health_check: Option<bool>,
        introspection: Option<bool>,
    ) -> Self {
        Self {
            listen: listen.unwrap_or_else(default_listen),
            path: path.unwrap_or_else(default_graphql_path),
            health_check: health_check.unwrap_or_else(default_health_check),
            introspection: introspection.unwrap_or_else(default_introspection),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Server {
    pub fn listen(&self) -> SocketAddr {
        self.listen
    }
}

//! Media descriptors
//!
//! A descriptor names one logical stream: `{schema, vhost, app, stream}`.
//! Sessions resolve it from the connect `tcUrl` plus the stream path of the
//! publish/play command, e.g. `rtmp://host:1935/live` + `/` + `cam?token=1`.

use std::fmt;
use std::net::IpAddr;

/// Key used to index sources in the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub schema: String,
    pub vhost: String,
    pub app: String,
    pub stream: String,
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.schema, self.vhost, self.app, self.stream)
    }
}

/// Resolved stream identity plus the raw query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub schema: String,
    pub vhost: String,
    pub app: String,
    pub stream_id: String,
    /// Query string after `?`, without the `?`
    pub params: String,
}

impl MediaDescriptor {
    /// Parse `schema://host[:port]/app/stream[?params]`
    ///
    /// The vhost comes from a `vhost=` query parameter when present,
    /// otherwise from the host. Hosts that are IP literals, `localhost` or
    /// empty map to `default_vhost`.
    pub fn parse(url: &str, default_vhost: &str) -> Self {
        let (schema, rest) = match url.split_once("://") {
            Some((schema, rest)) => (schema, rest),
            None => ("", url),
        };
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        let (app, stream) = path.split_once('/').unwrap_or((path, ""));

        // The stream segment owns the query; one left on the tcUrl is kept after it
        let (host, host_query) = split_query(host);
        let (app, app_query) = split_query(app);
        let (stream, stream_query) = split_query(stream);
        let params = [stream_query, app_query, host_query]
            .into_iter()
            .filter(|q| !q.is_empty())
            .collect::<Vec<_>>()
            .join("&");

        let vhost = query_param(&params, "vhost")
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| host_to_vhost(strip_port(host), default_vhost));

        Self {
            schema: schema.to_string(),
            vhost,
            app: app.to_string(),
            stream_id: stream.trim_end_matches('/').to_string(),
            params,
        }
    }

    pub fn key(&self) -> StreamKey {
        StreamKey {
            schema: self.schema.clone(),
            vhost: self.vhost.clone(),
            app: self.app.clone(),
            stream: self.stream_id.clone(),
        }
    }

    /// Look up one query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        query_param(&self.params, name)
    }
}

impl fmt::Display for MediaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.schema, self.vhost, self.app, self.stream_id
        )
    }
}

fn query_param<'a>(params: &'a str, name: &str) -> Option<&'a str> {
    params
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn split_query(segment: &str) -> (&str, &str) {
    segment.split_once('?').unwrap_or((segment, ""))
}

fn strip_port(host: &str) -> &str {
    if let Some(inner) = host.strip_prefix('[') {
        // [v6]:port
        return inner.split(']').next().unwrap_or(inner);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) && !name.contains(':') => {
            name
        }
        _ => host,
    }
}

fn host_to_vhost(host: &str, default_vhost: &str) -> String {
    if host.is_empty() || host == "localhost" || host.parse::<IpAddr>().is_ok() {
        default_vhost.to_string()
    } else {
        host.to_string()
    }
}

use anyhow::Context;
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::foundation::error::{CanvasError, CanvasResult};
use crate::import::raster::import_raster;
use crate::layer::model::LayerId;
use crate::layer::registry::LayerRegistry;

/// Same-origin proxy rewriting for hosts that refuse cross-origin pixel reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Path of the proxy endpoint; the original URL is passed as the `url` query parameter.
    pub proxy_path: String,
    /// Hosts (and their subdomains) that must be fetched through the proxy.
    pub hosts: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            proxy_path: "/api/proxy-image".to_owned(),
            hosts: vec![
                "oaidalleapiprodscus.blob.core.windows.net".to_owned(),
                "bfl.ai".to_owned(),
                "delivery-eu1.bfl.ai".to_owned(),
                "replicate.delivery".to_owned(),
            ],
        }
    }
}

impl ProxyConfig {
    /// Whether `url` points at a configured host or one of its subdomains.
    pub fn requires_proxy(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|h| {
            let h = h.trim().trim_start_matches('.').to_ascii_lowercase();
            !h.is_empty()
                && (host == h
                    || host
                        .strip_suffix(h.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.')))
        })
    }

    /// URL to actually fetch: the proxy path for proxied hosts, `url` unchanged otherwise.
    pub fn resolve_fetch_url(&self, url: &str) -> String {
        if !self.requires_proxy(url) {
            return url.to_owned();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("url", url)
            .finish();
        format!("{}?{query}", self.proxy_path)
    }
}

/// Source of remote asset bytes.
pub trait AssetFetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

impl<F> AssetFetcher for F
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>>,
{
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        self(url)
    }
}

/// Blocking HTTP fetcher. Relative URLs (such as the proxy path) are resolved against `base`.
#[cfg(feature = "remote-fetch")]
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    base: Option<Url>,
}

#[cfg(feature = "remote-fetch")]
impl HttpFetcher {
    pub fn new(base: Option<&str>) -> anyhow::Result<Self> {
        let base = base
            .map(|b| Url::parse(b).with_context(|| format!("invalid base url `{b}`")))
            .transpose()?;
        Ok(Self {
            client: reqwest::blocking::Client::builder().build()?,
            base,
        })
    }

    fn absolute(&self, url: &str) -> anyhow::Result<Url> {
        match Url::parse(url) {
            Ok(u) => Ok(u),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self
                    .base
                    .as_ref()
                    .with_context(|| format!("relative url `{url}` needs a base url"))?;
                Ok(base.join(url)?)
            }
            Err(e) => Err(e).with_context(|| format!("invalid url `{url}`")),
        }
    }
}

#[cfg(feature = "remote-fetch")]
impl AssetFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let url = self.absolute(url)?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} failed with status {status}");
        }
        Ok(resp.bytes()?.to_vec())
    }
}

/// Payload of a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> CanvasResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| CanvasError::decode("not a data uri"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| CanvasError::decode("data uri has no payload"))?;
    if !meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(CanvasError::decode("only base64 data uris are supported"));
    }
    Base64::decode_vec(payload.trim())
        .map_err(|e| CanvasError::decode(format!("data uri payload: {e}")))
}

/// Bytes behind `url`: decoded inline for `data:` URIs, fetched (through the proxy when
/// required) otherwise.
pub fn load_remote_bytes(
    fetcher: &dyn AssetFetcher,
    proxy: &ProxyConfig,
    url: &str,
) -> CanvasResult<Vec<u8>> {
    if url.starts_with("data:") {
        return decode_data_uri(url);
    }
    let target = proxy.resolve_fetch_url(url);
    if target != url {
        tracing::debug!(%url, %target, "fetching through proxy");
    }
    let bytes = fetcher
        .fetch(&target)
        .with_context(|| format!("fetch {target}"))?;
    Ok(bytes)
}

/// Fetch and decode a remote image into a new layer.
///
/// Errors leave the registry unchanged; callers decide whether to log them or paint a fallback.
#[tracing::instrument(skip(registry, fetcher, proxy))]
pub fn import_remote(
    registry: &mut LayerRegistry,
    fetcher: &dyn AssetFetcher,
    proxy: &ProxyConfig,
    url: &str,
    name: Option<&str>,
) -> CanvasResult<LayerId> {
    let bytes = load_remote_bytes(fetcher, proxy, url)?;
    import_raster(registry, &bytes, name)
}

#[cfg(test)]
#[path = "../../tests/unit/import/remote.rs"]
mod tests;

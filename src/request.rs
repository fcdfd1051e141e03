//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use http::Method;

use crate::context::Context;

/// An incoming HTTP request with its body fully read.
///
/// The request owns its [`Context`], so whatever a middleware stores before
/// calling the next stage is visible to every later stage and to the handler.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) context: Context,
}

impl Request {
    /// Builder for requests that do not come off a socket: tests, replays,
    /// in-process calls.
    ///
    /// ```rust
    /// use tradegate::Request;
    /// use http::Method;
    ///
    /// let req = Request::builder()
    ///     .method(Method::GET)
    ///     .uri("/api/v1/ping?verbose=1")
    ///     .header("authorization", "Bearer valid-token")
    ///     .build();
    /// assert_eq!(req.path(), "/api/v1/ping");
    /// assert_eq!(req.query(), Some("verbose=1"));
    /// ```
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Assembles a request from hyper's head and an already collected body.
    pub(crate) fn from_parts(
        parts: http::request::Parts,
        body: Vec<u8>,
        remote_addr: SocketAddr,
    ) -> Self {
        let headers = parts.headers.iter()
            .map(|(k, v)| (k.as_str().to_owned(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        Request {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers,
            body,
            params: HashMap::new(),
            remote_addr: Some(remote_addr),
            context: Context::new(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }
    pub fn context(&self) -> &Context { &self.context }
    pub fn context_mut(&mut self) -> &mut Context { &mut self.context }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Best guess at the originating client address.
    ///
    /// Forwarding headers are only believed when the socket peer is one of
    /// `trusted_proxies`; anyone else could write them. Each proxy appends the
    /// address it saw, so the client is the rightmost `X-Forwarded-For` hop
    /// that is not itself a trusted proxy. `X-Real-IP` is the fallback, then
    /// the peer address.
    pub fn client_ip(&self, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
        let peer = self.remote_addr.map(|addr| addr.ip())?;
        if !trusted_proxies.contains(&peer) {
            return Some(peer);
        }
        Some(self.forwarded_client(trusted_proxies).unwrap_or(peer))
    }

    fn forwarded_client(&self, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
        let hops: Vec<&str> = self.headers.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("x-forwarded-for"))
            .flat_map(|(_, v)| v.split(','))
            .collect();
        for hop in hops.into_iter().rev() {
            match hop.trim().parse::<IpAddr>() {
                Ok(ip) if trusted_proxies.contains(&ip) => continue,
                Ok(ip) => return Some(ip),
                // Nothing left of an unparseable hop can be attributed.
                Err(_) => break,
            }
        }
        self.header("x-real-ip")
            .and_then(|v| v.trim().parse().ok())
            .filter(|ip| !trusted_proxies.contains(ip))
    }

    /// Resolves once the request's cancellation token fires.
    ///
    /// ```rust,no_run
    /// # use tradegate::{Request, Response};
    /// # use http::StatusCode;
    /// async fn report(req: Request) -> Response {
    ///     tokio::select! {
    ///         () = req.cancelled() => Response::status(StatusCode::REQUEST_TIMEOUT),
    ///         body = build_report() => Response::json(body),
    ///     }
    /// }
    /// # async fn build_report() -> Vec<u8> { vec![] }
    /// ```
    pub async fn cancelled(&self) {
        self.context.cancellation().cancelled().await
    }
}

/// Fluent builder for [`Request`]. Defaults to `GET /`.
#[derive(Default)]
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    remote_addr: Option<SocketAddr>,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Path with an optional `?query` suffix.
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.to_owned();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn build(self) -> Request {
        let (path, query) = match self.uri.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (self.uri, None),
        };
        let path = if path.is_empty() { "/".to_owned() } else { path };
        Request {
            method: self.method,
            path,
            query,
            headers: self.headers,
            body: self.body,
            params: HashMap::new(),
            remote_addr: self.remote_addr,
            context: Context::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "10.0.0.1:5555".parse().unwrap()
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::builder().header("X-Request-ID", "abc").build();
        assert_eq!(req.header("x-request-id"), Some("abc"));
        assert_eq!(req.header("x-missing"), None);
    }

    fn proxy() -> IpAddr {
        "10.0.0.1".parse().unwrap()
    }

    #[test]
    fn forwarding_headers_from_untrusted_peer_are_ignored() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .header("x-real-ip", "203.0.113.8")
            .remote_addr("198.51.100.3:4000".parse().unwrap())
            .build();
        assert_eq!(req.client_ip(&[proxy()]), Some("198.51.100.3".parse().unwrap()));
        assert_eq!(req.client_ip(&[]), Some("198.51.100.3".parse().unwrap()));
    }

    #[test]
    fn trusted_peer_yields_rightmost_untrusted_hop() {
        let edge: IpAddr = "10.0.0.2".parse().unwrap();
        let req = Request::builder()
            .header("x-forwarded-for", "6.6.6.6, 203.0.113.7, 10.0.0.2")
            .remote_addr(peer())
            .build();
        assert_eq!(req.client_ip(&[proxy(), edge]), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn hops_span_repeated_headers() {
        let req = Request::builder()
            .header("x-forwarded-for", "6.6.6.6")
            .header("X-Forwarded-For", "203.0.113.7")
            .remote_addr(peer())
            .build();
        assert_eq!(req.client_ip(&[proxy()]), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn trusted_peer_falls_back_to_real_ip_then_itself() {
        let req = Request::builder()
            .header("x-forwarded-for", "garbage")
            .header("x-real-ip", "198.51.100.4")
            .remote_addr(peer())
            .build();
        assert_eq!(req.client_ip(&[proxy()]), Some("198.51.100.4".parse().unwrap()));

        let bare = Request::builder().remote_addr(peer()).build();
        assert_eq!(bare.client_ip(&[proxy()]), Some(proxy()));
        assert_eq!(Request::builder().build().client_ip(&[proxy()]), None);
    }
}

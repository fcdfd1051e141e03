//! gzip response compression.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression as Level;
use http::StatusCode;
use tracing::debug;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Compresses bodies of at least `min_size` bytes for clients that send
/// `Accept-Encoding: gzip`.
///
/// Responses that already declare a `content-encoding`, and `204` / `304`
/// responses, are left alone.
#[derive(Debug, Clone, Copy)]
pub struct Compression {
    min_size: usize,
}

impl Compression {
    pub fn new(min_size: usize) -> Self {
        Self { min_size }
    }
}

impl Default for Compression {
    fn default() -> Self { Self::new(1024) }
}

impl Middleware for Compression {
    fn name(&self) -> &'static str {
        "compression"
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        let accepts_gzip = req.header("accept-encoding").is_some_and(accepts_gzip);
        Box::pin(async move {
            let mut res = next.run(req).await;
            res.append_header("vary", "accept-encoding");
            if accepts_gzip && self.should_compress(&res) {
                match gzip(res.body()) {
                    Ok(compressed) => {
                        res.set_body(compressed);
                        res.set_header("content-encoding", "gzip");
                        res.remove_header("content-length");
                    }
                    Err(e) => debug!("gzip failed, sending identity body: {e}"),
                }
            }
            res
        })
    }
}

impl Compression {
    fn should_compress(&self, res: &Response) -> bool {
        res.body().len() >= self.min_size
            && res.header("content-encoding").is_none()
            && !matches!(res.status_code(), StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED)
    }
}

/// True when the header lists `gzip` without `q=0`.
fn accepts_gzip(header: &str) -> bool {
    header.split(',').any(|item| {
        let mut parts = item.split(';').map(str::trim);
        let coding = parts.next().unwrap_or_default();
        let refused = parts.any(|p| p.replace(' ', "") == "q=0");
        (coding.eq_ignore_ascii_case("gzip") || coding == "*") && !refused
    })
}

fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Level::default());
    encoder.write_all(body)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;
    use crate::middleware::test_support::run_one;

    fn big_body() -> Vec<u8> {
        br#"{"symbol":"EURUSD","bid":1.0841,"ask":1.0843}"#.repeat(64)
    }

    async fn quotes(_req: Request) -> Response {
        Response::json(big_body())
    }

    #[tokio::test]
    async fn compresses_when_accepted() {
        let req = Request::builder().header("Accept-Encoding", "br, gzip;q=0.8").build();
        let res = run_one(Compression::default(), req, quotes).await;

        assert_eq!(res.header("content-encoding"), Some("gzip"));
        let mut plain = Vec::new();
        GzDecoder::new(res.body()).read_to_end(&mut plain).unwrap();
        assert_eq!(plain, big_body());
    }

    #[tokio::test]
    async fn leaves_small_or_unaccepted_bodies_alone() {
        let req = Request::builder().header("accept-encoding", "gzip").build();
        let res = run_one(Compression::default(), req, |_req: Request| async { Response::text("tiny") }).await;
        assert_eq!(res.header("content-encoding"), None);
        assert_eq!(res.body(), b"tiny");

        let res = run_one(Compression::default(), Request::builder().build(), quotes).await;
        assert_eq!(res.header("content-encoding"), None);
        assert_eq!(res.header("vary"), Some("accept-encoding"));
    }

    #[test]
    fn accept_encoding_parsing() {
        assert!(accepts_gzip("gzip"));
        assert!(accepts_gzip("deflate, GZIP"));
        assert!(accepts_gzip("*"));
        assert!(!accepts_gzip("gzip;q=0"));
        assert!(!accepts_gzip("br, deflate"));
    }
}

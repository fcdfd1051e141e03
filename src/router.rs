//! Radix-tree request router with route groups.
//!
//! One tree per HTTP method, O(path-length) lookup. Middleware comes in two
//! scopes:
//!
//! - **global**, registered with [`Router::wrap`], runs around every request,
//!   including `404` / `405` answers and anything a stage answers itself
//!   (CORS preflight);
//! - **group**, registered on a [`Group`], runs only for that group's routes
//!   and is fused with each handler when the group is nested.
//!
//! ```rust
//! use tradegate::middleware::RequestId;
//! use tradegate::{Group, Request, Response, Router};
//!
//! async fn ping(_req: Request) -> Response { Response::text("pong") }
//!
//! let app = Router::new()
//!     .nest("/api/v1", Group::new().wrap(RequestId::new()).get("/ping", ping))
//!     .into_app();
//! # let _ = app;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Chain, Middleware};
use crate::request::Request;
use crate::response::Response;

type Routes = HashMap<Method, MatchitRouter<BoxedHandler>>;

/// The application router.
///
/// Build it once at startup, then freeze it with [`Router::into_app`] or pass
/// it to [`Server::serve`](crate::Server::serve). Every method returns `self`
/// so registrations chain.
pub struct Router {
    routes: Routes,
    middleware: Chain,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), middleware: Chain::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`. Routes are fixed at startup, so this is a
    /// programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        insert(&mut self.routes, method, path, handler.into_boxed_handler());
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Appends a global middleware. Global stages run in registration order,
    /// before routing.
    pub fn wrap(mut self, middleware: impl Middleware) -> Self {
        self.middleware = self.middleware.with(middleware);
        self
    }

    /// Mounts every route of `group` under `prefix`, each wrapped in the
    /// group's middleware.
    pub fn nest(mut self, prefix: &str, group: Group) -> Self {
        let prefix = prefix.trim_end_matches('/');
        for (method, path, handler) in group.routes {
            let full = if path == "/" { prefix.to_owned() } else { format!("{prefix}{path}") };
            let full = if full.is_empty() { "/".to_owned() } else { full };
            insert(&mut self.routes, method, &full, group.middleware.clone().bind(handler));
        }
        self
    }

    /// Freezes the routing table and global middleware into an [`App`].
    pub fn into_app(self) -> App {
        App {
            chain: self.middleware,
            table: Arc::new(RouteTable { routes: self.routes }),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

fn insert(routes: &mut Routes, method: Method, path: &str, handler: BoxedHandler) {
    routes
        .entry(method)
        .or_default()
        .insert(path, handler)
        .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
}

// ── Group ─────────────────────────────────────────────────────────────────────

/// Routes sharing a middleware chain, mounted with [`Router::nest`].
///
/// Paths are relative to the prefix given at mount time.
pub struct Group {
    middleware: Chain,
    routes: Vec<(Method, String, BoxedHandler)>,
}

impl Group {
    pub fn new() -> Self {
        Self { middleware: Chain::new(), routes: Vec::new() }
    }

    pub fn wrap(mut self, middleware: impl Middleware) -> Self {
        self.middleware = self.middleware.with(middleware);
        self
    }

    /// Appends a stage instance that other groups also use, such as one
    /// [`RateLimit`](crate::middleware::RateLimit) whose quota spans several
    /// groups.
    pub fn wrap_shared(mut self, middleware: BoxedMiddleware) -> Self {
        self.middleware = self.middleware.with_shared(middleware);
        self
    }

    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes.push((method, path.to_owned(), handler.into_boxed_handler()));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }
}

impl Default for Group {
    fn default() -> Self { Self::new() }
}

// ── App ───────────────────────────────────────────────────────────────────────

/// A frozen router: global middleware around the route table.
///
/// Cheap to clone; the server hands one clone to every connection.
#[derive(Clone)]
pub struct App {
    chain: Chain,
    table: BoxedHandler,
}

impl App {
    /// Drives one request through global middleware, routing, group
    /// middleware and the handler.
    pub async fn call(&self, req: Request) -> Response {
        self.chain.run_boxed(req, Arc::clone(&self.table)).await
    }
}

/// Terminal stage of the global chain: dispatches to the matched route.
struct RouteTable {
    routes: Routes,
}

impl RouteTable {
    /// Methods with a route matching `path`, sorted for a stable `allow` header.
    fn allowed(&self, path: &str) -> Vec<&str> {
        let mut methods: Vec<&str> = self.routes.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(method, _)| method.as_str())
            .collect();
        methods.sort_unstable();
        methods
    }
}

impl ErasedHandler for RouteTable {
    fn call(&self, mut req: Request) -> BoxFuture<'static> {
        let matched = self.routes.get(req.method())
            .and_then(|tree| tree.at(req.path()).ok())
            .map(|m| {
                let params = m.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect::<HashMap<_, _>>();
                (Arc::clone(m.value), params)
            });

        if let Some((handler, params)) = matched {
            req.params = params;
            return handler.call(req);
        }

        let allowed = self.allowed(req.path());
        let res = if allowed.is_empty() {
            Response::error(StatusCode::NOT_FOUND, "Not Found")
        } else {
            let mut res = Response::error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            res.set_header("allow", allowed.join(", "));
            res
        };
        Box::pin(async move { res })
    }
}

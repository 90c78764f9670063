use super::Route;
use crate::handler::Handler;
use crate::websocket::{WebSocketRoute, WsHandler};

/// A group of routes sharing a path prefix.
///
/// # Example
/// ```ignore
/// let users = Router::new("/users")
///     .get("/", list_users)
///     .get("/{id}", get_user)
///     .route(Route::post("/", create_user).model::<CreateUser>());
///
/// let app = Application::builder().include_router(users, "/api").build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Router {
    prefix: String,
    routes: Vec<Route>,
    websockets: Vec<WebSocketRoute>,
}

impl Router {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            routes: Vec::new(),
            websockets: Vec::new(),
        }
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::get(path, handler))
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::post(path, handler))
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::put(path, handler))
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::patch(path, handler))
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::delete(path, handler))
    }

    pub fn websocket(mut self, path: &str, handler: impl WsHandler) -> Self {
        self.websockets.push(WebSocketRoute::new(path, handler));
        self
    }

    /// Nest another router under this one's prefix.
    pub fn include(mut self, router: Router) -> Self {
        let (routes, websockets) = router.into_routes();
        self.routes.extend(routes);
        self.websockets.extend(websockets);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Every route with this router's prefix applied.
    pub fn into_routes(self) -> (Vec<Route>, Vec<WebSocketRoute>) {
        let prefix = self.prefix;
        let routes = self
            .routes
            .into_iter()
            .map(|r| r.with_prefix(&prefix))
            .collect();
        let websockets = self
            .websockets
            .into_iter()
            .map(|r| r.with_prefix(&prefix))
            .collect();
        (routes, websockets)
    }
}

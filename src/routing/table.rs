use super::pattern::split_path;
use super::{PathPattern, RouteError, Segment};
use axum::http::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// Anything that can be stored in a [`RouteTable`].
pub trait RouteEntry: Send + Sync + 'static {
    fn method(&self) -> &Method;
    fn path(&self) -> &str;
}

/// Result of matching a method and path.
#[derive(Debug)]
pub enum Lookup<R> {
    Found {
        route: Arc<R>,
        params: HashMap<String, String>,
    },
    /// The path exists, but not under the requested method.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

struct Registered<R> {
    pattern: PathPattern,
    route: Arc<R>,
    /// Position in registration order; breaks ties between candidates.
    index: usize,
}

struct Node<R> {
    literals: HashMap<String, Node<R>>,
    param: Option<Box<Node<R>>>,
    /// Routes ending at this node, at most one per method.
    routes: Vec<Arc<Registered<R>>>,
}

impl<R> Default for Node<R> {
    fn default() -> Self {
        Self {
            literals: HashMap::new(),
            param: None,
            routes: Vec::new(),
        }
    }
}

/// Segment trie holding every route of one kind.
pub struct RouteTable<R> {
    root: Node<R>,
    /// Registration order, for introspection.
    order: Vec<Arc<Registered<R>>>,
}

impl<R> Default for RouteTable<R> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            order: Vec::new(),
        }
    }
}

impl<R: RouteEntry> RouteTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. Two routes with the same method and the same
    /// shape (parameter names aside) are ambiguous and rejected.
    pub fn insert(&mut self, route: R) -> Result<(), RouteError> {
        let pattern = PathPattern::parse(route.path())?;

        let mut node = &mut self.root;
        for segment in pattern.segments() {
            node = match segment {
                Segment::Literal(literal) => node.literals.entry(literal.clone()).or_default(),
                Segment::Param(_) => &mut **node.param.get_or_insert_with(Default::default),
            };
        }

        if node.routes.iter().any(|r| r.route.method() == route.method()) {
            return Err(RouteError::DuplicateRoute {
                method: route.method().clone(),
                pattern: pattern.as_str().to_string(),
            });
        }

        let registered = Arc::new(Registered {
            pattern,
            route: Arc::new(route),
            index: self.order.len(),
        });
        node.routes.push(Arc::clone(&registered));
        self.order.push(registered);
        Ok(())
    }

    /// Match a request path.
    ///
    /// Empty segments in the path are ignored the same way they are in
    /// patterns, so `/users//me/` is looked up as `/users/me`. Every route
    /// whose pattern fits the path is a candidate. The one with the most
    /// literal segments wins, and among equals the first registered.
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<R> {
        let segments: Vec<&str> = split_path(path).collect();
        let mut search = Search {
            method,
            captures: Vec::new(),
            candidates: Vec::new(),
            allowed: Vec::new(),
        };
        search.walk(&self.root, &segments);

        let best = search.candidates.into_iter().min_by_key(|(registered, _)| {
            (
                std::cmp::Reverse(registered.pattern.literal_count()),
                registered.index,
            )
        });
        match best {
            Some((registered, captures)) => {
                let params = registered
                    .pattern
                    .param_names()
                    .into_iter()
                    .map(str::to_string)
                    .zip(captures)
                    .collect();
                Lookup::Found {
                    route: Arc::clone(&registered.route),
                    params,
                }
            }
            None if !search.allowed.is_empty() => Lookup::MethodNotAllowed {
                allowed: search.allowed,
            },
            None => Lookup::NotFound,
        }
    }

    /// Routes with their compiled patterns, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathPattern, &Arc<R>)> {
        self.order.iter().map(|r| (&r.pattern, &r.route))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

struct Search<'a, R> {
    method: &'a Method,
    captures: Vec<String>,
    candidates: Vec<(Arc<Registered<R>>, Vec<String>)>,
    allowed: Vec<Method>,
}

impl<R: RouteEntry> Search<'_, R> {
    fn walk(&mut self, node: &Node<R>, segments: &[&str]) {
        let Some((head, rest)) = segments.split_first() else {
            for r in &node.routes {
                if r.route.method() == self.method {
                    self.candidates.push((Arc::clone(r), self.captures.clone()));
                } else if !self.allowed.contains(r.route.method()) {
                    self.allowed.push(r.route.method().clone());
                }
            }
            return;
        };

        if let Some(child) = node.literals.get(*head) {
            self.walk(child, rest);
        }

        if let Some(child) = &node.param {
            self.captures.push((*head).to_string());
            self.walk(child, rest);
            self.captures.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestRoute {
        method: Method,
        path: &'static str,
        id: &'static str,
    }

    impl RouteEntry for TestRoute {
        fn method(&self) -> &Method {
            &self.method
        }

        fn path(&self) -> &str {
            self.path
        }
    }

    fn table(routes: &[(Method, &'static str, &'static str)]) -> RouteTable<TestRoute> {
        let mut table = RouteTable::new();
        for (method, path, id) in routes {
            table
                .insert(TestRoute {
                    method: method.clone(),
                    path: *path,
                    id: *id,
                })
                .unwrap();
        }
        table
    }

    fn found(lookup: Lookup<TestRoute>) -> (&'static str, HashMap<String, String>) {
        match lookup {
            Lookup::Found { route, params } => (route.id, params),
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn test_literal_match_has_no_params() {
        let t = table(&[(Method::GET, "/health", "health")]);
        let (id, params) = found(t.lookup(&Method::GET, "/health"));
        assert_eq!(id, "health");
        assert!(params.is_empty());
    }

    #[test]
    fn test_params_are_extracted() {
        let t = table(&[(Method::GET, "/users/{user_id}/posts/{post_id}", "post")]);
        let (id, params) = found(t.lookup(&Method::GET, "/users/7/posts/abc"));
        assert_eq!(id, "post");
        assert_eq!(params["user_id"], "7");
        assert_eq!(params["post_id"], "abc");
    }

    #[test]
    fn test_literals_are_case_sensitive() {
        let t = table(&[(Method::GET, "/Users", "users")]);
        assert!(matches!(t.lookup(&Method::GET, "/users"), Lookup::NotFound));
    }

    #[test]
    fn test_static_segment_wins_regardless_of_order() {
        let t = table(&[
            (Method::GET, "/users/{id}", "by_id"),
            (Method::GET, "/users/me", "me"),
        ]);
        assert_eq!(found(t.lookup(&Method::GET, "/users/me")).0, "me");
        assert_eq!(found(t.lookup(&Method::GET, "/users/42")).0, "by_id");
    }

    #[test]
    fn test_backtracks_into_param_branch() {
        let t = table(&[
            (Method::GET, "/files/static/index", "index"),
            (Method::GET, "/files/{name}/raw", "raw"),
        ]);
        let (id, params) = found(t.lookup(&Method::GET, "/files/static/raw"));
        assert_eq!(id, "raw");
        assert_eq!(params["name"], "static");
    }

    #[test]
    fn test_equal_literal_count_first_registered_wins() {
        let t = table(&[
            (Method::GET, "/a/{x}/b", "first"),
            (Method::GET, "/a/b/{y}", "second"),
        ]);
        let (id, params) = found(t.lookup(&Method::GET, "/a/b/b"));
        assert_eq!(id, "first");
        assert_eq!(params["x"], "b");

        let t = table(&[
            (Method::GET, "/a/b/{y}", "second"),
            (Method::GET, "/a/{x}/b", "first"),
        ]);
        assert_eq!(found(t.lookup(&Method::GET, "/a/b/b")).0, "second");
    }

    #[test]
    fn test_more_literal_segments_win() {
        let t = table(&[
            (Method::GET, "/a/{x}/{y}", "params"),
            (Method::GET, "/a/{x}/c", "one_literal"),
        ]);
        assert_eq!(found(t.lookup(&Method::GET, "/a/b/c")).0, "one_literal");
        assert_eq!(found(t.lookup(&Method::GET, "/a/b/d")).0, "params");
    }

    #[test]
    fn test_method_not_allowed_vs_not_found() {
        let t = table(&[
            (Method::GET, "/items", "list"),
            (Method::POST, "/items", "create"),
        ]);
        match t.lookup(&Method::DELETE, "/items") {
            Lookup::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("expected 405, got {other:?}"),
        }
        assert!(matches!(t.lookup(&Method::GET, "/nothing"), Lookup::NotFound));
    }

    #[test]
    fn test_method_found_on_other_branch_beats_405() {
        let t = table(&[
            (Method::GET, "/users/me", "me"),
            (Method::DELETE, "/users/{id}", "delete"),
        ]);
        let (id, params) = found(t.lookup(&Method::DELETE, "/users/me"));
        assert_eq!(id, "delete");
        assert_eq!(params["id"], "me");
    }

    #[test]
    fn test_duplicate_routes_are_rejected() {
        let mut t = table(&[(Method::GET, "/users/{id}", "a")]);
        let err = t
            .insert(TestRoute {
                method: Method::GET,
                path: "/users/{name}/",
                id: "b",
            })
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute { .. }));

        t.insert(TestRoute {
            method: Method::PUT,
            path: "/users/{name}",
            id: "c",
        })
        .unwrap();
        let (id, params) = found(t.lookup(&Method::PUT, "/users/x"));
        assert_eq!(id, "c");
        assert_eq!(params["name"], "x");
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let t = table(&[(Method::GET, "/users", "list")]);
        assert_eq!(found(t.lookup(&Method::GET, "/users/")).0, "list");
    }

    #[test]
    fn test_empty_segments_collapse() {
        let t = table(&[
            (Method::GET, "/users/me", "me"),
            (Method::GET, "/users/{id}", "by_id"),
        ]);
        assert_eq!(found(t.lookup(&Method::GET, "/users//me")).0, "me");
        assert_eq!(found(t.lookup(&Method::GET, "//users/me//")).0, "me");

        // A doubled slash never yields an empty parameter.
        assert!(matches!(t.lookup(&Method::GET, "/users//"), Lookup::NotFound));
    }

    #[test]
    fn test_iter_keeps_registration_order() {
        let t = table(&[
            (Method::GET, "/b", "b"),
            (Method::GET, "/a", "a"),
        ]);
        let ids: Vec<_> = t.iter().map(|(_, r)| r.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(t.len(), 2);
    }
}

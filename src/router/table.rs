use std::sync::Arc;

use super::Route;

/// The ordered routes registered for one HTTP method.
///
/// Lookup is a linear scan; the first route that matches wins, so register
/// specific routes before catch-alls.
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route after every route already in the table.
    pub fn push(&mut self, route: Arc<Route>) {
        self.routes.push(route);
    }

    /// Returns the first route matching `path`.
    pub fn lookup(&self, path: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }
}

// Message and query routing tables
//
// Built once per protocol load; never modified per transaction.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::AppError;
use crate::tx::Msg;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResult {
    pub data: Vec<u8>,
    pub log: String,
}

impl HandlerResult {
    pub fn with_log(log: impl Into<String>) -> Self {
        HandlerResult {
            data: Vec::new(),
            log: log.into(),
        }
    }
}

pub type Handler = Arc<dyn Fn(&mut Context<'_>, &Msg) -> Result<HandlerResult, AppError> + Send + Sync>;

pub type Querier = Arc<dyn Fn(&Context<'_>, &[&str], &[u8]) -> Result<Vec<u8>, AppError> + Send + Sync>;

fn check_route_name(route: &str) {
    if route.is_empty() || !route.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        panic!("route expressions can only contain alphanumeric characters: {:?}", route);
    }
}

/// Message routes of one protocol version
pub struct Router {
    version: u64,
    routes: BTreeMap<String, Handler>,
}

impl Router {
    pub fn new(version: u64) -> Self {
        Router {
            version,
            routes: BTreeMap::new(),
        }
    }

    /// Registers `handler` for `route`. Panics on a duplicate or malformed route.
    pub fn add_route(&mut self, route: &str, handler: Handler) -> &mut Self {
        check_route_name(route);
        if self.routes.contains_key(route) {
            panic!("route {} has already been initialized", route);
        }
        self.routes.insert(route.to_string(), handler);
        self
    }

    pub fn route(&self, route: &str) -> Option<&Handler> {
        self.routes.get(route)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn route_names(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("version", &self.version)
            .field("routes", &self.route_names())
            .finish()
    }
}

/// Custom query routes of one protocol version
pub struct QueryRouter {
    version: u64,
    routes: BTreeMap<String, Querier>,
}

impl QueryRouter {
    pub fn new(version: u64) -> Self {
        QueryRouter {
            version,
            routes: BTreeMap::new(),
        }
    }

    pub fn add_route(&mut self, route: &str, querier: Querier) -> &mut Self {
        check_route_name(route);
        if self.routes.contains_key(route) {
            panic!("query route {} has already been initialized", route);
        }
        self.routes.insert(route.to_string(), querier);
        self
    }

    pub fn route(&self, route: &str) -> Option<&Querier> {
        self.routes.get(route)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn route_names(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for QueryRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRouter")
            .field("version", &self.version)
            .field("routes", &self.route_names())
            .finish()
    }
}

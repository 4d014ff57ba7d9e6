//! Endpoints and their method registration tables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::error::{HandlerErrorKind, TrackingError};
use crate::protocol::{HttpRequest, HttpResponse, Method};

use super::traits::{Handler, Service};

/// A handler bound to one HTTP method of an endpoint.
#[derive(Clone)]
pub struct MethodBinding {
    name: String,
    action: Option<String>,
    handler: Arc<dyn Handler>,
}

impl MethodBinding {
    pub fn new(name: impl Into<String>, action: Option<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            action,
            handler,
        }
    }

    /// Qualified name of the component that owns the handler.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Action label, if the binding declares one.
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBinding")
            .field("name", &self.name)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Answers OPTIONS with the endpoint's allowed methods.
struct OptionsHandler {
    name: String,
    allow: Vec<String>,
}

impl Handler for OptionsHandler {
    fn handle(&self, _request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
        Ok(HttpResponse::json(
            200,
            &json!({"name": self.name, "allow": self.allow}),
        )
        .with_header("allow", self.allow.join(", ")))
    }
}

/// An endpoint: a named component with one handler per supported method.
///
/// The registration table is filled at construction time and read-only
/// afterwards. HEAD is served by the GET handler unless bound explicitly,
/// and OPTIONS is always answered.
#[derive(Debug, Clone)]
pub struct Endpoint {
    name: String,
    bindings: HashMap<Method, MethodBinding>,
    options: MethodBinding,
}

impl Endpoint {
    /// Create an endpoint. `name` is the qualified component name, e.g.
    /// `"app.views.Items"`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let bindings = HashMap::new();
        Self {
            options: options_binding(&name, &bindings),
            name,
            bindings,
        }
    }

    /// Bind `handler` to `method`.
    pub fn route<H>(mut self, method: Method, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.bind(method, None, Arc::new(handler));
        self
    }

    /// Bind `handler` to `method` under an action label.
    pub fn action<H>(mut self, method: Method, action: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.bind(method, Some(action.into()), Arc::new(handler));
        self
    }

    fn bind(&mut self, method: Method, action: Option<String>, handler: Arc<dyn Handler>) {
        debug!(endpoint = %self.name, method = %method, "Binding handler");
        let binding = MethodBinding::new(self.name.clone(), action, handler);
        self.bindings.insert(method, binding);
        self.options = options_binding(&self.name, &self.bindings);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The binding serving `method`, if any.
    pub fn binding(&self, method: &Method) -> Option<&MethodBinding> {
        match (self.bindings.get(method), method) {
            (Some(binding), _) => Some(binding),
            (None, Method::Head) => self.bindings.get(&Method::Get),
            (None, Method::Options) => Some(&self.options),
            (None, _) => None,
        }
    }

    /// Methods the endpoint answers, sorted.
    pub fn allowed_methods(&self) -> Vec<&str> {
        allowed_methods(&self.bindings)
    }

    /// Run the handler bound to the request's method.
    pub fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
        let binding = self.binding(&request.method).ok_or_else(|| {
            TrackingError::handler(HandlerErrorKind::MethodNotAllowed {
                method: request.method.to_string(),
            })
        })?;

        binding.handler.handle(request)
    }

    /// Turn a handler failure into a response.
    ///
    /// Client-facing failures become JSON error responses; anything else is
    /// returned as an error for the caller to propagate.
    pub fn handle_exception(&self, err: TrackingError) -> Result<HttpResponse, TrackingError> {
        let response = match &err {
            TrackingError::Handler { kind } => match kind {
                HandlerErrorKind::NotFound { .. } => Some(HttpResponse::error(404, "Not found.")),
                HandlerErrorKind::MethodNotAllowed { method } => Some(
                    HttpResponse::error(405, format!("Method \"{}\" not allowed.", method))
                        .with_header("allow", self.allowed_methods().join(", ")),
                ),
                HandlerErrorKind::BadRequest { message } => {
                    Some(HttpResponse::error(400, message.clone()))
                }
                HandlerErrorKind::NotAuthenticated => Some(HttpResponse::error(
                    401,
                    "Authentication credentials were not provided.",
                )),
                HandlerErrorKind::PermissionDenied => Some(HttpResponse::error(
                    403,
                    "You do not have permission to perform this action.",
                )),
                HandlerErrorKind::Internal { .. } => None,
            },
            _ => None,
        };

        response.ok_or(err)
    }
}

fn allowed_methods(bindings: &HashMap<Method, MethodBinding>) -> Vec<&str> {
    let mut methods: Vec<&str> = bindings.keys().map(|m| m.as_str()).collect();
    if bindings.contains_key(&Method::Get) {
        methods.push("HEAD");
    }
    methods.push("OPTIONS");
    methods.sort_unstable();
    methods.dedup();
    methods
}

fn options_binding(name: &str, bindings: &HashMap<Method, MethodBinding>) -> MethodBinding {
    let handler = OptionsHandler {
        name: name.to_string(),
        allow: allowed_methods(bindings).into_iter().map(String::from).collect(),
    };
    MethodBinding::new(name, None, Arc::new(handler))
}

impl Service for Endpoint {
    fn call(&self, request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
        self.dispatch(request)
            .or_else(|err| self.handle_exception(err))
    }
}

use http::Method;

use super::{Flow, Middleware};
use crate::errors::Error;
use crate::server::{Request, Response};

/// Cross-origin resource sharing stage.
///
/// Answers preflight `OPTIONS` requests itself and decorates matched
/// responses with the allow headers. Requests without an `Origin` header
/// pass through untouched.
pub struct CorsMiddleware {
    /// `None` means any origin.
    origins: Option<Vec<String>>,
    allow_methods: String,
    allow_headers: String,
    allow_credentials: bool,
}

impl CorsMiddleware {
    /// Permissive configuration: any origin, no credentials.
    #[must_use]
    pub fn allow_any() -> Self {
        Self {
            origins: None,
            allow_methods: "GET, POST, PUT, PATCH, DELETE, OPTIONS".to_string(),
            allow_headers: "Content-Type, X-Requested-With".to_string(),
            allow_credentials: false,
        }
    }

    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::default()
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        match &self.origins {
            None => true,
            Some(list) => list.iter().any(|o| o == origin),
        }
    }

    fn apply_headers(&self, origin: &str, res: &mut Response) {
        if self.origins.is_none() && !self.allow_credentials {
            res.set_header("Access-Control-Allow-Origin", "*");
        } else {
            res.set_header("Access-Control-Allow-Origin", origin);
            res.set_header("Vary", "Origin");
        }
        if self.allow_credentials {
            res.set_header("Access-Control-Allow-Credentials", "true");
        }
    }
}

impl Middleware for CorsMiddleware {
    fn call(&self, req: &mut Request, res: &mut Response) -> Flow {
        let Some(origin) = req.get_header("origin").map(str::to_string) else {
            return Flow::Continue;
        };

        if req.method == Method::OPTIONS {
            if !self.origin_allowed(&origin) {
                res.status = 403;
                return Flow::Halt;
            }
            self.apply_headers(&origin, res);
            res.set_header("Access-Control-Allow-Methods", &self.allow_methods);
            res.set_header("Access-Control-Allow-Headers", &self.allow_headers);
            res.status = 204;
            return Flow::Halt;
        }

        if self.origin_allowed(&origin) {
            self.apply_headers(&origin, res);
        }
        Flow::Continue
    }
}

/// Validated builder for [`CorsMiddleware`].
#[derive(Default)]
pub struct CorsBuilder {
    origins: Vec<String>,
    allow_credentials: bool,
    allow_methods: Option<String>,
    allow_headers: Option<String>,
}

impl CorsBuilder {
    #[must_use]
    pub fn origin(mut self, origin: &str) -> Self {
        self.origins.push(origin.to_string());
        self
    }

    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    #[must_use]
    pub fn allow_methods(mut self, methods: &str) -> Self {
        self.allow_methods = Some(methods.to_string());
        self
    }

    #[must_use]
    pub fn allow_headers(mut self, headers: &str) -> Self {
        self.allow_headers = Some(headers.to_string());
        self
    }

    /// Validate and build. Credentials require exact origins: the CORS
    /// specification forbids `*` with `Access-Control-Allow-Credentials`.
    pub fn build(self) -> Result<CorsMiddleware, Error> {
        let wildcard = self.origins.is_empty() || self.origins.iter().any(|o| o == "*");
        if self.allow_credentials && wildcard {
            return Err(Error::config(
                "cors: cannot allow credentials with a wildcard origin",
            ));
        }
        let defaults = CorsMiddleware::allow_any();
        Ok(CorsMiddleware {
            origins: if self.origins.is_empty() {
                None
            } else {
                Some(self.origins)
            },
            allow_methods: self.allow_methods.unwrap_or(defaults.allow_methods),
            allow_headers: self.allow_headers.unwrap_or(defaults.allow_headers),
            allow_credentials: self.allow_credentials,
        })
    }
}

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::HeaderMap;

use super::{AuthError, CapabilitySet, Identity, Principal, TokenError, TokenParser, TokenUse};

pub const SERVICE_SECRET_HEADER: &str = "X-Service-Secret";
pub const ACCESS_TARGET_HEADER: &str = "Access-Target";

/// Parsed `Access-Target: "<vid>:<vname>:<path> <uid>:<gids>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTarget {
    pub vid: Option<i64>,
    pub vname: String,
    pub path: String,
    pub uid: u32,
    pub gids: Vec<u32>,
}

impl AccessTarget {
    pub fn identity(&self) -> Identity {
        Identity {
            uid: self.uid,
            gids: self.gids.clone(),
        }
    }
}

impl FromStr for AccessTarget {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || AuthError::BadAccessTarget(s.to_string());
        let (location, principal) = s.trim().split_once(' ').ok_or_else(bad)?;

        let mut loc = location.splitn(3, ':');
        let vid = loc.next().ok_or_else(bad)?;
        let vname = loc.next().ok_or_else(bad)?;
        let path = loc.next().unwrap_or("");
        let vid = match vid {
            "" => None,
            v => Some(v.parse().map_err(|_| bad())?),
        };

        let (uid, gids) = principal.trim().split_once(':').ok_or_else(bad)?;
        let uid = uid.parse().map_err(|_| bad())?;
        let gids = gids
            .split(',')
            .filter(|g| !g.is_empty())
            .map(|g| g.trim().parse().map_err(|_| bad()))
            .collect::<Result<Vec<u32>, _>>()?;

        Ok(Self {
            vid,
            vname: vname.to_string(),
            path: path.to_string(),
            uid,
            gids,
        })
    }
}

/// Who a request runs as, attached to request extensions by [`authorize`].
#[derive(Debug, Clone)]
pub enum Caller {
    /// Presented the service secret.
    Service { target: Option<AccessTarget> },
    /// Debug mode without a usable bearer token.
    Debug,
    User {
        principal: Principal,
        target: Option<AccessTarget>,
    },
}

impl Caller {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Caller::User { principal, .. } => Some(principal),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<&AccessTarget> {
        match self {
            Caller::Service { target } | Caller::User { target, .. } => target.as_ref(),
            Caller::Debug => None,
        }
    }

    /// Identity to check resource permissions against; `None` bypasses the check.
    pub fn effective_identity(&self) -> Option<Identity> {
        match self {
            Caller::Service { .. } | Caller::Debug => None,
            Caller::User { principal, target } => Some(
                target
                    .as_ref()
                    .map(AccessTarget::identity)
                    .unwrap_or_else(|| principal.identity()),
            ),
        }
    }

    /// Name used in logs and audit entries.
    pub fn actor(&self) -> String {
        match self {
            Caller::Service { .. } => "[service]".to_string(),
            Caller::Debug => "[debug]admin".to_string(),
            Caller::User { principal, .. } => principal.username.clone(),
        }
    }
}

/// Resolves callers from request headers.
#[derive(Clone)]
pub struct Gate {
    parser: Arc<dyn TokenParser>,
    service_secret: Option<Arc<str>>,
    debug: bool,
}

impl Gate {
    pub fn new(parser: Arc<dyn TokenParser>, service_secret: Option<String>, debug: bool) -> Self {
        Self {
            parser,
            service_secret: service_secret.filter(|s| !s.is_empty()).map(Into::into),
            debug,
        }
    }

    pub fn parser(&self) -> &Arc<dyn TokenParser> {
        &self.parser
    }

    /// A route policy; an empty list only requires a valid bearer token.
    pub fn policy(&self, required: &[&str]) -> Policy {
        Policy {
            gate: self.clone(),
            required: CapabilitySet::new(required.iter().copied()),
        }
    }

    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        required: &CapabilitySet,
    ) -> Result<Caller, AuthError> {
        let target = headers
            .get(ACCESS_TARGET_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .map(AccessTarget::from_str)
            .transpose()?;

        if let Some(presented) = headers
            .get(SERVICE_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            return match &self.service_secret {
                Some(secret) if secret.as_ref() == presented => Ok(Caller::Service { target }),
                _ => Err(AuthError::BadServiceSecret),
            };
        }

        let token = match bearer_token(headers) {
            Some(token) => token,
            None if self.debug => return Ok(Caller::Debug),
            None => return Err(AuthError::MissingToken),
        };

        let principal = match self.principal(token).await {
            Ok(principal) => principal,
            Err(_) if self.debug => return Ok(Caller::Debug),
            Err(e) => return Err(e),
        };

        if !self.debug && !required.is_empty() && !principal.groups.intersects(required) {
            return Err(AuthError::Forbidden);
        }

        if let Some(t) = &target {
            let foreign_gid = t.gids.iter().any(|g| !principal.group_ids.contains(g));
            if (t.uid != principal.uid || foreign_gid) && !principal.is_admin() {
                return Err(AuthError::Forbidden);
            }
        }

        Ok(Caller::User { principal, target })
    }

    async fn principal(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.parser.parse(token).await?;
        if claims.token_use != TokenUse::Access {
            return Err(TokenError::WrongUse.into());
        }
        Principal::from_claims(&claims, token)
            .ok_or_else(|| TokenError::Malformed("non-numeric subject".into()).into())
    }
}

/// A [`Gate`] bound to the capability set a route requires.
#[derive(Clone)]
pub struct Policy {
    gate: Gate,
    required: CapabilitySet,
}

/// Middleware attaching a [`Caller`] to the request, or rejecting it.
pub async fn authorize(State(policy): State<Policy>, mut req: Request, next: Next) -> Response {
    match policy.gate.resolve(req.headers(), &policy.required).await {
        Ok(caller) => {
            tracing::debug!(actor = %caller.actor(), "request authorized");
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

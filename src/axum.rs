//! Axum integration utilities.
//!
//! [`AuthorizeLayer`] guards a route with a fixed action/subject pair. The
//! acting role is read from the [`ActingRole`] request extension, which an
//! upstream layer inserts (for example `jwt::JwtRoleLayer` with the
//! `axum-jwt` feature). If a context value of type `C` is present in the
//! request extensions it is passed to conditions.

use std::future::poll_fn;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::registry::RoleRegistry;
use crate::types::{Action, RoleName, Subject};

use ::axum::body::Body;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};

/// Role of the caller, attached to the request by the provisioning layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingRole(pub RoleName);

impl ActingRole {
    /// Returns the role name.
    pub fn name(&self) -> &RoleName {
        &self.0
    }
}

/// Middleware layer that authorizes a request against a [`RoleRegistry`].
pub struct AuthorizeLayer<C> {
    registry: Arc<RoleRegistry<C>>,
    action: Action,
    subject: Subject,
}

impl<C> AuthorizeLayer<C> {
    /// Creates a new authorization layer.
    pub fn new(registry: Arc<RoleRegistry<C>>, action: Action, subject: Subject) -> Self {
        Self {
            registry,
            action,
            subject,
        }
    }
}

impl<C> Clone for AuthorizeLayer<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            action: self.action.clone(),
            subject: self.subject.clone(),
        }
    }
}

impl<C, Inner> Layer<Inner> for AuthorizeLayer<C> {
    type Service = AuthorizeService<Inner, C>;

    fn layer(&self, inner: Inner) -> Self::Service {
        AuthorizeService {
            inner,
            registry: Arc::clone(&self.registry),
            action: self.action.clone(),
            subject: self.subject.clone(),
            _context: PhantomData,
        }
    }
}

/// Middleware service that enforces access checks.
pub struct AuthorizeService<Inner, C> {
    inner: Inner,
    registry: Arc<RoleRegistry<C>>,
    action: Action,
    subject: Subject,
    _context: PhantomData<fn() -> C>,
}

impl<Inner: Clone, C> Clone for AuthorizeService<Inner, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            registry: Arc::clone(&self.registry),
            action: self.action.clone(),
            subject: self.subject.clone(),
            _context: PhantomData,
        }
    }
}

impl<Inner, C> Service<Request<Body>> for AuthorizeService<Inner, C>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    C: Clone + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let registry = Arc::clone(&self.registry);
        let action = self.action.clone();
        let subject = self.subject.clone();

        Box::pin(async move {
            let Some(role) = req.extensions().get::<ActingRole>().cloned() else {
                return Ok((StatusCode::UNAUTHORIZED, "missing acting role").into_response());
            };
            let context = req.extensions().get::<C>().cloned();

            let allowed = registry
                .check_access(
                    role.name().as_str(),
                    action.as_str(),
                    subject.as_str(),
                    context.as_ref(),
                )
                .await;
            if allowed {
                poll_fn(|cx| inner.poll_ready(cx)).await?;
                inner.call(req).await
            } else {
                Ok((StatusCode::FORBIDDEN, "forbidden").into_response())
            }
        })
    }
}

#[cfg(feature = "axum-jwt")]
pub mod jwt {
    //! Bearer-token provisioning of the acting role.

    use std::fmt;
    use std::future::poll_fn;
    use std::marker::PhantomData;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde::de::DeserializeOwned;
    use thiserror::Error;

    use super::ActingRole;
    use crate::types::RoleName;

    use ::axum::body::Body;
    use ::axum::extract::FromRequestParts;
    use ::axum::http::header::AUTHORIZATION;
    use ::axum::http::request::Parts;
    use ::axum::http::{HeaderMap, Request, StatusCode};
    use ::axum::response::{IntoResponse, Response};
    use ::tower::{Layer, Service};

    /// Errors returned by JWT helpers.
    #[derive(Debug, Error)]
    pub enum AuthError {
        /// Authorization header is missing.
        #[error("missing authorization header")]
        MissingAuthorization,
        /// Authorization header format is invalid.
        #[error("invalid authorization header")]
        InvalidAuthorization,
        /// JWT validation error.
        #[error("invalid token")]
        InvalidToken,
        /// Role claim is not a valid role name.
        #[error("invalid role claim: {0}")]
        InvalidRole(String),
    }

    /// Rejection type for axum extractors.
    #[derive(Debug)]
    pub struct AuthRejection {
        status: StatusCode,
        message: String,
    }

    impl From<AuthError> for AuthRejection {
        fn from(err: AuthError) -> Self {
            Self {
                status: StatusCode::UNAUTHORIZED,
                message: err.to_string(),
            }
        }
    }

    impl IntoResponse for AuthRejection {
        fn into_response(self) -> Response {
            (self.status, self.message).into_response()
        }
    }

    /// Claims type carrying the acting role.
    pub trait RoleClaims: DeserializeOwned + Send + Sync + Clone + 'static {
        /// Returns the role name string.
        fn role(&self) -> &str;
    }

    /// Default claims shape: `{ role, sub?, exp? }`.
    #[derive(Debug, Clone, serde::Deserialize)]
    pub struct DefaultClaims {
        /// Acting role name.
        pub role: String,
        /// Standard JWT subject.
        pub sub: Option<String>,
        /// Standard JWT expiration.
        pub exp: Option<usize>,
    }

    impl RoleClaims for DefaultClaims {
        fn role(&self) -> &str {
            &self.role
        }
    }

    /// JWT decoding settings.
    #[derive(Clone)]
    pub struct JwtRoleState<T: RoleClaims> {
        decoding_key: Arc<DecodingKey>,
        validation: Validation,
        _marker: PhantomData<fn() -> T>,
    }

    impl<T: RoleClaims> fmt::Debug for JwtRoleState<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("JwtRoleState")
                .field("decoding_key", &"<redacted>")
                .field("validation", &self.validation)
                .finish()
        }
    }

    impl<T: RoleClaims> JwtRoleState<T> {
        /// Creates a new JWT state.
        pub fn new(decoding_key: DecodingKey, validation: Validation) -> Self {
            Self {
                decoding_key: Arc::new(decoding_key),
                validation,
                _marker: PhantomData,
            }
        }

        fn decode_from_headers(&self, headers: &HeaderMap) -> Result<JwtRole<T>, AuthError> {
            let token = bearer_token(headers)?;
            let data = decode::<T>(&token, &self.decoding_key, &self.validation)
                .map_err(|_| AuthError::InvalidToken)?;
            JwtRole::from_claims(data.claims)
        }
    }

    /// Provides access to [`JwtRoleState`] for extractors.
    pub trait JwtRoleProvider<T: RoleClaims> {
        /// Returns the JWT state for decoding.
        fn jwt_role(&self) -> &JwtRoleState<T>;
    }

    /// Acting role decoded from a JWT, plus the full claims.
    #[derive(Debug, Clone)]
    pub struct JwtRole<T: RoleClaims> {
        /// Acting role.
        pub role: ActingRole,
        /// Full claims.
        pub claims: T,
    }

    impl<T: RoleClaims> JwtRole<T> {
        fn from_claims(claims: T) -> Result<Self, AuthError> {
            let role = RoleName::try_from(claims.role())
                .map_err(|err| AuthError::InvalidRole(err.to_string()))?;
            Ok(Self {
                role: ActingRole(role),
                claims,
            })
        }
    }

    impl<S, T> FromRequestParts<S> for JwtRole<T>
    where
        S: Send + Sync + JwtRoleProvider<T>,
        T: RoleClaims,
    {
        type Rejection = AuthRejection;

        async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
            if let Some(existing) = parts.extensions.get::<JwtRole<T>>() {
                return Ok(existing.clone());
            }
            let decoded = state.jwt_role().decode_from_headers(&parts.headers)?;
            parts.extensions.insert(decoded.clone());
            parts.extensions.insert(decoded.role.clone());
            Ok(decoded)
        }
    }

    /// Middleware layer that decodes a JWT and inserts [`ActingRole`].
    #[derive(Debug, Clone)]
    pub struct JwtRoleLayer<T: RoleClaims> {
        state: Arc<JwtRoleState<T>>,
    }

    impl<T: RoleClaims> JwtRoleLayer<T> {
        /// Creates a new JWT layer.
        pub fn new(state: JwtRoleState<T>) -> Self {
            Self {
                state: Arc::new(state),
            }
        }
    }

    impl<S, T> Layer<S> for JwtRoleLayer<T>
    where
        T: RoleClaims,
    {
        type Service = JwtRoleService<S, T>;

        fn layer(&self, inner: S) -> Self::Service {
            JwtRoleService {
                inner,
                state: Arc::clone(&self.state),
            }
        }
    }

    /// Middleware service that decodes a JWT and attaches [`ActingRole`].
    #[derive(Debug, Clone)]
    pub struct JwtRoleService<S, T: RoleClaims> {
        inner: S,
        state: Arc<JwtRoleState<T>>,
    }

    impl<S, T> Service<Request<Body>> for JwtRoleService<S, T>
    where
        S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
        S::Future: Send + 'static,
        T: RoleClaims,
    {
        type Response = Response;
        type Error = S::Error;
        type Future =
            Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, mut req: Request<Body>) -> Self::Future {
            let state = Arc::clone(&self.state);
            let mut inner = self.inner.clone();

            Box::pin(async move {
                match state.decode_from_headers(req.headers()) {
                    Ok(decoded) => {
                        req.extensions_mut().insert(decoded.role.clone());
                        req.extensions_mut().insert(decoded);
                        poll_fn(|cx| inner.poll_ready(cx)).await?;
                        inner.call(req).await
                    }
                    Err(err) => Ok(AuthRejection::from(err).into_response()),
                }
            })
        }
    }

    fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidAuthorization)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthorization)?;
        if token.is_empty() {
            return Err(AuthError::InvalidAuthorization);
        }
        Ok(token.to_string())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn bearer_token_should_require_bearer_prefix() {
            let mut headers = HeaderMap::new();
            assert!(matches!(
                bearer_token(&headers),
                Err(AuthError::MissingAuthorization)
            ));

            headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
            assert!(matches!(
                bearer_token(&headers),
                Err(AuthError::InvalidAuthorization)
            ));

            headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
            assert_eq!(bearer_token(&headers).unwrap(), "abc");
        }

        #[test]
        fn claims_should_yield_acting_role() {
            let claims = DefaultClaims {
                role: "editor".to_string(),
                sub: None,
                exp: None,
            };
            let decoded = JwtRole::from_claims(claims).unwrap();
            assert_eq!(decoded.role.name().as_str(), "editor");

            let invalid = DefaultClaims {
                role: String::new(),
                sub: None,
                exp: None,
            };
            assert!(matches!(
                JwtRole::from_claims(invalid),
                Err(AuthError::InvalidRole(_))
            ));
        }
    }
}

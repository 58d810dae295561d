// src/access.rs

//! Access layer.
//!
//! Every resource collection is gated by a single table lookup keyed by the
//! caller's role, the resource and the action. The table lives in
//! [`authorize`]; [`access_middleware`] applies it to incoming requests and
//! [`SessionScope`] narrows which exam sessions a caller can see.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, models::user::Role, utils::jwt::Claims};

/// The authenticated caller, as decoded from an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl TryFrom<&Claims> for Identity {
    type Error = AppError;

    fn try_from(claims: &Claims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;

        Ok(Identity {
            user_id,
            role: Role::parse(&claims.role),
        })
    }
}

/// Resource collections exposed under `/api`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Users,
    Specializations,
    Questions,
    ExamDefinitions,
    ExamSessions,
    AiSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// List or retrieve.
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn from_method(method: &Method) -> Self {
        if method == Method::POST {
            Action::Create
        } else if method == Method::PUT || method == Method::PATCH {
            Action::Update
        } else if method == Method::DELETE {
            Action::Delete
        } else {
            Action::Read
        }
    }

    pub fn is_write(self) -> bool {
        !matches!(self, Action::Read)
    }
}

/// Decides whether `identity` may perform `action` on `resource`.
///
/// Returns `AuthError` (401) for anonymous callers and `Forbidden` (403)
/// when the role is not allowed.
pub fn authorize(
    identity: Option<&Identity>,
    resource: Resource,
    action: Action,
) -> Result<(), AppError> {
    let identity = identity.ok_or_else(|| {
        AppError::AuthError("Authentication credentials were not provided".to_string())
    })?;

    let allowed = match resource {
        Resource::Users | Resource::AiSettings | Resource::ExamDefinitions => identity.is_admin(),
        Resource::Specializations => true,
        Resource::Questions => !action.is_write() || identity.is_admin(),
        // Row-level filtering happens through `SessionScope`.
        Resource::ExamSessions => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

/// Which exam sessions a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    All,
    OwnedBy(i64),
    Nothing,
}

impl SessionScope {
    pub fn for_identity(identity: &Identity) -> Self {
        match identity.role {
            Role::Admin => SessionScope::All,
            Role::Student => SessionScope::OwnedBy(identity.user_id),
            Role::Other(_) => SessionScope::Nothing,
        }
    }

    /// Student id to filter on, if the scope is limited to one student.
    pub fn owner(&self) -> Option<i64> {
        match self {
            SessionScope::OwnedBy(owner) => Some(*owner),
            _ => None,
        }
    }

    pub fn permits(&self, student_id: i64) -> bool {
        match self {
            SessionScope::All => true,
            SessionScope::OwnedBy(owner) => *owner == student_id,
            SessionScope::Nothing => false,
        }
    }
}

/// Axum Middleware: Access control.
///
/// Must be layered inside `auth_middleware`, which provides the `Identity`.
/// The action is derived from the HTTP method.
pub async fn access_middleware(
    State(resource): State<Resource>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let action = Action::from_method(req.method());
    let identity = req.extensions().get::<Identity>();

    if let Err(e) = authorize(identity, resource, action) {
        tracing::debug!(?resource, ?action, user = ?identity.map(|i| i.user_id), "access denied");
        return Err(e);
    }

    Ok(next.run(req).await)
}

use crate::{
    errors::{AppError, AppResult},
    models::{Claims, Role},
    state::AppState,
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

/// Authenticated user extractor.
/// Add `auth: AuthUser` as a parameter in any handler that requires authentication.
/// Every query a handler issues must be scoped by `auth.tenant_id`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub role: Role,
    pub employee_id: Option<Uuid>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let headers: &HeaderMap = &parts.headers;

        let auth_header = headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization format".to_string()))?;

        decode_token(token, &state.config.jwt_secret)
    }
}

pub fn decode_token(token: &str, secret: &str) -> AppResult<AuthUser> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;
    let claims = token_data.claims;

    let parse = |raw: &str| Uuid::parse_str(raw).map_err(|_| AppError::InvalidToken);

    Ok(AuthUser {
        user_id: parse(&claims.sub)?,
        tenant_id: parse(&claims.tenant_id)?,
        tenant_name: claims.tenant_name,
        role: claims.role,
        employee_id: claims.employee_id.as_deref().map(parse).transpose()?,
    })
}

impl AuthUser {
    pub fn require_role(&self, allowed: &[Role]) -> AppResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "role {:?} may not perform this action",
                self.role
            )))
        }
    }

    /// HR staff who can edit payroll inputs and drive runs.
    pub fn require_payroll_operator(&self) -> AppResult<()> {
        self.require_role(&[Role::Admin, Role::HrManager, Role::PayrollOfficer])
    }

    /// Approvals, payments and tenant-wide configuration.
    pub fn require_manager(&self) -> AppResult<()> {
        self.require_role(&[Role::Admin, Role::HrManager])
    }

    /// Operators see every record in their tenant; employees only their own.
    pub fn ensure_can_view(&self, employee_id: Uuid) -> AppResult<()> {
        if self.role != Role::Employee || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "employees may only view their own records".to_string(),
            ))
        }
    }

    /// Employee filter for list endpoints.
    pub fn visible_employee(&self, requested: Option<Uuid>) -> AppResult<Option<Uuid>> {
        if self.role == Role::Employee {
            self.acting_employee(requested).map(Some)
        } else {
            Ok(requested)
        }
    }

    /// The employee a self-service request acts for. Operators may name any
    /// employee; employees only themselves.
    pub fn acting_employee(&self, requested: Option<Uuid>) -> AppResult<Uuid> {
        match (self.role, requested, self.employee_id) {
            (Role::Employee, Some(req), Some(own)) if req != own => Err(AppError::Forbidden(
                "employees may only act for themselves".to_string(),
            )),
            (Role::Employee, _, Some(own)) => Ok(own),
            (Role::Employee, _, None) => Err(AppError::Forbidden(
                "user is not linked to an employee record".to_string(),
            )),
            (_, Some(req), _) => Ok(req),
            (_, None, Some(own)) => Ok(own),
            (_, None, None) => Err(AppError::Validation("employee_id is required".to_string())),
        }
    }
}

#[cfg(test)]
pub fn generate_token(claims: &Claims, secret: &str) -> Result<String, AppError> {
    use jsonwebtoken::{EncodingKey, Header, encode};

    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(role: Role, employee_id: Option<Uuid>) -> Claims {
        let now = Utc::now().timestamp() as usize;
        Claims {
            sub: Uuid::new_v4().to_string(),
            tenant_id: Uuid::new_v4().to_string(),
            tenant_name: "Acme".to_string(),
            role,
            employee_id: employee_id.map(|id| id.to_string()),
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_decode_round_trips_tenant_and_role() {
        let c = claims(Role::PayrollOfficer, None);
        let token = generate_token(&c, "secret").unwrap();
        let user = decode_token(&token, "secret").unwrap();
        assert_eq!(user.tenant_id.to_string(), c.tenant_id);
        assert_eq!(user.role, Role::PayrollOfficer);
        assert!(user.require_payroll_operator().is_ok());
        assert!(user.require_manager().is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = generate_token(&claims(Role::Admin, None), "secret").unwrap();
        assert!(matches!(
            decode_token(&token, "other"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_employees_only_see_their_own_records() {
        let own = Uuid::new_v4();
        let token = generate_token(&claims(Role::Employee, Some(own)), "secret").unwrap();
        let user = decode_token(&token, "secret").unwrap();
        assert!(user.ensure_can_view(own).is_ok());
        assert!(matches!(
            user.ensure_can_view(Uuid::new_v4()),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(user.visible_employee(None).unwrap(), Some(own));

        let token = generate_token(&claims(Role::HrManager, None), "secret").unwrap();
        let hr = decode_token(&token, "secret").unwrap();
        assert!(hr.ensure_can_view(own).is_ok());
        assert_eq!(hr.visible_employee(None).unwrap(), None);
    }

    #[test]
    fn test_employee_acts_only_for_self() {
        let own = Uuid::new_v4();
        let token = generate_token(&claims(Role::Employee, Some(own)), "secret").unwrap();
        let user = decode_token(&token, "secret").unwrap();
        assert_eq!(user.acting_employee(None).unwrap(), own);
        assert!(user.acting_employee(Some(Uuid::new_v4())).is_err());
    }
}

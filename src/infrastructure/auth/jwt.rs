use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, Header, TokenData, Validation};
use uuid::Uuid;

use crate::entities::token::{Claims, RefreshClaims, TokenType};
use crate::entities::user::User;
use crate::errors::AuthError;
use crate::repositories::token::TokenServiceRepository;
use crate::settings::{AppConfig, JwtKeys};

const JWT_ALGORITHM: Algorithm = Algorithm::HS512;

#[derive(Clone)]
pub struct JwtService {
    keys: JwtKeys,
    access_expiration: Duration,
    refresh_expiration: Duration,
}

impl JwtService {
    pub fn new(config: &AppConfig) -> Self {
        JwtService {
            keys: JwtKeys::from(config),
            access_expiration: Duration::minutes(config.jwt_expiration_minutes),
            refresh_expiration: Duration::days(config.refresh_token_exp_days),
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation
    }
}

impl TokenServiceRepository for JwtService {
    fn create_jwt(&self, user: &User, admin: bool) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            admin,
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
            exp: (now + self.access_expiration).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.keys.encoding)
            .map_err(|_| AuthError::TokenCreation)
    }

    fn create_refresh_jwt(&self, user_id: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Refresh,
            exp: (now + self.refresh_expiration).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.keys.refresh_encoding)
            .map_err(|_| AuthError::TokenCreation)
    }

    fn decode_jwt(&self, token: &str) -> Result<TokenData<Claims>, AuthError> {
        let data = decode::<Claims>(token, &self.keys.decoding, &Self::validation())?;
        if data.claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidToken);
        }
        Ok(data)
    }

    fn decode_refresh_jwt(&self, token: &str) -> Result<TokenData<RefreshClaims>, AuthError> {
        let data = decode::<RefreshClaims>(
            token,
            &self.keys.refresh_decoding,
            &Self::validation(),
        )?;
        if data.claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidToken);
        }
        Ok(data)
    }
}

/// Seconds until `exp`, zero when already past.
pub fn remaining_ttl(exp: usize) -> u64 {
    let now = Utc::now().timestamp().max(0) as u64;
    (exp as u64).saturating_sub(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AppConfig;

    fn service() -> JwtService {
        let config = AppConfig::for_tests();
        JwtService::new(&config)
    }

    fn user() -> User {
        User {
            id: "u1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            avatar: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn access_token_round_trip_carries_identity() {
        let jwt = service();
        let token = jwt.create_jwt(&user(), true).unwrap();
        let claims = jwt.decode_jwt(&token).unwrap().claims;

        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.name, "Ada");
        assert!(claims.admin);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let jwt = service();
        let refresh = jwt.create_refresh_jwt("u1").unwrap();

        assert!(jwt.decode_jwt(&refresh).is_err());
        assert_eq!(jwt.decode_refresh_jwt(&refresh).unwrap().claims.sub, "u1");
    }

    #[test]
    fn tokens_get_distinct_ids() {
        let jwt = service();
        let a = jwt.decode_jwt(&jwt.create_jwt(&user(), false).unwrap()).unwrap();
        let b = jwt.decode_jwt(&jwt.create_jwt(&user(), false).unwrap()).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }
}

use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::{
    AuthorizationClaims, Error, User, UserId,
    clock::Clock,
    error::{CryptoError, TokenError},
    id::{TOKEN_ID_PREFIX, generate_prefixed_id},
};

use super::{IssuedToken, JwtConfig, TokenClaims, TokenLifetimes, TokenPair, TokenType};

/// Issues and verifies every token type.
///
/// Keys are decoded once at construction. Issuance performs no I/O;
/// verification performs none either, revocation is the caller's concern.
pub struct TokenService {
    config: JwtConfig,
    lifetimes: TokenLifetimes,
    clock: Arc<dyn Clock>,
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(
        config: JwtConfig,
        lifetimes: TokenLifetimes,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let encoding_key = config.get_encoding_key()?;
        let decoding_key = config.get_decoding_key()?;
        let validation = config.get_validation();
        let header = Header::new(config.jwt_algorithm());

        Ok(Self {
            config,
            lifetimes,
            clock,
            header,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    pub fn lifetimes(&self) -> &TokenLifetimes {
        &self.lifetimes
    }

    /// Mint a single token of the given type for a subject.
    pub fn issue(
        &self,
        subject: &UserId,
        token_type: TokenType,
        claims: AuthorizationClaims,
    ) -> Result<IssuedToken, Error> {
        let now = self.clock.now();
        let expires_at = now + self.lifetimes.lifetime(token_type);

        let claims = TokenClaims {
            sub: subject.to_string(),
            typ: token_type,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            jti: generate_prefixed_id(TOKEN_ID_PREFIX),
            claims,
        };

        let token = encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| CryptoError::JwtSigning(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    /// Issue an access token carrying the user's current claims and a bare refresh token.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, Error> {
        let access = self.issue(&user.id, TokenType::Access, user.claims.clone())?;
        let refresh = self.issue(
            &user.id,
            TokenType::Refresh,
            AuthorizationClaims::default(),
        )?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_in: self.lifetimes.access_secs,
            refresh_expires_in: self.lifetimes.refresh_secs,
        })
    }

    pub fn issue_temp_two_factor(&self, user_id: &UserId) -> Result<IssuedToken, Error> {
        self.issue(
            user_id,
            TokenType::TempTwoFactor,
            AuthorizationClaims::default(),
        )
    }

    pub fn issue_password_reset(&self, user_id: &UserId) -> Result<IssuedToken, Error> {
        self.issue(
            user_id,
            TokenType::PasswordReset,
            AuthorizationClaims::default(),
        )
    }

    pub fn issue_email_verification(&self, user_id: &UserId) -> Result<IssuedToken, Error> {
        self.issue(
            user_id,
            TokenType::EmailVerification,
            AuthorizationClaims::default(),
        )
    }

    /// Verify signature, issuer, audience, expiry and type.
    ///
    /// Every failure collapses to [`TokenError::Invalid`].
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<TokenClaims, TokenError> {
        let claims = self.inspect(token)?;

        if claims.is_expired_at(self.clock.now()) {
            tracing::debug!(jti = %claims.jti, "Token expired");
            return Err(TokenError::Invalid);
        }

        if claims.typ != expected {
            tracing::debug!(
                jti = %claims.jti,
                expected = %expected,
                actual = %claims.typ,
                "Token type mismatch"
            );
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }

    /// Check signature, issuer and audience only, ignoring type and expiry.
    pub fn inspect(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token validation failed");
                TokenError::Invalid
            })
    }
}

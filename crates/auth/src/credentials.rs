use serde::Deserialize;

use casahub_core::{DomainError, DomainResult};

/// Minimum accepted password length (login and account creation).
pub const MIN_PASSWORD_LEN: usize = 6;

/// Email + password pair submitted at login.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Shape checks only; whether the pair is *correct* is decided by the
    /// caller against the stored hash.
    pub fn validate(&self) -> DomainResult<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

/// Loose structural email check: `local@domain.tld`, no whitespace.
pub fn validate_email(email: &str) -> DomainResult<()> {
    let invalid = || DomainError::validation("invalid email");

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || tld.is_empty() {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> DomainResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(validate_email("admin@casahub.local").is_ok());
        assert!(validate_email("admin").is_err());
        assert!(validate_email("@casahub.local").is_err());
        assert!(validate_email("admin@local").is_err());
        assert!(validate_email("ad min@casahub.local").is_err());
        assert!(validate_email("a@b@c.d").is_err());
    }

    #[test]
    fn short_passwords_are_rejected() {
        let creds = Credentials {
            email: "admin@casahub.local".into(),
            password: "12345".into(),
        };
        assert!(creds.validate().is_err());
        let creds = Credentials {
            password: "123456".into(),
            ..creds
        };
        assert!(creds.validate().is_ok());
    }
}

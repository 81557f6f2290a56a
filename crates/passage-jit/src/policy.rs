//! Password complexity rules for the replacement tenant.

/// Outcome of a complexity check.
#[derive(Debug, Clone)]
pub struct PasswordValidation {
    pub is_valid: bool,
    /// Human-readable reasons the password was rejected. Internal only;
    /// the pipeline surfaces a single generic message.
    pub violations: Vec<String>,
}

/// Complexity rules, with every knob exposed as a named option.
///
/// The defaults match the replacement tenant's requirements: minimum length
/// 8 with all four character classes required.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
    /// When set, restricts which special characters are permitted; any
    /// non-alphanumeric character counts otherwise.
    pub allowed_special: Option<String>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            allowed_special: None,
        }
    }
}

impl PasswordPolicy {
    /// Checks a password against the policy.
    #[must_use]
    pub fn validate(&self, password: &str) -> PasswordValidation {
        let mut violations = Vec::new();

        if password.chars().count() < self.min_length {
            violations.push(format!(
                "password must be at least {} characters",
                self.min_length
            ));
        }
        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            violations.push("password must contain an uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            violations.push("password must contain a lowercase letter".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push("password must contain a digit".to_string());
        }

        let is_special = |c: char| match &self.allowed_special {
            Some(set) => set.contains(c),
            None => !c.is_alphanumeric(),
        };
        if self.require_special && !password.chars().any(is_special) {
            violations.push("password must contain a special character".to_string());
        }
        if let Some(set) = &self.allowed_special {
            if password
                .chars()
                .any(|c| !c.is_alphanumeric() && !set.contains(c))
            {
                violations.push("password contains a character that is not permitted".to_string());
            }
        }

        PasswordValidation {
            is_valid: violations.is_empty(),
            violations,
        }
    }
}

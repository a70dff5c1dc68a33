// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::services::scoring::TextMatch;

/// Quiz-taking rules shared by the lifecycle and authoring services.
#[derive(Debug, Clone)]
pub struct QuizPolicy {
    /// Whether a student may start a new attempt after completing one.
    pub allow_retakes: bool,
    /// When false every question is worth one point.
    pub weighted_scoring: bool,
    pub text_match: TextMatch,
    pub max_time_minutes: i32,
    pub max_questions: usize,
}

impl Default for QuizPolicy {
    fn default() -> Self {
        Self {
            allow_retakes: false,
            weighted_scoring: false,
            text_match: TextMatch::CaseInsensitive,
            max_time_minutes: 120,
            max_questions: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub cors_origin: String,
    pub password_min_length: usize,
    pub quiz: QuizPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let defaults = QuizPolicy::default();
        let quiz = QuizPolicy {
            allow_retakes: parse_var("QUIZ_ALLOW_RETAKES", defaults.allow_retakes)?,
            weighted_scoring: parse_var("QUIZ_WEIGHTED_SCORING", defaults.weighted_scoring)?,
            text_match: parse_var("QUIZ_TEXT_MATCH", defaults.text_match)?,
            max_time_minutes: parse_var("QUIZ_MAX_TIME_MINUTES", defaults.max_time_minutes)?,
            max_questions: parse_var("QUIZ_MAX_QUESTIONS", defaults.max_questions)?,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_var("JWT_EXPIRATION_SECONDS", 86_400)?,
            rust_log,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            password_min_length: parse_var("PASSWORD_MIN_LENGTH", 6)?,
            quiz,
        })
    }
}

/// Reads an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, String> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| format!("{} has an invalid value: '{}'", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_accepts_booleans_and_numbers() {
        assert!(parse_value::<bool>("X", "true").unwrap());
        assert_eq!(parse_value::<i32>("X", " 45 ").unwrap(), 45);
    }

    #[test]
    fn parse_value_rejects_garbage() {
        let err = parse_value::<bool>("QUIZ_ALLOW_RETAKES", "maybe").unwrap_err();
        assert!(err.contains("QUIZ_ALLOW_RETAKES"));
    }

    #[test]
    fn parse_value_reads_text_match() {
        assert_eq!(
            parse_value::<TextMatch>("QUIZ_TEXT_MATCH", "exact").unwrap(),
            TextMatch::Exact
        );
    }

    #[test]
    fn default_policy_is_single_attempt() {
        let policy = QuizPolicy::default();
        assert!(!policy.allow_retakes);
        assert!(!policy.weighted_scoring);
        assert_eq!(policy.text_match, TextMatch::CaseInsensitive);
    }
}

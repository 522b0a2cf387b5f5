use anyhow::{Context, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

pub const ARG_ASSIST_URL: &str = "assist-url";
pub const ARG_ASSIST_API_KEY: &str = "assist-api-key";
pub const ARG_ASSIST_TIMEOUT_SECONDS: &str = "assist-timeout-seconds";
pub const ARG_ASSIST_DAILY_QUOTA: &str = "assist-daily-quota";
pub const ARG_ASSIST_COOLDOWN_SECONDS: &str = "assist-cooldown-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ASSIST_URL)
                .long(ARG_ASSIST_URL)
                .help("Answering service endpoint")
                .env("UPASTHIT_ASSIST_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ASSIST_API_KEY)
                .long(ARG_ASSIST_API_KEY)
                .help("Bearer token for the answering service")
                .env("UPASTHIT_ASSIST_API_KEY"),
        )
        .arg(
            Arg::new(ARG_ASSIST_TIMEOUT_SECONDS)
                .long(ARG_ASSIST_TIMEOUT_SECONDS)
                .help("Timeout for answering service calls in seconds")
                .env("UPASTHIT_ASSIST_TIMEOUT_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_ASSIST_DAILY_QUOTA)
                .long(ARG_ASSIST_DAILY_QUOTA)
                .help("Questions admitted per student per calendar day")
                .env("UPASTHIT_ASSIST_DAILY_QUOTA")
                .default_value("10")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_ASSIST_COOLDOWN_SECONDS)
                .long(ARG_ASSIST_COOLDOWN_SECONDS)
                .help("Minimum seconds between two admitted questions")
                .env("UPASTHIT_ASSIST_COOLDOWN_SECONDS")
                .default_value("120")
                .value_parser(clap::value_parser!(i64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub api_key: Option<SecretString>,
    pub timeout_seconds: u64,
    pub daily_quota: i64,
    pub cooldown_seconds: i64,
}

impl Options {
    /// Extract assist options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if the required answering-service URL is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            url: matches
                .get_one::<String>(ARG_ASSIST_URL)
                .cloned()
                .context("missing required argument: --assist-url")?,
            api_key: matches
                .get_one::<String>(ARG_ASSIST_API_KEY)
                .cloned()
                .map(SecretString::from),
            timeout_seconds: matches
                .get_one::<u64>(ARG_ASSIST_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(30),
            daily_quota: matches
                .get_one::<i64>(ARG_ASSIST_DAILY_QUOTA)
                .copied()
                .unwrap_or(10),
            cooldown_seconds: matches
                .get_one::<i64>(ARG_ASSIST_COOLDOWN_SECONDS)
                .copied()
                .unwrap_or(120),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;

    #[test]
    fn assist_defaults() {
        let command = with_args(Command::new("test"));
        let matches = command.get_matches_from(vec![
            "test",
            "--assist-url",
            "https://assist.upasthit.com/api/chat",
        ]);
        let options = Options::parse(&matches).expect("options");
        assert_eq!(options.url, "https://assist.upasthit.com/api/chat");
        assert!(options.api_key.is_none());
        assert_eq!(options.timeout_seconds, 30);
        assert_eq!(options.daily_quota, 10);
        assert_eq!(options.cooldown_seconds, 120);
    }

    #[test]
    fn assist_overrides() {
        temp_env::with_vars(
            [
                ("UPASTHIT_ASSIST_DAILY_QUOTA", Some("3")),
                ("UPASTHIT_ASSIST_COOLDOWN_SECONDS", Some("10")),
            ],
            || {
                let command = with_args(Command::new("test"));
                let matches =
                    command.get_matches_from(vec!["test", "--assist-url", "https://a.example"]);
                let options = Options::parse(&matches).expect("options");
                assert_eq!(options.daily_quota, 3);
                assert_eq!(options.cooldown_seconds, 10);
            },
        );
    }
}

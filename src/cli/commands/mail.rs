use anyhow::Result;
use clap::{Arg, Command};
use secrecy::SecretString;

pub const ARG_MAIL_API_URL: &str = "mail-api-url";
pub const ARG_MAIL_API_KEY: &str = "mail-api-key";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_MAIL_FROM_NAME: &str = "mail-from-name";
pub const ARG_MAIL_QUEUE_DEPTH: &str = "mail-queue-depth";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAIL_API_URL)
                .long(ARG_MAIL_API_URL)
                .help("Transactional mail API base URL")
                .env("UPASTHIT_MAIL_API_URL")
                .default_value("https://api.brevo.com"),
        )
        .arg(
            Arg::new(ARG_MAIL_API_KEY)
                .long(ARG_MAIL_API_KEY)
                .help("Transactional mail API key (codes are logged-only when unset)")
                .env("UPASTHIT_MAIL_API_KEY"),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address for outbound mail")
                .env("UPASTHIT_MAIL_FROM")
                .default_value("no-reply@upasthit.com"),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM_NAME)
                .long(ARG_MAIL_FROM_NAME)
                .help("Sender display name for outbound mail")
                .env("UPASTHIT_MAIL_FROM_NAME")
                .default_value("Upasthit"),
        )
        .arg(
            Arg::new(ARG_MAIL_QUEUE_DEPTH)
                .long(ARG_MAIL_QUEUE_DEPTH)
                .help("Capacity of the in-process delivery queue")
                .env("UPASTHIT_MAIL_QUEUE_DEPTH")
                .default_value("64")
                .value_parser(clap::value_parser!(usize)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub from_email: String,
    pub from_name: String,
    pub queue_depth: usize,
}

impl Options {
    /// Extract mail options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is unexpectedly missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            api_url: matches
                .get_one::<String>(ARG_MAIL_API_URL)
                .cloned()
                .unwrap_or_else(|| "https://api.brevo.com".to_string()),
            api_key: matches
                .get_one::<String>(ARG_MAIL_API_KEY)
                .cloned()
                .map(SecretString::from),
            from_email: matches
                .get_one::<String>(ARG_MAIL_FROM)
                .cloned()
                .unwrap_or_else(|| "no-reply@upasthit.com".to_string()),
            from_name: matches
                .get_one::<String>(ARG_MAIL_FROM_NAME)
                .cloned()
                .unwrap_or_else(|| "Upasthit".to_string()),
            queue_depth: matches
                .get_one::<usize>(ARG_MAIL_QUEUE_DEPTH)
                .copied()
                .unwrap_or(64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;
    use secrecy::ExposeSecret;

    #[test]
    fn mail_defaults() {
        temp_env::with_vars([("UPASTHIT_MAIL_API_KEY", None::<&str>)], || {
            let command = with_args(Command::new("test"));
            let matches = command.get_matches_from(vec!["test"]);
            let options = Options::parse(&matches).expect("options");
            assert_eq!(options.api_url, "https://api.brevo.com");
            assert!(options.api_key.is_none());
            assert_eq!(options.from_email, "no-reply@upasthit.com");
            assert_eq!(options.from_name, "Upasthit");
            assert_eq!(options.queue_depth, 64);
        });
    }

    #[test]
    fn mail_api_key_from_env() {
        temp_env::with_vars([("UPASTHIT_MAIL_API_KEY", Some("xkeysib-test"))], || {
            let command = with_args(Command::new("test"));
            let matches = command.get_matches_from(vec!["test"]);
            let options = Options::parse(&matches).expect("options");
            let key = options.api_key.expect("api key");
            assert_eq!(key.expose_secret(), "xkeysib-test");
        });
    }
}

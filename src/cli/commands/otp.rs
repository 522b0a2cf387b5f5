use anyhow::Result;
use clap::{Arg, Command};

pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_OTP_TTL_SECONDS)
            .long(ARG_OTP_TTL_SECONDS)
            .help("Lifetime of a reset code in seconds")
            .env("UPASTHIT_OTP_TTL_SECONDS")
            .default_value("300")
            .value_parser(clap::value_parser!(i64)),
    )
}

#[derive(Debug)]
pub struct Options {
    pub ttl_seconds: i64,
}

impl Options {
    /// Extract OTP options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if the TTL argument is missing (clap defaults prevent this).
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let ttl_seconds = matches
            .get_one::<i64>(ARG_OTP_TTL_SECONDS)
            .copied()
            .unwrap_or(300);
        Ok(Self { ttl_seconds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;

    #[test]
    fn ttl_defaults_to_five_minutes() {
        let command = with_args(Command::new("test"));
        let matches = command.get_matches_from(vec!["test"]);
        let options = Options::parse(&matches).expect("options");
        assert_eq!(options.ttl_seconds, 300);
    }

    #[test]
    fn ttl_env_override() {
        temp_env::with_vars([("UPASTHIT_OTP_TTL_SECONDS", Some("60"))], || {
            let command = with_args(Command::new("test"));
            let matches = command.get_matches_from(vec!["test"]);
            let options = Options::parse(&matches).expect("options");
            assert_eq!(options.ttl_seconds, 60);
        });
    }
}

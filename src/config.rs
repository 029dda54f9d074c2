use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use url::Url;

use crate::app::Cli;
use crate::prelude::*;

/// Phase of a multi-part upload. A run split across several CI jobs sends one
/// record per job; the collector aggregates once every part has arrived.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiMode {
    Before,
    Partial,
    After,
}

impl MultiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MultiMode::Before => "before",
            MultiMode::Partial => "partial",
            MultiMode::After => "after",
        }
    }
}

impl fmt::Display for MultiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Config {
    pub upload_url: Url,
    pub upload_token: Option<String>,
    pub file_pattern: String,
    pub multi: Option<MultiMode>,
    pub set_exit_code: bool,

    pub hostname: String,
    pub branch: String,
    pub sha: String,
    pub tag: String,
    pub pull_request: String,
    pub slug: String,
    pub ci_name: String,
    pub build_number: String,
    pub build_url: String,
    pub job: String,

    pub flags: BTreeMap<String, String>,
}

pub const DEFAULT_UPLOAD_URL: &str = "http://0.0.0.0:1323";

impl TryFrom<Cli> for Config {
    type Error = Error;
    fn try_from(cli: Cli) -> Result<Self> {
        let flags = cli.flag_map();
        let raw_upload_url = cli.url;
        let upload_url = Url::parse(&raw_upload_url)
            .map_err(|e| anyhow!("invalid upload URL: {raw_upload_url}, {e}"))?;

        Ok(Self {
            upload_url,
            upload_token: cli.upload_token,
            file_pattern: cli.file.unwrap_or_default(),
            multi: cli.multi,
            set_exit_code: cli.set_exit_code,
            hostname: cli.host.unwrap_or_default(),
            branch: cli.branch.unwrap_or_default(),
            sha: cli.sha.unwrap_or_default(),
            tag: cli.tag.unwrap_or_default(),
            pull_request: cli.pr.unwrap_or_default(),
            slug: cli.slug.unwrap_or_default(),
            ci_name: cli.ci_name.unwrap_or_default(),
            build_number: cli.build_number.unwrap_or_default(),
            build_url: cli.build_url.unwrap_or_default(),
            job: cli.job.unwrap_or_default(),
            flags,
        })
    }
}

#[cfg(test)]
impl Config {
    /// Constructs a new `Config` with default values for testing purposes
    pub fn test() -> Self {
        Self {
            upload_url: Url::parse(DEFAULT_UPLOAD_URL).unwrap(),
            upload_token: Some("abc123".into()),
            file_pattern: String::new(),
            multi: None,
            set_exit_code: true,
            hostname: String::new(),
            branch: String::new(),
            sha: String::new(),
            tag: String::new(),
            pull_request: String::new(),
            slug: String::new(),
            ci_name: String::new(),
            build_number: String::new(),
            build_url: String::new(),
            job: String::new(),
            flags: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_try_from_defaults() {
        temp_env::with_vars(
            [
                ("TR_SITE", None::<&str>),
                ("TR_UPLOAD_TOKEN", None::<&str>),
            ],
            || {
                let config = Config::try_from(Cli::parse_from(["testrelay"])).unwrap();
                assert_eq!(config.upload_url.as_str(), "http://0.0.0.0:1323/");
                assert_eq!(config.file_pattern, "");
                assert_eq!(config.multi, None);
                assert!(config.set_exit_code);
                assert_eq!(config.upload_token, None);
                assert_eq!(config.branch, "");
            },
        );
    }

    #[test]
    fn test_try_from_rejects_an_invalid_url() {
        let cli = Cli::parse_from(["testrelay", "--url", "not a url"]);
        let err = Config::try_from(cli).unwrap_err();
        assert!(err.to_string().contains("invalid upload URL"));
    }

    #[test]
    fn test_url_flag_beats_the_environment() {
        temp_env::with_var("TR_SITE", Some("https://collector.acme.dev"), || {
            let cli = Cli::parse_from(["testrelay", "--url", "https://other.acme.dev"]);
            let config = Config::try_from(cli).unwrap();
            assert_eq!(config.upload_url.as_str(), "https://other.acme.dev/");
        });
    }

    #[test]
    fn test_environment_provides_url_and_token() {
        temp_env::with_vars(
            [
                ("TR_SITE", Some("https://collector.acme.dev")),
                ("TR_UPLOAD_TOKEN", Some("s3cr3t")),
            ],
            || {
                let config = Config::try_from(Cli::parse_from(["testrelay"])).unwrap();
                assert_eq!(config.upload_url.as_str(), "https://collector.acme.dev/");
                assert_eq!(config.upload_token.as_deref(), Some("s3cr3t"));
            },
        );
    }

    #[test]
    fn test_multi_accepts_the_three_phases() {
        for (value, mode) in [
            ("before", MultiMode::Before),
            ("partial", MultiMode::Partial),
            ("after", MultiMode::After),
        ] {
            let cli = Cli::parse_from(["testrelay", "--multi", value]);
            assert_eq!(cli.multi, Some(mode));
        }
    }

    #[test]
    fn test_multi_rejects_unknown_phases() {
        let parsed = Cli::try_parse_from(["testrelay", "--multi", "junit"]);
        assert!(parsed.is_err());
    }
}

use std::collections::BTreeMap;

use clap::{
    Parser,
    builder::{Styles, styling},
};

use crate::config::{Config, DEFAULT_UPLOAD_URL, MultiMode};
use crate::helpers::Environment;
use crate::local_logger::init_local_logger;
use crate::prelude::*;
use crate::reporter::{ReportPayload, Sender};

fn create_styles() -> Styles {
    styling::Styles::styled()
        .header(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(styling::AnsiColor::Cyan.on_default() | styling::Effects::BOLD)
        .placeholder(styling::AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(
    name = "testrelay",
    version,
    about = "Uploads test reports to a TestRelay collector",
    styles = create_styles()
)]
pub struct Cli {
    /// The report file to upload, as a path or a glob pattern.
    /// When omitted, the usual junit report locations are searched.
    #[arg(long)]
    pub file: Option<String>,

    /// Hostname to report instead of the machine's own
    #[arg(long)]
    pub host: Option<String>,

    /// Branch the tests ran on
    #[arg(long)]
    pub branch: Option<String>,

    /// Commit SHA the tests ran on
    #[arg(long)]
    pub sha: Option<String>,

    /// Tag being built
    #[arg(long)]
    pub tag: Option<String>,

    /// Pull request identifier
    #[arg(long)]
    pub pr: Option<String>,

    /// Repository slug, e.g. acme/relay
    #[arg(long)]
    pub slug: Option<String>,

    /// CI system name to report
    #[arg(long)]
    pub ci_name: Option<String>,

    /// Build number for labeling runs
    #[arg(long)]
    pub build_number: Option<String>,

    /// Build URL to link back to
    #[arg(long)]
    pub build_url: Option<String>,

    /// Job name within the build
    #[arg(long)]
    pub job: Option<String>,

    /// Phase of a multi-part upload: before, partial or after.
    ///
    /// Multi-part uploads let the collector group reports from several jobs
    /// into one build. Send `before` once so the collector knows a group is
    /// coming, `partial` with every result that belongs to the group, and
    /// `after` once all parts are in so extra files cannot join the group by
    /// accident. Without it every upload counts as its own build.
    #[arg(long, value_enum)]
    pub multi: Option<MultiMode>,

    /// The collector to upload to, useful for on-premises installations
    #[arg(long, env = "TR_SITE", default_value = DEFAULT_UPLOAD_URL)]
    pub url: String,

    /// The token to use for uploading the report
    #[arg(long, env = "TR_UPLOAD_TOKEN", hide_env_values = true)]
    pub upload_token: Option<String>,

    /// Exit 1 when the report has failed tests or cannot be parsed
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub set_exit_code: bool,

    /// Enable trace-level logging
    #[arg(long, default_value = "false")]
    pub debug: bool,
}

impl Cli {
    /// Flags in effect, shipped in the record so the collector can tell how
    /// the reporter was invoked. Metadata flags appear when given a non-empty
    /// value, the two switches always carry their effective value. The
    /// endpoint and the upload token never ship.
    pub fn flag_map(&self) -> BTreeMap<String, String> {
        let mut flags = BTreeMap::new();
        let metadata = [
            ("file", &self.file),
            ("host", &self.host),
            ("branch", &self.branch),
            ("sha", &self.sha),
            ("tag", &self.tag),
            ("pr", &self.pr),
            ("slug", &self.slug),
            ("ci-name", &self.ci_name),
            ("build-number", &self.build_number),
            ("build-url", &self.build_url),
            ("job", &self.job),
        ];
        for (name, value) in metadata {
            if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
                flags.insert(name.to_string(), value.to_string());
            }
        }
        if let Some(multi) = self.multi {
            flags.insert("multi".to_string(), multi.to_string());
        }
        flags.insert("set-exit-code".to_string(), self.set_exit_code.to_string());
        flags.insert("debug".to_string(), self.debug.to_string());
        flags
    }
}

pub async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_local_logger(cli.debug)?;
    execute(cli).await
}

/// Runs the detect, assemble and send pipeline once and returns the process
/// exit code.
async fn execute(cli: Cli) -> Result<i32> {
    let config = Config::try_from(cli)?;
    let env = Environment::from_process();

    let payload = ReportPayload::assemble(&config, &env)?;
    let sender = Sender::new();
    if let Err(err) = sender.send(config.upload_url.as_str(), &payload).await {
        debug!("upload failed!");
        return Err(err);
    }
    debug!("upload success!");

    let (failed, report_valid) = payload.failure_count();
    Ok(exit_code(config.set_exit_code, failed, report_valid))
}

/// Exit-code policy after a successful upload: failed tests and unreadable
/// reports exit 1, unless `--set-exit-code false` asked for 0 regardless.
fn exit_code(set_exit_code: bool, failed: usize, report_valid: bool) -> i32 {
    if !set_exit_code {
        return 0;
    }
    if !report_valid {
        debug!("test report is invalid");
        return 1;
    }
    if failed > 0 {
        debug!("exiting with failed tests: {failed}");
        return 1;
    }
    0
}

#[cfg(test)]
mod tests {
    use regex::Regex;
    use rstest::rstest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_flag_map_skips_missing_and_empty_flags() {
        let cli = Cli::parse_from(["testrelay", "--branch", "main", "--slug", ""]);
        let flags = cli.flag_map();
        assert_eq!(flags.get("branch").map(String::as_str), Some("main"));
        assert!(!flags.contains_key("slug"));
        assert!(!flags.contains_key("file"));
    }

    #[test]
    fn test_flag_map_always_carries_the_switches() {
        let cli = Cli::parse_from(["testrelay", "--set-exit-code", "false"]);
        let flags = cli.flag_map();
        assert_eq!(flags.get("set-exit-code").map(String::as_str), Some("false"));
        assert_eq!(flags.get("debug").map(String::as_str), Some("false"));

        let cli = Cli::parse_from(["testrelay", "--debug"]);
        let flags = cli.flag_map();
        assert_eq!(flags.get("set-exit-code").map(String::as_str), Some("true"));
        assert_eq!(flags.get("debug").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_flag_map_carries_the_multi_phase() {
        let cli = Cli::parse_from(["testrelay", "--multi", "partial"]);
        assert_eq!(
            cli.flag_map().get("multi").map(String::as_str),
            Some("partial")
        );
    }

    #[test]
    fn test_flag_map_never_ships_the_token_or_endpoint() {
        let cli = Cli::parse_from([
            "testrelay",
            "--upload-token",
            "s3cr3t",
            "--url",
            "https://collector.acme.dev",
        ]);
        let flags = cli.flag_map();
        assert!(!flags.contains_key("upload-token"));
        assert!(!flags.contains_key("url"));
    }

    #[rstest]
    #[case::switch_off(false, 7, false, 0)]
    #[case::invalid_report(true, 0, false, 1)]
    #[case::failed_tests(true, 3, true, 1)]
    #[case::clean_run(true, 0, true, 0)]
    fn test_exit_code(
        #[case] set_exit_code: bool,
        #[case] failed: usize,
        #[case] report_valid: bool,
        #[case] expected: i32,
    ) {
        assert_eq!(exit_code(set_exit_code, failed, report_valid), expected);
    }

    // Every field a CI environment could fill is passed explicitly so the
    // machine running the tests cannot leak into the record.
    fn pipeline_cli(server_url: &str, report: &str) -> Cli {
        Cli::parse_from([
            "testrelay",
            "--url",
            server_url,
            "--upload-token",
            "s3cr3t",
            "--file",
            report,
            "--host",
            "ci-runner-03",
            "--branch",
            "relay-integration",
            "--sha",
            "0f2387a1f13e75d45189db2d1b5ccc6aaa43754c",
            "--ci-name",
            "Gitlab",
            "--build-number",
            "4471",
            "--build-url",
            "https://gitlab.com/acme/relay/-/jobs/4471",
        ])
    }

    #[tokio::test]
    async fn test_execute_uploads_and_applies_the_exit_policy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/runs"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let report = format!(
            "{}/src/reporter/samples/gotest_fail.xml",
            env!("CARGO_MANIFEST_DIR")
        );
        let exit = execute(pipeline_cli(&server.uri(), &report)).await.unwrap();
        assert_eq!(exit, 1);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let key = requests[0]
            .headers
            .get("Idempotency-Key")
            .unwrap()
            .to_str()
            .unwrap();
        let key_format = Regex::new(r"^[0-9]+_[A-Za-z0-9_-]{6}$").unwrap();
        assert!(key_format.is_match(key), "unexpected key: {key}");

        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["branch"], "relay-integration");
        assert_eq!(body["ci_name"], "Gitlab");
        assert_eq!(body["file_names"][0], report);
    }
}

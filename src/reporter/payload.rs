use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::VERSION;
use crate::ci_vendor::{self, VendorDescriptor};
use crate::config::Config;
use crate::helpers::Environment;
use crate::prelude::*;
use crate::reporter::file_search::{self, NoMatches};
use crate::reporter::{git, junit};

/// The record shipped to the collector. Field names are the wire contract.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct RequestData {
    #[serde(rename = "run", with = "base64_blobs")]
    pub run_data: Vec<Vec<u8>>,
    #[serde(rename = "file_names")]
    pub filenames: Vec<String>,
    pub multi: String,
    pub hostname: String,
    pub reporter_version: String,
    pub flags: BTreeMap<String, String>,
    pub branch: String,
    pub sha: String,
    pub tag: String,
    #[serde(rename = "pr")]
    pub pull_request: String,
    pub slug: String,
    pub ci_name: String,
    pub build_number: String,
    pub build_url: String,
    pub job: String,
}

/// A fully assembled upload: the wire record plus everything the delivery
/// needs but never serializes. Frozen once assembly returns; the sender only
/// borrows it.
#[derive(Debug)]
pub struct ReportPayload {
    pub idempotency_key: String,
    pub upload_token: String,
    pub file_pattern: String,
    pub vendor: Option<&'static VendorDescriptor>,
    pub request_data: RequestData,
}

impl ReportPayload {
    /// Builds the record in a fixed order: token, hostname, run data, vendor
    /// detection, then sha, branch, build number and build URL. Every field
    /// follows the same precedence: an explicit override is kept, an active
    /// vendor's non-empty value comes next, local fallbacks come last.
    pub fn assemble(config: &Config, env: &Environment) -> Result<Self> {
        let mut payload = Self {
            idempotency_key: new_idempotency_key(),
            upload_token: resolve_upload_token(config)?,
            file_pattern: config.file_pattern.clone(),
            vendor: None,
            request_data: RequestData {
                run_data: Vec::new(),
                filenames: Vec::new(),
                multi: config
                    .multi
                    .map(|mode| mode.to_string())
                    .unwrap_or_default(),
                hostname: config.hostname.clone(),
                reporter_version: VERSION.to_string(),
                flags: config.flags.clone(),
                branch: config.branch.clone(),
                sha: config.sha.clone(),
                tag: config.tag.clone(),
                pull_request: config.pull_request.clone(),
                slug: config.slug.clone(),
                ci_name: config.ci_name.clone(),
                build_number: config.build_number.clone(),
                build_url: config.build_url.clone(),
                job: config.job.clone(),
            },
        };
        payload.fill_hostname()?;
        payload.collect_run_data()?;
        payload.vendor = ci_vendor::detect(env);
        payload.fill_ci_name();
        payload.fill_sha(env)?;
        payload.fill_branch(env)?;
        payload.fill_build_number(env);
        payload.fill_build_url(env);
        Ok(payload)
    }

    fn fill_hostname(&mut self) -> Result<()> {
        if !self.request_data.hostname.is_empty() {
            return Ok(());
        }
        self.request_data.hostname = System::host_name()
            .ok_or_else(|| anyhow!("failed to read the OS hostname, pass --host explicitly"))?;
        Ok(())
    }

    fn collect_run_data(&mut self) -> Result<()> {
        let files = match file_search::search_report_files(&self.file_pattern) {
            Ok(files) => files,
            Err(err) if self.is_multi() && err.downcast_ref::<NoMatches>().is_some() => {
                debug!("no report files found, acceptable for a multi-part run");
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        for file in files {
            let data = std::fs::read(&file)
                .with_context(|| format!("failed to read report file {}", file.display()))?;
            self.request_data.filenames.push(file.display().to_string());
            self.request_data.run_data.push(data);
        }
        Ok(())
    }

    fn fill_ci_name(&mut self) {
        if !self.request_data.ci_name.is_empty() {
            return;
        }
        if let Some(vendor) = self.vendor {
            self.request_data.ci_name = vendor.name.to_string();
        }
    }

    fn fill_sha(&mut self, env: &Environment) -> Result<()> {
        if !self.request_data.sha.is_empty() {
            return Ok(());
        }
        if let Some(vendor) = self.vendor {
            let sha = vendor.sha(env);
            if !sha.is_empty() {
                self.request_data.sha = sha;
                return Ok(());
            }
        }
        self.request_data.sha = git::commit_hash()?;
        Ok(())
    }

    fn fill_branch(&mut self, env: &Environment) -> Result<()> {
        if !self.request_data.branch.is_empty() {
            return Ok(());
        }
        if let Some(vendor) = self.vendor {
            let branch = vendor.branch(env);
            if !branch.is_empty() {
                self.request_data.branch = branch;
                return Ok(());
            }
        }
        let info = git::head_ref_description()?;
        debug!("ref description: {}", info.trim_end());
        self.request_data.branch = git::branch_from_ref_description(&info);
        debug!("derived branch: {}", self.request_data.branch);
        Ok(())
    }

    fn fill_build_number(&mut self, env: &Environment) {
        if !self.request_data.build_number.is_empty() {
            return;
        }
        if let Some(vendor) = self.vendor {
            let build_number = vendor.build_number(env);
            debug!("vendor build number: {build_number}");
            self.request_data.build_number = build_number;
        }
    }

    fn fill_build_url(&mut self, env: &Environment) {
        if !self.request_data.build_url.is_empty() {
            return;
        }
        if let Some(vendor) = self.vendor {
            self.request_data.build_url = vendor.build_url(env);
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(
            self.request_data.multi.as_str(),
            "before" | "partial" | "after"
        )
    }

    /// Number of failed tests in the report and whether the report could be
    /// read at all. Multi-part runs always report `(0, true)`: their
    /// aggregation happens on the collector once every part has arrived.
    /// Only the first blob is inspected; a run that matched several files
    /// ships them all but is judged by the first.
    pub fn failure_count(&self) -> (usize, bool) {
        if self.is_multi() {
            return (0, true);
        }
        let Some(first_blob) = self.request_data.run_data.first() else {
            return (0, false);
        };
        match junit::parse_suites(first_blob) {
            Ok(suites) => {
                for suite in &suites {
                    debug!("suite {}: {} of {} failed", suite.name, suite.failed, suite.tests);
                }
                (suites.iter().map(|suite| suite.failed).sum(), true)
            }
            Err(err) => {
                debug!("report not parseable: {err}");
                (0, false)
            }
        }
    }
}

fn resolve_upload_token(config: &Config) -> Result<String> {
    match config.upload_token.as_deref() {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => bail!("no upload token configured, set TR_UPLOAD_TOKEN or pass --upload-token"),
    }
}

/// Unique per invocation: unix nanoseconds, an underscore, then 6 characters
/// of URL-safe base64 over 4 random bytes.
fn new_idempotency_key() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_nanos();
    let noise: [u8; 4] = rand::random();
    format!("{nanos}_{}", &URL_SAFE.encode(noise)[..6])
}

mod base64_blobs {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(blobs: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(blobs.iter().map(|blob| STANDARD.encode(blob)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|blob| STANDARD.decode(blob).map_err(D::Error::custom))
            .collect()
    }
}

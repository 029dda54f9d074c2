use crate::helpers::Environment;

/// How one payload field is read from a vendor's environment.
///
/// Resolution is total: a missing variable reads as the empty string, and an
/// all-empty candidate list resolves to the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvRule {
    /// Read a single variable.
    Env(&'static str),
    /// Try candidates in order, first non-empty value wins.
    FirstOf(&'static [&'static str]),
    /// Pick the source depending on whether the job runs against a pull
    /// request. When the gate variable equals the sentinel the job is a
    /// plain mainline build; anything else (including the gate being unset)
    /// reads the pull-request source.
    PullRequestAware {
        gate: &'static str,
        not_pr_sentinel: &'static str,
        mainline: &'static str,
        pull_request: &'static str,
    },
}

impl EnvRule {
    pub fn resolve(&self, env: &Environment) -> String {
        match self {
            EnvRule::Env(name) => env.value(name),
            EnvRule::FirstOf(names) => names
                .iter()
                .map(|name| env.value(name))
                .find(|value| !value.is_empty())
                .unwrap_or_default(),
            EnvRule::PullRequestAware {
                gate,
                not_pr_sentinel,
                mainline,
                pull_request,
            } => {
                if env.value(gate) == *not_pr_sentinel {
                    env.value(mainline)
                } else {
                    env.value(pull_request)
                }
            }
        }
    }
}

/// One row of the vendor table: the variable whose presence identifies the
/// vendor, plus the extraction rule for each payload field.
#[derive(Debug)]
pub struct VendorDescriptor {
    pub name: &'static str,
    pub activation_signal: &'static str,
    branch: EnvRule,
    sha: EnvRule,
    build_number: EnvRule,
    build_url: EnvRule,
}

impl VendorDescriptor {
    pub fn branch(&self, env: &Environment) -> String {
        self.branch.resolve(env)
    }

    pub fn sha(&self, env: &Environment) -> String {
        self.sha.resolve(env)
    }

    pub fn build_number(&self, env: &Environment) -> String {
        self.build_number.resolve(env)
    }

    pub fn build_url(&self, env: &Environment) -> String {
        self.build_url.resolve(env)
    }
}

/// Supported CI vendors. The order is fixed: detection walks the table top to
/// bottom and the first active entry shadows the rest.
pub static VENDORS: [VendorDescriptor; 5] = [
    VendorDescriptor {
        name: "CircleCI",
        activation_signal: "CIRCLECI",
        branch: EnvRule::Env("CIRCLE_BRANCH"),
        sha: EnvRule::Env("CIRCLE_SHA1"),
        build_number: EnvRule::Env("CIRCLE_BUILD_NUM"),
        build_url: EnvRule::Env("CIRCLE_BUILD_URL"),
    },
    VendorDescriptor {
        name: "Gitlab",
        activation_signal: "GITLAB_CI",
        branch: EnvRule::Env("CI_COMMIT_REF_NAME"),
        sha: EnvRule::Env("CI_COMMIT_SHA"),
        build_number: EnvRule::Env("CI_JOB_ID"),
        build_url: EnvRule::Env("CI_JOB_URL"),
    },
    VendorDescriptor {
        name: "GithubActions",
        activation_signal: "GITHUB_ACTIONS",
        branch: EnvRule::Env("GITHUB_REF"),
        sha: EnvRule::Env("GITHUB_SHA"),
        build_number: EnvRule::Env("GITHUB_RUN_NUMBER"),
        build_url: EnvRule::Env("GITHUB_API_URL"),
    },
    VendorDescriptor {
        name: "Jenkins",
        activation_signal: "JENKINS_URL",
        branch: EnvRule::FirstOf(&["ghprbSourceBranch", "BRANCH_NAME"]),
        sha: EnvRule::FirstOf(&["ghprbActualCommit", "GIT_COMMIT"]),
        build_number: EnvRule::FirstOf(&["ghprbPullId", "BUILD_NUMBER"]),
        build_url: EnvRule::FirstOf(&["ghprbPullLink", "BUILD_URL"]),
    },
    VendorDescriptor {
        name: "TravisCI",
        activation_signal: "TRAVIS",
        branch: EnvRule::PullRequestAware {
            gate: "TRAVIS_PULL_REQUEST",
            not_pr_sentinel: "false",
            mainline: "TRAVIS_BRANCH",
            pull_request: "TRAVIS_PULL_REQUEST_BRANCH",
        },
        sha: EnvRule::PullRequestAware {
            gate: "TRAVIS_PULL_REQUEST",
            not_pr_sentinel: "false",
            mainline: "TRAVIS_COMMIT",
            pull_request: "TRAVIS_PULL_REQUEST_SHA",
        },
        build_number: EnvRule::Env("TRAVIS_BUILD_NUMBER"),
        build_url: EnvRule::Env("TRAVIS_BUILD_WEB_URL"),
    },
];

/// Returns the first vendor whose activation signal is set in `env`. Presence
/// is what counts: a signal set to the empty string still activates.
pub fn detect(env: &Environment) -> Option<&'static VendorDescriptor> {
    VENDORS
        .iter()
        .find(|vendor| env.contains(vendor.activation_signal))
}

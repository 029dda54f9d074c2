use std::collections::HashMap;

/// Read-only snapshot of the process environment, captured once at startup
/// and passed down to everything that needs it. A variable that is set to the
/// empty string is present; an unset variable is not.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Presence test, independent of the value.
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Value of `key`, or the empty string when it is not set.
    pub fn value(&self, key: &str) -> String {
        self.vars.get(key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
impl Environment {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            vars: pairs
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_but_empty_is_still_present() {
        let env = Environment::from_pairs([("CIRCLECI", "")]);
        assert!(env.contains("CIRCLECI"));
        assert_eq!(env.value("CIRCLECI"), "");
    }

    #[test]
    fn test_absent_reads_as_empty() {
        let env = Environment::empty();
        assert!(!env.contains("CIRCLECI"));
        assert_eq!(env.value("CIRCLECI"), "");
    }

    #[test]
    fn test_from_process_sees_the_real_environment() {
        temp_env::with_var("TESTRELAY_PROBE", Some("1"), || {
            let env = Environment::from_process();
            assert!(env.contains("TESTRELAY_PROBE"));
            assert_eq!(env.value("TESTRELAY_PROBE"), "1");
        });
    }
}

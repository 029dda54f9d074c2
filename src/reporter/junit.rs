use quick_xml::Reader;
use quick_xml::events::Event;

use crate::prelude::*;

/// Per-suite totals, the only part of a report this tool interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteTotals {
    pub name: String,
    pub tests: usize,
    pub failed: usize,
}

/// Scans a JUnit-shaped XML report and returns the totals of every test
/// suite in it, nested suites counted separately. A test case counts as
/// failed when it carries a `<failure>` child. Anything that is not
/// well-formed XML with at least one element is an error.
pub fn parse_suites(data: &[u8]) -> Result<Vec<SuiteTotals>> {
    let text = std::str::from_utf8(data).context("report is not valid UTF-8")?;
    let mut reader = Reader::from_str(text);

    let mut suites: Vec<SuiteTotals> = Vec::new();
    let mut open_suites: Vec<SuiteTotals> = Vec::new();
    let mut in_case = false;
    let mut case_failed = false;
    let mut saw_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                saw_element = true;
                match element.name().as_ref() {
                    b"testsuite" => open_suites.push(SuiteTotals {
                        name: attribute(&element, "name")?,
                        tests: 0,
                        failed: 0,
                    }),
                    b"testcase" => {
                        in_case = true;
                        case_failed = false;
                    }
                    b"failure" if in_case => case_failed = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(element)) => {
                saw_element = true;
                match element.name().as_ref() {
                    b"testsuite" => suites.push(SuiteTotals {
                        name: attribute(&element, "name")?,
                        tests: 0,
                        failed: 0,
                    }),
                    b"testcase" => {
                        if let Some(suite) = open_suites.last_mut() {
                            suite.tests += 1;
                        }
                    }
                    b"failure" if in_case => case_failed = true,
                    _ => {}
                }
            }
            Ok(Event::End(element)) => match element.name().as_ref() {
                b"testsuite" => {
                    let suite = open_suites
                        .pop()
                        .ok_or_else(|| anyhow!("unbalanced testsuite element"))?;
                    suites.push(suite);
                }
                b"testcase" => {
                    in_case = false;
                    if let Some(suite) = open_suites.last_mut() {
                        suite.tests += 1;
                        if case_failed {
                            suite.failed += 1;
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => bail!("malformed report: {err}"),
        }
    }

    if !saw_element {
        bail!("malformed report: no XML elements");
    }
    if !open_suites.is_empty() {
        bail!("malformed report: unclosed testsuite element");
    }
    Ok(suites)
}

fn attribute(element: &quick_xml::events::BytesStart, name: &str) -> Result<String> {
    match element
        .try_get_attribute(name)
        .map_err(|err| anyhow!("malformed report: {err}"))?
    {
        Some(attr) => Ok(attr
            .unescape_value()
            .map_err(|err| anyhow!("malformed report: {err}"))?
            .into_owned()),
        None => Ok(String::new()),
    }
}

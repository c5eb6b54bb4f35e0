use crate::types::CaseDescriptor;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Suite catalogs - pure data, no I/O
/// Ensures the runner and any tooling agree on case names, fixture paths,
/// and which cases are hidden from students.

pub const CORRECTNESS: &str = "Correctness";
pub const INCORRECTNESS: &str = "Incorrectness";

/// Expand numeric case ids into descriptors.
///
/// Fixture files are named `{dir}test{id}.in` / `.src` / `.exp`. The
/// visibility predicate sees the bare `test{id}` name.
pub fn generate_case_structure<I, V>(
    ids: I,
    dir: &str,
    category: &str,
    expect_failure: bool,
    visible: V,
) -> Vec<CaseDescriptor>
where
    I: IntoIterator<Item = u32>,
    V: Fn(&str) -> bool,
{
    let prefix = format!("{}test", dir);
    ids.into_iter()
        .map(|id| CaseDescriptor {
            name: format!("{} | Test #{}", category, id),
            input_path: PathBuf::from(format!("{}{}.in", prefix, id)),
            source_path: PathBuf::from(format!("{}{}.src", prefix, id)),
            expected_path: PathBuf::from(format!("{}{}.exp", prefix, id)),
            expect_failure,
            visible: visible(&format!("test{}", id)),
        })
        .collect()
}

/// Default predicate: every case is shown immediately
pub fn always_visible(_: &str) -> bool {
    true
}

fn visible_only(ids: &'static [u32]) -> impl Fn(&str) -> bool {
    move |name: &str| ids.iter().any(|id| name == format!("test{}", id))
}

fn correctness_dir(version: &str) -> String {
    format!("testsv{}/", version)
}

fn incorrectness_dir(version: &str) -> String {
    format!("failsv{}/", version)
}

// Older suite with limited visibility.
const V1_VISIBLE_SUCCESSES: &[u32] = &[1, 2, 6, 8, 10, 27, 28];
const V1_VISIBLE_FAILS: &[u32] = &[1, 7, 9];

const V2_NUM_CORRECT: u32 = 72;
const V2_NUM_FAILS: u32 = 53;

const V3_SUCCESSES: &[u32] = &[
    20, 22, 37, 112, 113, 114, 122, 127, 140, 156, 201, 202, 203, 204, 205, 301, 305, 306, 307,
    308, 309, 310, 311, 312, 313, 314, 315, 316, 318, 319, 320, 323, 324, 325, 340, 341,
];
const V3_FAILS: &[u32] = &[26, 27, 29, 30, 105, 302, 303, 304, 317, 321, 322];

pub fn generate_test_suite_v1() -> Vec<CaseDescriptor> {
    let version = "1";
    let mut cases = generate_case_structure(
        1..=30,
        &correctness_dir(version),
        CORRECTNESS,
        false,
        visible_only(V1_VISIBLE_SUCCESSES),
    );
    cases.extend(generate_case_structure(
        1..=20,
        &incorrectness_dir(version),
        INCORRECTNESS,
        true,
        visible_only(V1_VISIBLE_FAILS),
    ));
    cases
}

pub fn generate_test_suite_v2() -> Vec<CaseDescriptor> {
    let version = "2";
    let mut cases = generate_case_structure(
        1..=V2_NUM_CORRECT,
        &correctness_dir(version),
        CORRECTNESS,
        false,
        always_visible,
    );
    cases.extend(generate_case_structure(
        1..=V2_NUM_FAILS,
        &incorrectness_dir(version),
        INCORRECTNESS,
        true,
        always_visible,
    ));
    cases
}

pub fn generate_test_suite_v3() -> Vec<CaseDescriptor> {
    let version = "3";
    let mut cases = generate_case_structure(
        V3_SUCCESSES.iter().copied(),
        &correctness_dir(version),
        CORRECTNESS,
        false,
        always_visible,
    );
    cases.extend(generate_case_structure(
        V3_FAILS.iter().copied(),
        &incorrectness_dir(version),
        INCORRECTNESS,
        true,
        always_visible,
    ));
    cases
}

/// Suite version selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuiteVersion {
    V1,
    V2,
    V3,
}

impl SuiteVersion {
    pub const ALL: [SuiteVersion; 3] = [SuiteVersion::V1, SuiteVersion::V2, SuiteVersion::V3];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteVersion::V1 => "1",
            SuiteVersion::V2 => "2",
            SuiteVersion::V3 => "3",
        }
    }

    pub fn cases(&self) -> Vec<CaseDescriptor> {
        match self {
            SuiteVersion::V1 => generate_test_suite_v1(),
            SuiteVersion::V2 => generate_test_suite_v2(),
            SuiteVersion::V3 => generate_test_suite_v3(),
        }
    }
}

impl fmt::Display for SuiteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuiteVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(SuiteVersion::V1),
            "2" => Ok(SuiteVersion::V2),
            "3" => Ok(SuiteVersion::V3),
            other => Err(format!(
                "unknown suite version '{}' (expected one of: 1, 2, 3)",
                other
            )),
        }
    }
}

// Copyright (C) 2026 by GiGa infosystems

//! Version parsing & version lines.
//!
//! Dependency versions in a buildpack manifest are only mostly `semver`: upstream projects publish
//! versions like `1.20` or `v2.4`, so [`parse_version`] pads them before handing them to
//! [`semver`].

use semver::Version;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Parse a dependency version leniently, padding missing minor & patch components with `0` and
/// ignoring a leading `v`
pub fn parse_version(version: &str) -> Result<Version, semver::Error> {
    let version = version.trim();
    let version = version.strip_prefix(['v', 'V']).unwrap_or(version);

    let core_end = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(core_end);

    let padding = match core.matches('.').count() {
        0 => ".0.0",
        1 => ".0",
        _ => "",
    };

    format!("{core}{padding}{suffix}").parse()
}

/// An invalid version line
#[derive(Debug, Error)]
#[error("invalid version line {line:?}: {reason}")]
pub struct VersionLineError {
    line: String,
    reason: &'static str,
}

/// A selector for a set of versions sharing a prefix, such as `1.20.X` or `latest`.
///
/// A `None` component matches any value.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct VersionLine {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
}

impl VersionLine {
    /// The version line matching every version
    pub const LATEST: Self = VersionLine {
        major: None,
        minor: None,
        patch: None,
    };

    pub fn matches(&self, version: &Version) -> bool {
        self.major.is_none_or(|major| major == version.major)
            && self.minor.is_none_or(|minor| minor == version.minor)
            && self.patch.is_none_or(|patch| patch == version.patch)
    }
}

impl FromStr for VersionLine {
    type Err = VersionLineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let error = |reason| VersionLineError {
            line: line.to_owned(),
            reason,
        };

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("latest") {
            return Ok(VersionLine::LATEST);
        }

        let mut components = [None; 3];
        let mut seen_wildcard = false;
        for (idx, segment) in trimmed.split('.').enumerate() {
            if idx >= components.len() {
                return Err(error("more than three components"));
            }

            if matches!(segment, "x" | "X" | "*") {
                seen_wildcard = true;
                continue;
            }

            if seen_wildcard {
                return Err(error("a number can't follow a wildcard"));
            }

            let number = segment
                .parse::<u64>()
                .map_err(|_| error("components have to be numbers or `X`"))?;
            components[idx] = Some(number);
        }

        let [major, minor, patch] = components;
        Ok(VersionLine {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for VersionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == VersionLine::LATEST {
            return f.write_str("latest");
        }

        let component = |c: Option<u64>| c.map_or_else(|| "X".to_owned(), |c| c.to_string());
        write!(
            f,
            "{}.{}.{}",
            component(self.major),
            component(self.minor),
            component(self.patch)
        )
    }
}

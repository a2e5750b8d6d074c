// Copyright (C) 2026 by GiGa infosystems

//! Git helpers for the application to add the updated `buildpack.toml` & commit it

use color_eyre::{Result, eyre::bail};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// A `git` repository
pub struct Repository {
    /// The path to the repository, or `None` for the current working directory
    path: Option<PathBuf>,
    /// If any changes got `git add`ed to the repository
    dirty: bool,
}

impl Repository {
    /// Open an existing [`Repository`] at the given path.
    ///
    /// This does not check if the repository actually exist, methods on this type will simply fail
    /// if it doesn't.
    pub fn new(path: Option<PathBuf>) -> Self {
        Repository { path, dirty: false }
    }

    fn git(&self, args: &[&str], paths: &[&Path]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args).args(paths);
        if let Some(ref path) = self.path {
            cmd.current_dir(path);
        }
        cmd
    }

    /// Run `git`, failing on any non-zero exit status
    fn run(&self, args: &[&str], paths: &[&Path]) -> Result<Output> {
        debug!(?args, ?paths, "running git");
        let output = self
            .git(args, paths)
            .stderr(Stdio::inherit())
            .output()?;

        if !output.status.success() {
            bail!(
                "Failed to run `git {}`, returned status code {}",
                args.join(" "),
                output.status,
            );
        }

        Ok(output)
    }

    /// `git add` a given path if it includes changes.
    pub fn add(&mut self, path: &Path) -> Result<()> {
        let unchanged = self
            .git(&["diff", "-s", "--exit-code", "--"], &[path])
            .status()?
            .success();
        if !unchanged {
            self.run(&["add"], &[path])?;
            self.dirty = true;
        }
        Ok(())
    }

    /// Returns the current commit ID
    pub fn current_commit(&self) -> Result<String> {
        let output = self.run(&["rev-parse", "HEAD"], &[])?;
        let mut out = String::from_utf8(output.stdout)?;
        if out.ends_with('\n') {
            out.pop();
        }
        Ok(out)
    }

    /// `git commit` everything that got added, if there were any changes, and return the commit
    /// ID.
    ///
    /// If there were no changes, it returns `Ok(None)`.
    pub fn commit(&mut self, message: &str) -> Result<Option<String>> {
        if !self.dirty {
            return Ok(None);
        }
        self.run(&["commit", "-m", message], &[])?;
        self.dirty = false;
        Ok(Some(self.current_commit()?))
    }
}

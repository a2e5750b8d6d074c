// Copyright (C) 2026 by GiGa infosystems

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Report, WrapErr, bail, eyre},
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cnb_dependency_update::buildpack::BuildpackToml;
use cnb_dependency_update::changes::Changes;
use cnb_dependency_update::dependency::{Dependency, DependencyIdent, validate_stacks};
use cnb_dependency_update::git::Repository;
use cnb_dependency_update::merge::merge;
use cnb_dependency_update::order::sync_groups;
use cnb_dependency_update::version::VersionLine;

enum TemplateContext {
    Minijinja {
        path: PathBuf,
        jinja: Box<minijinja::Environment<'static>>,
    },
    OnlyDefaults,
}

impl TemplateContext {
    const COMMIT: &str = "commit.jinja";

    fn init(path: Option<PathBuf>) -> Result<Self> {
        match path {
            None => Ok(TemplateContext::OnlyDefaults),
            Some(path) => {
                if !path.is_dir() {
                    bail!("Template directory doesn't exist");
                }

                let mut jinja = minijinja::Environment::new();
                jinja.set_loader(minijinja::path_loader(&path));

                Ok(TemplateContext::Minijinja {
                    path,
                    jinja: Box::new(jinja),
                })
            }
        }
    }

    fn render(&self, name: &str, ctx: &impl Serialize) -> Result<Option<String>> {
        match self {
            TemplateContext::Minijinja { path, jinja } if path.join(name).is_file() => {
                Ok(Some(jinja.get_template(name)?.render(ctx)?))
            }
            TemplateContext::Minijinja { .. } | TemplateContext::OnlyDefaults => Ok(None),
        }
    }

    /// The commit message for `changes`, or `None` if nothing changed
    fn commit_message(&self, changes: &Changes, ticket: u64) -> Result<Option<String>> {
        if changes.is_empty() {
            return Ok(None);
        }

        let ctx = minijinja::context! {
            ticket => ticket,
            ..minijinja::Value::from_serialize(changes)
        };

        match self.render(Self::COMMIT, &ctx)? {
            Some(message) => Ok(Some(message)),
            None => Ok(changes.commit_message(ticket)),
        }
    }
}

/// Merge newly built versions of a dependency into a `buildpack.toml`, keeping a limited number of
/// versions per stack and version line, update `[[order.group]]` pins of it, and print a commit
/// message describing the change.
///
/// Nothing is printed if the manifest didn't change.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The path to the `buildpack.toml` to update
    #[arg(long, default_value = "buildpack.toml")]
    buildpack_toml: PathBuf,
    /// A JSON file with a list of newly built dependency records
    ///
    /// Each record has the keys `id`, `version`, `stacks`, `uri` and `sha256`, and optionally
    /// `name`, `source`, `source_sha256`, `deprecation_date` and any other keys that should end up
    /// in the manifest.
    #[arg(short = 'n', long)]
    new_dependencies: PathBuf,
    /// The identifier of the updated dependency
    #[arg(long)]
    id: String,
    /// The version of the updated dependency
    #[arg(long = "dependency-version")]
    dependency_version: String,
    /// The version line to update, such as `1.20.X`, `2.X.X` or `latest`
    #[arg(short = 'l', long, default_value = "latest")]
    version_line: String,
    /// The number of versions to keep per stack within the version line
    #[arg(short = 'k', long, default_value_t = 2)]
    versions_to_keep: usize,
    /// The tracker story to reference in the commit message
    #[arg(short = 's', long, default_value_t = 0)]
    tracker_story: u64,
    /// Also write the commit message to this file (an empty file if nothing changed)
    #[arg(long)]
    commit_message_path: Option<PathBuf>,
    /// Create a `git` commit of the updated `buildpack.toml`
    #[arg(short, long)]
    git: bool,
    /// The path to a directory containing a minijinja template for the commit message
    ///
    /// If `commit.jinja` exists it replaces the default message. It receives `dependency`
    /// (`id` & `version`), `added` & `rebuilt` (booleans), `removed` (a list of objects with `id`
    /// & `version`), `stacks` (a sorted list of strings) and `ticket`.
    #[arg(short = 'T', long, verbatim_doc_comment)]
    template_path: Option<PathBuf>,
}

struct AppContext {
    buildpack_toml: PathBuf,
    candidates: Vec<Dependency>,
    target: DependencyIdent,
    line: VersionLine,
    keep: NonZeroUsize,
    ticket: u64,
    commit_message_path: Option<PathBuf>,
    repository: Option<Repository>,
    templates: TemplateContext,
}

impl TryFrom<Args> for AppContext {
    type Error = Report;

    fn try_from(args: Args) -> Result<Self> {
        if args.buildpack_toml.extension() != Some("toml".as_ref()) {
            bail!(
                "A buildpack manifest should end in \".toml\", found {:?}",
                args.buildpack_toml
            );
        }

        let candidates = fs::read_to_string(&args.new_dependencies)
            .wrap_err_with(|| format!("Failed to read {:?}", args.new_dependencies))?;
        let candidates = serde_json::from_str::<Vec<Dependency>>(&candidates)
            .wrap_err_with(|| format!("Invalid dependency records in {:?}", args.new_dependencies))?;
        validate_stacks(&candidates)?;

        let target = DependencyIdent::new(args.id, args.dependency_version);
        if !candidates.iter().any(|dep| dep.is(&target)) {
            warn!(dependency = %target, "no new record matches the updated dependency");
        }

        let line = args.version_line.parse::<VersionLine>()?;
        let keep = NonZeroUsize::new(args.versions_to_keep)
            .ok_or_else(|| eyre!("At least one version has to be kept"))?;

        let repository = args.git.then(|| {
            let repository_path = args
                .buildpack_toml
                .parent()
                .filter(|path| !path.as_os_str().is_empty())
                .map(|path| path.to_owned());
            Repository::new(repository_path)
        });

        Ok(AppContext {
            buildpack_toml: args.buildpack_toml,
            candidates,
            target,
            line,
            keep,
            ticket: args.tracker_story,
            commit_message_path: args.commit_message_path,
            repository,
            templates: TemplateContext::init(args.template_path)?,
        })
    }
}

impl AppContext {
    fn run(&mut self) -> Result<Option<String>> {
        let mut buildpack = BuildpackToml::open(&self.buildpack_toml)?;

        let mut metadata = buildpack.metadata()?;
        let outcome = merge(
            &mut metadata,
            &self.target,
            &self.candidates,
            &self.line,
            self.keep,
        )
        .wrap_err("Failed to add the new dependencies to the dependency list")?;

        let orders = sync_groups(buildpack.orders()?, &self.target);

        let changes = Changes::between(
            &outcome.previous,
            &outcome.dependencies,
            self.target.clone(),
        );
        let message = self.templates.commit_message(&changes, self.ticket)?;

        if outcome.dependencies != outcome.previous {
            buildpack.set_dependencies(&outcome.dependencies)?;
        }
        buildpack.set_order_versions(&orders)?;
        buildpack.write_back()?;

        if let Some(ref path) = self.commit_message_path {
            fs::write(path, message.as_deref().unwrap_or_default())
                .wrap_err_with(|| format!("Failed to write {path:?}"))?;
        }

        if let (Some(repository), Some(message)) = (&mut self.repository, &message) {
            // The repository runs in the directory of the manifest
            let file_name = buildpack.path().file_name().map(Path::new);
            repository.add(file_name.unwrap_or(buildpack.path()))?;
            if let Some(commit) = repository.commit(message)? {
                info!(%commit, "committed");
            }
        }

        Ok(message)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let mut ctx = AppContext::try_from(Args::parse())?;

    if let Some(message) = ctx.run()? {
        println!("{message}");
    }

    Ok(())
}

use colored::Colorize;
use dbv_sdk::{
    BranchStatus, CheckStatus, Context, MergeOperation, MergeStatus, ObjectChange, PathStatus,
    Repository, RepositoryConfig, RollbackMode, RollbackOutcome, SemVer,
};
use serde_json::{json, Value};

use crate::cli::*;
use crate::script::{parse_key, resolution, Script, Step};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Some(RepositoryConfig::load(path)?),
        None => None,
    };
    match cli.command {
        Command::Run(args) => cmd_run(args, config, cli.format),
        Command::Check(args) => cmd_check(args),
        Command::Config(args) => cmd_config(args, config.unwrap_or_default(), cli.format),
    }
}

fn cmd_run(args: RunArgs, config: Option<RepositoryConfig>, format: OutputFormat) -> anyhow::Result<()> {
    let script = Script::load(&args.script)?;
    let config = config.or(script.config).unwrap_or_default();
    let mut session = Session::new(config)?;

    let mut failed = 0;
    for (i, step) in script.steps.iter().enumerate() {
        match session.run_step(step) {
            Ok(report) => match format {
                OutputFormat::Text => {
                    println!("{} {}", format!("[{}]", i + 1).dimmed(), report.text);
                }
                OutputFormat::Json => println!("{}", json!({ "step": i + 1, "op": step.name(), "ok": true, "result": report.data })),
            },
            Err(e) => {
                failed += 1;
                match format {
                    OutputFormat::Text => println!(
                        "{} {} {} {e:#}",
                        format!("[{}]", i + 1).dimmed(),
                        "✗".red().bold(),
                        step.name().bold()
                    ),
                    OutputFormat::Json => println!("{}", json!({ "step": i + 1, "op": step.name(), "ok": false, "error": format!("{e:#}") })),
                }
                if args.fail_fast {
                    break;
                }
            }
        }
    }

    if format == OutputFormat::Text {
        let total = script.steps.len();
        if failed == 0 {
            println!("\n{} {} step(s) ran", "✓".green().bold(), total);
        } else {
            println!("\n{} {} of {} step(s) failed", "✗".red().bold(), failed, total);
        }
    }
    anyhow::ensure!(failed == 0, "{failed} step(s) failed");
    Ok(())
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let script = Script::load(&args.script)?;
    for (i, step) in script.steps.iter().enumerate() {
        println!("{} {}", format!("[{}]", i + 1).dimmed(), step.name());
    }
    println!("{} {} step(s) valid", "✓".green().bold(), script.steps.len());
    Ok(())
}

fn cmd_config(args: ConfigArgs, config: RepositoryConfig, format: OutputFormat) -> anyhow::Result<()> {
    let value = serde_json::to_value(&config)?;
    match (&args.key, format) {
        (Some(key), _) => match value.get(key) {
            Some(v) => println!("{} = {}", key.bold(), v),
            None => anyhow::bail!("unknown configuration key {key:?}"),
        },
        (None, OutputFormat::Json) => println!("{}", serde_json::to_string_pretty(&value)?),
        (None, OutputFormat::Text) => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Output of one step: a colored line for humans and a JSON value.
pub struct StepReport {
    pub text: String,
    pub data: Value,
}

impl StepReport {
    fn new(text: impl Into<String>, data: Value) -> Self {
        Self {
            text: text.into(),
            data,
        }
    }
}

/// A repository driven one script step at a time.
pub struct Session {
    repo: Repository,
}

impl Session {
    pub fn new(config: RepositoryConfig) -> anyhow::Result<Self> {
        Ok(Self {
            repo: Repository::init(config)?,
        })
    }

    fn ctx(&self, branch: &Option<String>) -> Context {
        match branch {
            Some(b) => self.repo.context_for(b),
            None => self.repo.context(),
        }
    }

    fn branch_or_default(&self, branch: &Option<String>) -> String {
        branch
            .clone()
            .unwrap_or_else(|| self.repo.config().default_branch.clone())
    }

    pub fn run_step(&mut self, step: &Step) -> anyhow::Result<StepReport> {
        match step {
            Step::Create {
                branch,
                path,
                definition,
                severity,
                parent,
                message,
            } => {
                let key = parse_key(path)?;
                let mut change = ObjectChange::create(key.object_type, &key.schema, &key.name, definition);
                change.severity = *severity;
                if let Some(parent) = parent {
                    change = change.with_parent(parse_key(parent)?);
                }
                if let Some(message) = message {
                    change = change.with_message(message);
                }
                self.change(branch, change)
            }
            Step::Alter {
                branch,
                path,
                definition,
                severity,
                message,
            } => {
                let key = parse_key(path)?;
                let mut change = ObjectChange::alter(key.object_type, &key.schema, &key.name, definition);
                change.severity = *severity;
                if let Some(message) = message {
                    change = change.with_message(message);
                }
                self.change(branch, change)
            }
            Step::Drop {
                branch,
                path,
                severity,
            } => {
                let key = parse_key(path)?;
                let mut change = ObjectChange::drop(key.object_type, &key.schema, &key.name);
                change.severity = *severity;
                self.change(branch, change)
            }
            Step::Rename {
                branch,
                path,
                new_name,
                severity,
            } => {
                let key = parse_key(path)?;
                let mut change = ObjectChange::rename(key.object_type, &key.schema, &key.name, new_name);
                change.severity = *severity;
                self.change(branch, change)
            }
            Step::Branch { name, from } => {
                let from = self.branch_or_default(from);
                let branch = self.repo.create_branch(name, &from)?;
                Ok(StepReport::new(
                    format!(
                        "created branch {} from {} ({} object(s) shared)",
                        name.yellow(),
                        from.yellow(),
                        branch.stats.objects_inherited
                    ),
                    serde_json::to_value(&branch)?,
                ))
            }
            Step::DeleteBranch { name } => {
                self.repo.delete_branch(name)?;
                Ok(StepReport::new(
                    format!("deleted branch {}", name.yellow()),
                    json!({ "branch": name }),
                ))
            }
            Step::Depend {
                branch,
                dependent,
                depends_on,
                kind,
            } => {
                let (d, t) = (parse_key(dependent)?, parse_key(depends_on)?);
                self.repo.declare_dependency(&self.ctx(branch), &d, &t, *kind)?;
                Ok(StepReport::new(
                    format!("{} depends on {} ({})", dependent.bold(), depends_on.bold(), kind),
                    json!({ "dependent": dependent, "depends_on": depends_on, "kind": kind }),
                ))
            }
            Step::Order { branch, paths } => {
                let keys = paths
                    .iter()
                    .map(|p| parse_key(p))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let order: Vec<String> = self
                    .repo
                    .dependency_order(&self.branch_or_default(branch), &keys)?
                    .iter()
                    .map(|k| k.path())
                    .collect();
                Ok(StepReport::new(
                    format!("order: {}", order.join(" -> ")),
                    json!({ "order": order }),
                ))
            }
            Step::Diff { left, right } => {
                let diff = self.repo.diff_branches(left, right)?;
                let mut text = format!("diff {} .. {}", left.yellow(), right.yellow());
                for entry in &diff.entries {
                    if entry.status == PathStatus::Unchanged {
                        continue;
                    }
                    let status = match entry.status {
                        PathStatus::Added => entry.status.as_str().green(),
                        PathStatus::Removed => entry.status.as_str().red(),
                        PathStatus::Conflict => entry.status.as_str().red().bold(),
                        _ => entry.status.as_str().yellow(),
                    };
                    text.push_str(&format!("\n    {status:<10} {}", entry.path));
                }
                Ok(StepReport::new(text, serde_json::to_value(&diff)?))
            }
            Step::Conflicts { source, target } => {
                let target = self.branch_or_default(target);
                let report = self.repo.detect_conflicts(source, &target)?;
                let mut text = format!(
                    "{} difference(s) between {} and {}",
                    report.conflicts.len(),
                    source.yellow(),
                    target.yellow()
                );
                for c in &report.conflicts {
                    text.push_str(&format!(
                        "\n    {:<24} {:<8} {}",
                        c.conflict_type.to_string(),
                        c.severity.to_string(),
                        c.path
                    ));
                }
                Ok(StepReport::new(text, serde_json::to_value(&report)?))
            }
            Step::Merge {
                source,
                target,
                strategy,
            } => {
                let ctx = self.ctx(target);
                let op = self.repo.start_merge(&ctx, source, *strategy)?;
                merge_report(&op)
            }
            Step::Resolve {
                target,
                path,
                choice,
                definition,
            } => {
                let ctx = self.ctx(target);
                let open = self
                    .repo
                    .open_merges(&ctx.branch)
                    .pop()
                    .ok_or_else(|| anyhow::anyhow!("no open merge into {}", ctx.branch))?;
                let choice = resolution(choice, definition.as_deref())?;
                let op = self.repo.resolve_conflict(&ctx, open.id, path, choice)?;
                merge_report(&op)
            }
            Step::Abort { target } => {
                let target = self.branch_or_default(target);
                let open = self
                    .repo
                    .open_merges(&target)
                    .pop()
                    .ok_or_else(|| anyhow::anyhow!("no open merge into {target}"))?;
                let op = self.repo.abort_merge(open.id)?;
                merge_report(&op)
            }
            Step::Rollback {
                branch,
                back,
                count,
                mode,
            } => {
                let ctx = self.ctx(branch);
                let log = self.repo.log(&ctx.branch, back + count)?;
                anyhow::ensure!(
                    log.len() == back + count,
                    "branch {} has only {} commit(s)",
                    ctx.branch,
                    log.len()
                );
                let newest = log[*back].hash;
                let oldest = log[back + count - 1].hash;
                let outcome = if *count == 1 {
                    self.repo.rollback_commit(&ctx, newest, *mode)?
                } else {
                    self.repo.rollback_range(&ctx, oldest, newest, *mode)?
                };
                rollback_report(&outcome)
            }
            Step::History {
                branch,
                path,
                page,
                page_size,
            } => {
                let key = parse_key(path)?;
                let history = self
                    .repo
                    .history(&self.branch_or_default(branch), &key, *page, *page_size)?;
                let mut text = format!("history of {} ({} entries)", path.bold(), history.total);
                for e in &history.entries {
                    let before = e.before_version.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
                    text.push_str(&format!(
                        "\n    #{:<4} {:<18} {} -> {}  {}",
                        e.seq,
                        e.kind.to_string(),
                        before,
                        e.after_version.to_string().cyan(),
                        e.commit.short_hex().dimmed()
                    ));
                }
                Ok(StepReport::new(text, serde_json::to_value(&history)?))
            }
            Step::Log { branch, limit } => {
                let branch = self.branch_or_default(branch);
                let commits = self.repo.log(&branch, *limit)?;
                let mut text = format!("log of {}", branch.yellow());
                for c in &commits {
                    let marker = if c.is_merge() { "M".magenta() } else { " ".normal() };
                    text.push_str(&format!(
                        "\n    {} {} {} ({})",
                        marker,
                        c.hash.short_hex().yellow(),
                        c.message,
                        c.author.dimmed()
                    ));
                }
                Ok(StepReport::new(text, serde_json::to_value(&commits)?))
            }
            Step::Snapshot => {
                let snapshot = self.repo.snapshot();
                let mut text = String::from("snapshot");
                for b in &snapshot.branches {
                    let head = b.head.map(|h| h.short_hex()).unwrap_or_else(|| "-".into());
                    let status = match b.status {
                        BranchStatus::Active => b.status.as_str().green(),
                        BranchStatus::Conflicted => b.status.as_str().red(),
                        _ => b.status.as_str().dimmed(),
                    };
                    text.push_str(&format!("\n    {:<20} {} {}", b.name, head.yellow(), status));
                }
                Ok(StepReport::new(text, serde_json::to_value(&snapshot)?))
            }
            Step::Verify => {
                self.repo.verify()?;
                Ok(StepReport::new(
                    format!("{} history and dependencies verified", "✓".green().bold()),
                    json!({ "verified": true }),
                ))
            }
        }
    }

    fn change(&self, branch: &Option<String>, change: ObjectChange) -> anyhow::Result<StepReport> {
        let kind = change.kind;
        let outcome = self.repo.record_change(&self.ctx(branch), change)?;
        let text = match outcome.commit {
            Some(commit) => format!(
                "{} {} -> {} {}",
                kind.to_string().bold(),
                outcome.key.path(),
                version(outcome.version),
                commit.short_hex().dimmed()
            ),
            None => format!("{} {} unchanged", kind.to_string().bold(), outcome.key.path()),
        };
        Ok(StepReport::new(text, serde_json::to_value(&outcome)?))
    }
}

fn version(v: SemVer) -> colored::ColoredString {
    v.to_string().cyan()
}

fn merge_report(op: &MergeOperation) -> anyhow::Result<StepReport> {
    let status = match op.status() {
        MergeStatus::Completed => op.status().as_str().green(),
        MergeStatus::AwaitingResolution => op.status().as_str().yellow(),
        _ => op.status().as_str().red(),
    };
    let mut text = format!(
        "merge {} -> {}: {} ({} auto-merged, {}/{} conflict(s) resolved)",
        op.source_branch.yellow(),
        op.target_branch.yellow(),
        status,
        op.auto_merged_count(),
        op.resolved_count(),
        op.conflict_count()
    );
    for c in op.conflicts.iter().filter(|c| !c.is_resolved()) {
        text.push_str(&format!("\n    {} {} ({})", "conflict".red(), c.path, c.severity));
    }
    for hint in &op.rename_hints {
        text.push_str(&format!(
            "\n    {} {} ~ {}",
            "rename?".dimmed(),
            hint.source_path,
            hint.target_path
        ));
    }
    Ok(StepReport::new(text, serde_json::to_value(op)?))
}

fn rollback_report(outcome: &RollbackOutcome) -> anyhow::Result<StepReport> {
    let op = &outcome.operation;
    let verdict = if !op.is_success() {
        "blocked".red().bold()
    } else if op.mode == RollbackMode::DryRun {
        "dry run".yellow()
    } else {
        "executed".green()
    };
    let mut text = format!(
        "rollback on {}: {} ({} object(s))",
        op.branch.yellow(),
        verdict,
        outcome.changes.len()
    );
    for r in &outcome.report.results {
        let status = match r.status {
            CheckStatus::Pass => "PASS".green(),
            CheckStatus::Warn => "WARN".yellow(),
            CheckStatus::Fail => "FAIL".red(),
        };
        text.push_str(&format!("\n    {status} {:<22} {}", r.check, r.message));
    }
    if let Some(commit) = op.rollback_commit {
        text.push_str(&format!("\n    commit {}", commit.short_hex().yellow()));
    }
    Ok(StepReport::new(text, serde_json::to_value(outcome)?))
}

//! Subcommand implementations.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde_json::{Map, Value};

use pageview_core::{load_page, EngineConfig, PageConfig, RecordId};
use pageview_engine::{
    ActionScope, AllowAll, ConfirmationPrompt, Confirmer, MemorySource, PageSession,
    PermissionGate, StaticRoles,
};

use crate::cli::{Command, SessionArgs};

pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Validate { page } => run_validate(&page),
        Command::Render(args) => {
            let session = open_session(&args).await?;
            print_json(&session.snapshot())
        }
        Command::Stats(args) => {
            let session = open_session(&args).await?;
            print_json(&session.snapshot().stats)
        }
        Command::Export {
            session,
            format,
            output,
        } => {
            let session = open_session(&session).await?;
            let file = session.export(format).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(&file.filename));
            fs::write(&path, &file.bytes)
                .with_context(|| format!("write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = file.bytes.len(), "export written");
            println!("{}", path.display());
            Ok(())
        }
        Command::Action {
            session,
            action,
            scope,
            records,
            yes,
        } => {
            let session = open_session(&session).await?;
            let scope = ActionScope::from(scope);
            let ids: Vec<RecordId> = records.into_iter().map(RecordId).collect();

            let row = match scope {
                ActionScope::Bulk => {
                    for id in ids {
                        session.toggle_selection(id);
                    }
                    None
                }
                _ => ids.into_iter().next(),
            };

            let confirmer = AnswerPrompt { answer: yes };
            let outcome = session.invoke(scope, &action, row, &confirmer).await?;
            print_json(&outcome)?;
            tracing::info!(total = session.snapshot().total, "records after action");
            Ok(())
        }
    }
}

fn run_validate(path: &Path) -> Result<()> {
    let page = read_page(path)?;
    let views: Vec<&str> = page.view_types().iter().map(|v| v.as_str()).collect();
    println!("{}: ok ({})", page.id, views.join(", "));
    Ok(())
}

/// Build a session over the record fixture and apply the requested
/// toolbar state.
async fn open_session(args: &SessionArgs) -> Result<PageSession> {
    let page = read_page(&args.page)?;
    let entity = page.source.entity.clone();

    let data = fs::read_to_string(&args.data)
        .with_context(|| format!("read {}", args.data.display()))?;
    let mut source = MemorySource::from_json(&entity, &data)
        .with_context(|| format!("parse {}", args.data.display()))?;
    if let Some(path) = &args.aggregates {
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let payload: Map<String, Value> =
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
        source = source.with_stats(&entity, payload);
    }

    let gate: Arc<dyn PermissionGate> = match &args.roles {
        Some(roles) => Arc::new(StaticRoles::new(roles.iter().cloned())),
        None => Arc::new(AllowAll),
    };

    let session = PageSession::new(page, Arc::new(source), gate, load_config(args.config.as_deref())?)?;

    session.refresh().await?;
    if let Some(size) = args.page_size {
        session.set_page_size(size).await?;
    }
    for (field, value) in &args.filters {
        session.set_filter(field, value.clone()).await?;
    }
    if let Some(sort) = &args.sort {
        session.set_sort(Some(sort.clone())).await?;
    }
    if let Some(view) = args.view {
        session.switch_view(view).await?;
    }
    if let Some(search) = &args.search {
        session.set_search(search.as_str()).await?;
    }
    if args.page_index > 0 {
        session.set_page(args.page_index).await?;
    }
    Ok(session)
}

fn read_page(path: &Path) -> Result<PageConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    load_page(&text).with_context(|| format!("load page {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            EngineConfig::load_from(path).with_context(|| format!("load {}", path.display()))
        }
        None => Ok(EngineConfig::load().unwrap_or_else(|e| {
            tracing::warn!("using default engine config: {}", e);
            EngineConfig::default()
        })),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Answers every confirmation the same way.
struct AnswerPrompt {
    answer: bool,
}

impl Confirmer for AnswerPrompt {
    fn confirm(&self, prompt: &ConfirmationPrompt) -> BoxFuture<'static, bool> {
        eprintln!(
            "{}: {} [{} / {}] -> {}",
            prompt.title,
            prompt.message,
            prompt.confirm_label,
            prompt.cancel_label,
            if self.answer { "yes" } else { "no" }
        );
        let answer = self.answer;
        Box::pin(async move { answer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    use crate::cli::Cli;

    fn fixture(dir: &Path) -> (PathBuf, PathBuf) {
        let page = dir.join("page.json");
        let data = dir.join("data.json");
        fs::write(
            &page,
            json!({
                "id": "tickets",
                "title": "Tickets",
                "source": {"entity": "ticket", "defaultSorts": [{"field": "priority", "direction": "desc"}]},
                "toolbar": {
                    "filters": {"fields": [{"field": "open", "label": "Open", "type": "boolean"}]},
                    "export": {"enabled": true, "formats": ["csv", "json"]},
                    "bulkActions": [{"id": "delete", "label": "Delete"}]
                },
                "views": {"table": {"columns": [
                    {"field": "subject", "label": "Subject"},
                    {"field": "priority", "label": "Priority", "format": {"type": "number"}}
                ]}}
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            &data,
            json!([
                {"id": "t1", "subject": "Login fails", "priority": 3, "open": true},
                {"id": "t2", "subject": "Typo", "priority": 1, "open": false},
                {"id": "t3", "subject": "Data loss", "priority": 5, "open": true}
            ])
            .to_string(),
        )
        .unwrap();
        (page, data)
    }

    fn args(cli: &[&str]) -> SessionArgs {
        let Command::Render(args) = Cli::try_parse_from(cli).unwrap().command else {
            panic!("expected render");
        };
        args
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_session_applies_toolbar() {
        let dir = tempfile::tempdir().unwrap();
        let (page, data) = fixture(dir.path());
        let page = page.to_str().unwrap();
        let data = data.to_str().unwrap();
        let args = args(&["pageview", "render", "--page", page, "--data", data, "--filter", "open=true"]);

        let session = open_session(&args).await.unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.total, 2);
        let ids: Vec<String> = snapshot.record_ids().into_iter().map(|id| id.0).collect();
        assert_eq!(ids, ["t3", "t1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_and_bulk_action() {
        let dir = tempfile::tempdir().unwrap();
        let (page, data) = fixture(dir.path());
        let output = dir.path().join("out.csv");
        let cli = Cli::try_parse_from([
            "pageview",
            "export",
            "--page",
            page.to_str().unwrap(),
            "--data",
            data.to_str().unwrap(),
            "--format",
            "csv",
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(cli.command).await.unwrap();
        let csv = fs::read_to_string(&output).unwrap();
        assert_eq!(csv.lines().next(), Some("Subject,Priority"));
        assert_eq!(csv.lines().count(), 4);

        let cli = Cli::try_parse_from([
            "pageview",
            "action",
            "--page",
            page.to_str().unwrap(),
            "--data",
            data.to_str().unwrap(),
            "--id",
            "delete",
            "--records",
            "t1,t2",
        ])
        .unwrap();
        run(cli.command).await.unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"id": "x", "title": "X", "source": {"entity": "e"}, "views": {}}"#).unwrap();
        assert!(run_validate(&path).is_err());
    }
}

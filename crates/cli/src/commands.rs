use std::fmt;
use std::io::Write;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use crate::cli::{AddArgs, CliCommand, DeleteArgs, EditArgs, ListArgs, ToggleArgs};
use crate::core::dates::{parse_due_date, parse_due_time};
use crate::core::{category_label, CustomCategory, SyncOutcome, TaskChange, TasksService};
use crate::model::{NewTask, Task, TaskFilter, TaskPatch};

/// Run a non-interactive command against an already loaded service.
pub async fn execute<W: Write>(
    service: &TasksService,
    command: CliCommand,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    if !service.is_authenticated() {
        tracing::warn!("no user configured (--user or TASKFLOW_USER_ID); changes stay local");
    }
    service.refresh().await?;

    match command {
        CliCommand::List(args) => handle_list(service, &args, today, &mut writer),
        CliCommand::Add(args) => handle_add(service, args, today, &mut writer).await,
        CliCommand::Toggle(args) => handle_toggle(service, &args, &mut writer).await,
        CliCommand::Delete(args) => handle_delete(service, &args, &mut writer).await,
        CliCommand::Edit(args) => handle_edit(service, args, today, &mut writer).await,
        CliCommand::Stats => handle_stats(service, today, &mut writer),
        CliCommand::Calendar => handle_calendar(service, &mut writer),
        CliCommand::Mcp => Err(anyhow!("launch the MCP server directly")),
    }
}

fn handle_list<W: Write>(
    service: &TasksService,
    args: &ListArgs,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    let filter = TaskFilter::from_token(&args.filter);
    let snapshot = service.view(filter, args.category.as_deref(), today);
    if snapshot.tasks.is_empty() {
        writeln!(writer, "No tasks match {}", filter)?;
    }
    for task in &snapshot.tasks {
        writeln!(
            writer,
            "{}",
            TaskLine::new(task, &snapshot.custom_categories)
        )?;
    }
    writeln!(
        writer,
        "{} pending, {} completed",
        snapshot.pending, snapshot.completed
    )?;
    Ok(())
}

async fn handle_add<W: Write>(
    service: &TasksService,
    args: AddArgs,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    let task = new_task_from_args(args, today)?;
    match service.capture(task).await? {
        Some(created) => writeln!(writer, "Added {}", TaskLine::new(&created, &[]))?,
        None => writeln!(writer, "Not added: sign in to create tasks")?,
    }
    Ok(())
}

async fn handle_toggle<W: Write>(
    service: &TasksService,
    args: &ToggleArgs,
    mut writer: W,
) -> Result<()> {
    match service.toggle(&args.id).await? {
        Some(change) => writeln!(writer, "{}", ChangeLine::toggled(&change))?,
        None => writeln!(writer, "Not found: {}", args.id)?,
    }
    Ok(())
}

async fn handle_delete<W: Write>(
    service: &TasksService,
    args: &DeleteArgs,
    mut writer: W,
) -> Result<()> {
    let changes = service.delete(&args.ids).await?;
    let summary = DeleteSummary::from_changes(&args.ids, &changes);
    summary.write_to(&mut writer)?;
    Ok(())
}

async fn handle_edit<W: Write>(
    service: &TasksService,
    args: EditArgs,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    let id = args.id.clone();
    let patch = patch_from_args(args, today)?;
    if patch.is_empty() {
        return Err(anyhow!("Nothing to change for task {}", id));
    }
    match service.edit(&id, &patch).await? {
        Some(change) => writeln!(writer, "{}", ChangeLine::edited(&change))?,
        None => writeln!(writer, "Not found: {}", id)?,
    }
    Ok(())
}

fn handle_stats<W: Write>(service: &TasksService, today: NaiveDate, mut writer: W) -> Result<()> {
    let summary = service.summary(today);
    writeln!(
        writer,
        "{} tasks: {} completed, {} pending ({}% done)",
        summary.total, summary.completed, summary.pending, summary.completion_rate
    )?;
    writeln!(
        writer,
        "High priority: {} open, {}% done",
        summary.high_open, summary.high_completion_rate
    )?;
    writeln!(writer, "Due today: {}", summary.due_today)?;
    for row in summary.categories.iter().filter(|row| row.total > 0) {
        writeln!(
            writer,
            "  {:<12} {}/{} ({}%)",
            row.label, row.completed, row.total, row.percent
        )?;
    }
    Ok(())
}

fn handle_calendar<W: Write>(service: &TasksService, mut writer: W) -> Result<()> {
    let days = service.calendar();
    if days.is_empty() {
        writeln!(writer, "No dated tasks")?;
        return Ok(());
    }
    for (day, tasks) in days {
        writeln!(writer, "{}", day.format("%a %Y-%m-%d"))?;
        for task in tasks {
            writeln!(writer, "  {}", TaskLine::new(&task, &[]))?;
        }
    }
    Ok(())
}

fn new_task_from_args(args: AddArgs, today: NaiveDate) -> Result<NewTask> {
    let mut task = NewTask::titled(args.title.join(" ").trim().to_string());
    task.description = args.description.filter(|text| !text.trim().is_empty());
    task.priority = args.priority;
    task.category = args.category;
    task.due_date = args
        .due_date
        .as_deref()
        .map(|spec| parse_due_date(spec, today))
        .transpose()?;
    task.due_time = args.due_time.as_deref().map(parse_due_time).transpose()?;
    task.recurring = args.recurring;
    task.reminder = args.reminder;
    task.validate().context("Invalid task")?;
    Ok(task)
}

fn patch_from_args(args: EditArgs, today: NaiveDate) -> Result<TaskPatch> {
    let mut patch = TaskPatch {
        title: args.title,
        description: args
            .description
            .map(|text| Some(text).filter(|text| !text.trim().is_empty())),
        priority: args.priority,
        category: args.category,
        recurring: args.recurring,
        reminder: args.reminder,
        ..TaskPatch::default()
    };
    if args.clear_due {
        patch.due_date = Some(None);
        patch.due_time = Some(None);
    }
    if let Some(spec) = args.due_date.as_deref() {
        patch.due_date = Some(Some(parse_due_date(spec, today)?));
    }
    if let Some(spec) = args.due_time.as_deref() {
        patch.due_time = Some(Some(parse_due_time(spec)?));
    }
    Ok(patch)
}

/// One task rendered as `[x] #id title (priority, category, due)`.
struct TaskLine<'a> {
    task: &'a Task,
    category: String,
}

impl<'a> TaskLine<'a> {
    fn new(task: &'a Task, custom: &[CustomCategory]) -> Self {
        Self {
            task,
            category: category_label(&task.category, custom),
        }
    }
}

impl fmt::Display for TaskLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.task.completed { 'x' } else { ' ' };
        write!(
            f,
            "[{}] #{} {} ({}, {}",
            mark, self.task.id, self.task.title, self.task.priority, self.category
        )?;
        if let Some(date) = self.task.due_date {
            write!(f, ", due {}", date)?;
            if let Some(time) = self.task.due_time {
                write!(f, " {}", time.format("%H:%M"))?;
            }
        }
        write!(f, ")")
    }
}

enum ChangeLine<'a> {
    Toggled(&'a TaskChange),
    Edited(&'a TaskChange),
}

impl<'a> ChangeLine<'a> {
    fn toggled(change: &'a TaskChange) -> Self {
        ChangeLine::Toggled(change)
    }

    fn edited(change: &'a TaskChange) -> Self {
        ChangeLine::Edited(change)
    }
}

impl fmt::Display for ChangeLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let change = match self {
            ChangeLine::Toggled(change) | ChangeLine::Edited(change) => *change,
        };
        if let SyncOutcome::Compensated { reason } = &change.outcome {
            return write!(
                f,
                "Server rejected change to #{} ({}); local copy restored",
                change.id, reason
            );
        }
        match self {
            ChangeLine::Toggled(_) => {
                let state = if change.completed == Some(true) {
                    "completed"
                } else {
                    "pending"
                };
                write!(f, "Marked #{} {} as {}", change.id, change.title, state)
            }
            ChangeLine::Edited(_) => write!(f, "Updated #{} {}", change.id, change.title),
        }
    }
}

struct DeleteSummary {
    deleted: usize,
    rejected: Vec<String>,
    missing: Vec<String>,
}

impl DeleteSummary {
    fn from_changes(requested: &[String], changes: &[TaskChange]) -> Self {
        let mut deleted = 0usize;
        let mut rejected = Vec::new();
        for change in changes {
            if change.outcome.is_compensated() {
                rejected.push(change.id.clone());
            } else {
                deleted += 1;
            }
        }
        let missing = requested
            .iter()
            .filter(|id| !changes.iter().any(|change| &change.id == *id))
            .cloned()
            .collect();
        Self {
            deleted,
            rejected,
            missing,
        }
    }

    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::deleted(self.deleted))?;
        if !self.rejected.is_empty() {
            writeln!(writer, "Server rejected: {}", self.rejected.join(", "))?;
        }
        if !self.missing.is_empty() {
            writeln!(writer, "Not found: {}", self.missing.join(", "))?;
        }
        Ok(())
    }
}

enum SummaryLine {
    Deleted(usize),
    NoneDeleted,
}

impl SummaryLine {
    fn deleted(count: usize) -> Self {
        if count > 0 {
            SummaryLine::Deleted(count)
        } else {
            SummaryLine::NoneDeleted
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLine::Deleted(count) => {
                write!(
                    f,
                    "Deleted {} task{}",
                    count,
                    if *count == 1 { "" } else { "s" }
                )
            }
            SummaryLine::NoneDeleted => write!(f, "No tasks deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, TokenSource};
    use crate::core::api::{InMemoryTaskApi, Operation};
    use crate::model::Priority;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Arc;
    use tempfile::TempDir;

    const USER: &str = "user-1";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 21).expect("date")
    }

    fn temp_service() -> (TasksService, Arc<InMemoryTaskApi>, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::from_data_dir(dir.path().to_path_buf())
            .expect("config")
            .with_session(USER, TokenSource::None);
        let api = Arc::new(InMemoryTaskApi::new());
        let service = TasksService::with_api(config, api.clone()).expect("service");
        (service, api, dir)
    }

    async fn run(service: &TasksService, command: CliCommand) -> String {
        let mut output = Vec::new();
        execute(service, command, today(), &mut output)
            .await
            .expect("execute");
        String::from_utf8(output).expect("utf8")
    }

    fn add_args(title: &str) -> AddArgs {
        AddArgs {
            title: title.split_whitespace().map(str::to_string).collect(),
            description: None,
            priority: Priority::Medium,
            category: "work".into(),
            due_date: None,
            due_time: None,
            recurring: false,
            reminder: false,
        }
    }

    #[tokio::test]
    async fn add_then_list_shows_merged_fields() {
        let (service, _api, _dir) = temp_service();
        let mut args = add_args("Submit budget");
        args.priority = Priority::High;
        args.due_date = Some("tomorrow".into());
        args.due_time = Some("09:30".into());

        let added = run(&service, CliCommand::Add(args)).await;
        assert_eq!(
            added.trim(),
            "Added [ ] #1 Submit budget (high, Work, due 2026-02-22 09:30)"
        );

        let listed = run(
            &service,
            CliCommand::List(ListArgs {
                filter: "high".into(),
                category: None,
            }),
        )
        .await;
        assert!(listed.contains("#1 Submit budget"));
        assert!(listed.contains("1 pending, 0 completed"));
    }

    #[tokio::test]
    async fn add_rejects_invalid_title_without_request() {
        let (service, api, _dir) = temp_service();
        let mut output = Vec::new();
        let command = CliCommand::Add(add_args(&"x".repeat(201)));
        let result = execute(&service, command, today(), &mut output).await;

        assert!(result.is_err());
        assert_eq!(api.calls(Operation::Create), 0);
    }

    #[tokio::test]
    async fn toggle_reports_server_rejection() {
        let (service, api, _dir) = temp_service();
        api.seed(USER, "Stretch", false);
        api.fail_next(Operation::Toggle, 1);

        let output = run(&service, CliCommand::Toggle(ToggleArgs { id: "1".into() })).await;
        assert!(output.contains("Server rejected change to #1"));

        let output = run(&service, CliCommand::Toggle(ToggleArgs { id: "1".into() })).await;
        assert_eq!(output.trim(), "Marked #1 Stretch as completed");
    }

    #[tokio::test]
    async fn delete_command_reports_deleted_and_missing() {
        let (service, api, _dir) = temp_service();
        api.seed(USER, "Test", false);

        let output = run(
            &service,
            CliCommand::Delete(DeleteArgs {
                ids: vec!["1".into(), "missing".into()],
            }),
        )
        .await;

        assert!(output.contains("Deleted 1 task"));
        assert!(output.contains("Not found: missing"));
    }

    #[tokio::test]
    async fn delete_command_handles_no_matches() {
        let (service, _api, _dir) = temp_service();
        let output = run(
            &service,
            CliCommand::Delete(DeleteArgs {
                ids: vec!["missing".into()],
            }),
        )
        .await;

        assert!(output.contains("No tasks deleted"));
    }

    #[tokio::test]
    async fn edit_clears_due_date_and_renames() {
        let (service, _api, _dir) = temp_service();
        let mut args = add_args("Dentist");
        args.due_date = Some("2026-03-01".into());
        run(&service, CliCommand::Add(args)).await;

        let output = run(
            &service,
            CliCommand::Edit(EditArgs {
                id: "1".into(),
                title: Some("Dentist checkup".into()),
                clear_due: true,
                ..EditArgs::default()
            }),
        )
        .await;
        assert_eq!(output.trim(), "Updated #1 Dentist checkup");

        let calendar = run(&service, CliCommand::Calendar).await;
        assert_eq!(calendar.trim(), "No dated tasks");
    }

    #[tokio::test]
    async fn stats_lists_active_categories() {
        let (service, api, _dir) = temp_service();
        let mut args = add_args("Run");
        args.category = "health".into();
        run(&service, CliCommand::Add(args)).await;
        api.seed(USER, "Unsorted", true);

        let output = run(&service, CliCommand::Stats).await;

        assert!(output.starts_with("2 tasks: 1 completed, 1 pending (50% done)"));
        assert!(output.contains("Health       0/1 (0%)"));
        assert!(output.contains("Work         1/1 (100%)"));
    }

    #[tokio::test]
    async fn offline_add_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).expect("config");
        let service = TasksService::new(config).expect("service");

        let output = run(&service, CliCommand::Add(add_args("Local only"))).await;
        assert_eq!(output.trim(), "Not added: sign in to create tasks");
    }

    #[rstest]
    #[case(None, None, false, "[ ] #7 Read (low, Personal)")]
    #[case(Some("2026-03-01"), None, false, "[ ] #7 Read (low, Personal, due 2026-03-01)")]
    #[case(Some("2026-03-01"), Some("07:05"), true, "[x] #7 Read (low, Personal, due 2026-03-01 07:05)")]
    fn task_line_formats_optional_due(
        #[case] due: Option<&str>,
        #[case] time: Option<&str>,
        #[case] completed: bool,
        #[case] expected: &str,
    ) {
        let task = Task {
            id: "7".into(),
            title: "Read".into(),
            description: None,
            priority: Priority::Low,
            category: "personal".into(),
            due_date: due.map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")),
            due_time: time.and_then(crate::model::parse_clock_time),
            recurring: false,
            reminder: false,
            completed,
            created_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
        };
        assert_eq!(TaskLine::new(&task, &[]).to_string(), expected);
    }
}

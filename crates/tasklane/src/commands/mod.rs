use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tasklane_app::{
    AppConfig, MaintenanceScheduler, MaintenanceTrigger, ReorderCoordinator, ReorderOutcome, ServiceError,
    Snapshot, TaskList, TaskService, TracingNotifier,
};
use tasklane_core::calendar::time_blocks;
use tasklane_core::temporal::parse_date;
use tasklane_core::{
    Category, CategoryId, Clock, DropTarget, GroupKey, ListQuery, Recurrence, RecurrencePattern, Task,
    TaskFields, TaskId, UserId, group_tasks, visible_tasks,
};
use tasklane_store::{JsonStore, StaticSession};

use crate::view;
use crate::{CategoryCommand, Command, FieldArgs, LsFormat};

mod watch;

type Service<C> = TaskService<JsonStore, StaticSession, C>;
type Coordinator = ReorderCoordinator<JsonStore, StaticSession, TracingNotifier>;
type Scheduler<C> = MaintenanceScheduler<JsonStore, StaticSession, C>;

/// Services wired to one JSON store and one confirmed task list.
pub struct App<C> {
    service: Service<C>,
    coordinator: Coordinator,
    scheduler: Arc<Scheduler<C>>,
}

impl<C: Clock + Clone> App<C> {
    pub fn open(data_dir: &Path, config: &AppConfig, clock: C) -> Result<Self> {
        let store = JsonStore::open(config.store_path(data_dir))?;
        let session = config
            .session
            .user
            .map_or_else(StaticSession::signed_out, StaticSession::signed_in);
        let list = TaskList::new();
        Ok(Self {
            service: TaskService::new(store.clone(), session.clone(), clock.clone(), list.clone()),
            coordinator: ReorderCoordinator::new(store.clone(), session.clone(), list.clone(), TracingNotifier),
            scheduler: Arc::new(MaintenanceScheduler::new(
                store,
                session,
                clock,
                list,
                config.maintenance_config(),
            )),
        })
    }

    const fn list(&self) -> &TaskList {
        self.service.list()
    }

    const fn clock(&self) -> &C {
        self.service.clock()
    }
}

/// Write a configuration signed in as `user` (a fresh id when absent).
pub fn init(config_path: &Path, user: Option<&str>, utc_offset: Option<String>, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            config_path.display()
        );
    }
    let mut config = AppConfig::from_file(config_path)?;
    let user = user
        .map(|raw| UserId::from_str(raw).with_context(|| format!("Invalid user id: {raw}")))
        .transpose()?
        .unwrap_or_else(UserId::new);
    config.session.user = Some(user);
    if utc_offset.is_some() {
        config.clock.utc_offset = utc_offset;
        config.fixed_offset()?;
    }
    config.write(config_path)?;
    println!("signed in as {user}");
    println!("wrote {}", config_path.display());
    Ok(())
}

pub async fn run<C>(command: Command, app: &App<C>) -> Result<()>
where
    C: Clock + Clone + 'static,
{
    app.service.load().await.map_err(|err| match err {
        ServiceError::NotAuthenticated => anyhow!("not signed in; run `tasklane init` first"),
        other => anyhow::Error::new(other).context("failed to load tasks"),
    })?;
    let snapshot = app.list().snapshot();

    match command {
        Command::Init { .. } => unreachable!("init is handled before the store is opened"),
        Command::Add { title, fields } => {
            let mut task_fields = TaskFields {
                title,
                ..TaskFields::default()
            };
            apply_field_args(&mut task_fields, fields, &snapshot.categories)?;
            let task = app.service.create_task(task_fields).await?;
            println!("created task: {} {}", view::short_id(&task.id), task.title);
        }
        Command::Edit { task, title, fields } => {
            let task = resolve_task(&snapshot.tasks, &task)?;
            let mut task_fields = task.fields();
            if let Some(title) = title {
                task_fields.title = title;
            }
            apply_field_args(&mut task_fields, fields, &snapshot.categories)?;
            app.service.update_task(task.id, task_fields).await?;
            println!("updated task: {}", view::short_id(&task.id));
        }
        Command::Done { task } => {
            let task = resolve_task(&snapshot.tasks, &task)?;
            app.service.toggle_complete(task.id, true).await?;
            println!("completed: {}", task.title);
        }
        Command::Reopen { task } => {
            let task = resolve_task(&snapshot.tasks, &task)?;
            app.service.toggle_complete(task.id, false).await?;
            println!("reopened: {}", task.title);
        }
        Command::Rm { task } => {
            let task = resolve_task(&snapshot.tasks, &task)?;
            app.service.delete_task(task.id).await?;
            println!("deleted: {}", task.title);
        }
        Command::Ls {
            category,
            search,
            format,
        } => handle_ls(app, &snapshot, category, search, format)?,
        Command::Groups => handle_groups(app, &snapshot),
        Command::Calendar { date } => handle_calendar(app, &snapshot, date.as_deref())?,
        Command::Mv {
            task,
            before,
            into,
            index,
        } => handle_mv(app, &snapshot, &task, before.as_deref(), into.as_deref(), index).await?,
        Command::Category { cmd } => run_category(cmd, app, &snapshot.categories, &snapshot.tasks).await?,
        Command::Maintain => {
            let report = app.scheduler.trigger(MaintenanceTrigger::Manual).await;
            println!("{}", view::render_report(&report));
        }
        Command::Watch => watch::run(app).await?,
    }

    Ok(())
}

fn handle_ls<C: Clock + Clone>(
    app: &App<C>,
    snapshot: &Snapshot,
    category: Option<String>,
    search: Option<String>,
    format: LsFormat,
) -> Result<()> {
    let query = ListQuery {
        group: category
            .map(|raw| resolve_group(&snapshot.categories, &raw))
            .transpose()?,
        search,
    };
    let filtered = query != ListQuery::default();
    let now = app.clock().now();
    let tasks = visible_tasks(&snapshot.tasks, &query, now, app.clock());
    if tasks.is_empty() {
        if filtered {
            println!("No tasks matched the provided filters");
        } else {
            println!("No tasks found");
        }
        return Ok(());
    }
    match format {
        LsFormat::Table => print!("{}", view::render_task_table(&tasks, now, app.clock())),
        LsFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
    }
    Ok(())
}

fn handle_groups<C: Clock + Clone>(app: &App<C>, snapshot: &Snapshot) {
    let visible = visible_tasks(&snapshot.tasks, &ListQuery::default(), app.clock().now(), app.clock());
    let sections = group_tasks(visible, &snapshot.categories);
    if sections.is_empty() {
        println!("No tasks found");
    } else {
        print!("{}", view::render_sections(&sections));
    }
}

fn handle_calendar<C: Clock + Clone>(app: &App<C>, snapshot: &Snapshot, date: Option<&str>) -> Result<()> {
    let day = date
        .map(|raw| parse_date(raw).ok_or_else(|| anyhow!("Invalid date: {raw}, expected YYYY-MM-DD")))
        .transpose()?;
    let blocks: Vec<_> = time_blocks(&snapshot.tasks, app.clock())
        .into_iter()
        .filter(|block| day.is_none_or(|day| block.date() == day))
        .collect();
    if blocks.is_empty() {
        println!("No scheduled tasks");
    } else {
        print!("{}", view::render_time_blocks(&blocks));
    }
    Ok(())
}

async fn handle_mv<C: Clock + Clone>(
    app: &App<C>,
    snapshot: &Snapshot,
    task: &str,
    before: Option<&str>,
    into: Option<&str>,
    index: Option<usize>,
) -> Result<()> {
    let task = resolve_task(&snapshot.tasks, task)?;
    let target = match (before, into) {
        (Some(before), _) => DropTarget::Task(resolve_task(&snapshot.tasks, before)?.id),
        (None, Some(into)) => {
            let group = resolve_group(&snapshot.categories, into)?;
            index.map_or(DropTarget::Group(group), |index| DropTarget::Slot { group, index })
        }
        (None, None) => bail!("mv needs --before or --into"),
    };
    match app.coordinator.move_task(task.id, target).await? {
        ReorderOutcome::Unchanged => println!("already in place: {}", task.title),
        ReorderOutcome::Saved { updates, .. } => {
            println!("moved: {} ({} position(s) saved)", task.title, updates.len());
        }
    }
    Ok(())
}

async fn run_category<C: Clock + Clone>(
    command: CategoryCommand,
    app: &App<C>,
    categories: &[Category],
    tasks: &[Task],
) -> Result<()> {
    match command {
        CategoryCommand::Add { name, color } => {
            let category = app.service.create_category(&name, color).await?;
            println!("created category: {} ({})", category.name, view::short_id(&category.id));
        }
        CategoryCommand::Rename { category, name, color } => {
            if name.is_none() && color.is_none() {
                bail!("nothing to change; pass a new name or --color");
            }
            let id = resolve_category(categories, &category)?.id;
            let category = app.service.update_category(id, name.as_deref(), color).await?;
            println!("updated category: {}", category.name);
        }
        CategoryCommand::Rm { category } => {
            let category = resolve_category(categories, &category)?;
            let detached = app.service.delete_category(category.id).await?;
            println!(
                "deleted category: {} ({} task(s) now uncategorized)",
                category.name,
                detached.len()
            );
        }
        CategoryCommand::Ls => {
            if categories.is_empty() {
                println!("No categories found");
            } else {
                print!("{}", view::render_categories(categories, tasks));
            }
        }
    }
    Ok(())
}

/// Overlay the flags given on the command line onto `fields`.
fn apply_field_args(fields: &mut TaskFields, args: FieldArgs, categories: &[Category]) -> Result<()> {
    let FieldArgs {
        notes,
        category,
        due,
        at,
        start,
        end,
        repeat,
        weekday,
    } = args;

    if let Some(raw) = category {
        fields.category_id = if raw.trim().is_empty() {
            None
        } else {
            resolve_group(categories, &raw)?.category_id()
        };
    }
    // Blank values survive here and are cleared by normalization.
    for (slot, value) in [
        (&mut fields.notes, notes),
        (&mut fields.due_date, due),
        (&mut fields.due_time, at),
        (&mut fields.start_time, start),
        (&mut fields.end_time, end),
    ] {
        if value.is_some() {
            *slot = value;
        }
    }
    if let Some(raw) = repeat {
        let pattern = RecurrencePattern::from_str(&raw)?;
        fields.recurrence = Recurrence {
            pattern,
            weekly_day: fields.recurrence.weekly_day,
        };
    }
    if let Some(day) = weekday {
        if fields.recurrence.pattern != RecurrencePattern::Weekly {
            bail!("--weekday only applies to weekly tasks; add --repeat weekly");
        }
        fields.recurrence.weekly_day = Some(day);
    }
    Ok(())
}

/// Find a task by full id, or by a unique prefix or suffix of its id.
fn resolve_task<'a>(tasks: &'a [Task], raw: &str) -> Result<&'a Task> {
    let raw = raw.trim().to_ascii_lowercase();
    if let Ok(id) = TaskId::from_str(&raw) {
        return tasks
            .iter()
            .find(|task| task.id == id)
            .ok_or_else(|| anyhow!("Task not found: {raw}"));
    }
    unique_match(tasks, &raw, |task| task.id.to_string()).with_context(|| format!("Invalid task id: {raw}"))
}

/// Find a category by name (case-insensitive), full id, or unique id prefix or suffix.
fn resolve_category<'a>(categories: &'a [Category], raw: &str) -> Result<&'a Category> {
    let raw = raw.trim();
    if let Some(category) = categories
        .iter()
        .find(|category| category.name.eq_ignore_ascii_case(raw))
    {
        return Ok(category);
    }
    let lowered = raw.to_ascii_lowercase();
    if let Ok(id) = CategoryId::from_str(&lowered) {
        return categories
            .iter()
            .find(|category| category.id == id)
            .ok_or_else(|| anyhow!("Category not found: {raw}"));
    }
    unique_match(categories, &lowered, |category| category.id.to_string())
        .with_context(|| format!("Unknown category: {raw}"))
}

/// Group named on the command line; `uncategorized` names the group without a category.
fn resolve_group(categories: &[Category], raw: &str) -> Result<GroupKey> {
    if raw.trim().eq_ignore_ascii_case("uncategorized") {
        return Ok(GroupKey::Uncategorized);
    }
    resolve_category(categories, raw).map(|category| GroupKey::Category(category.id))
}

fn unique_match<'a, T>(items: &'a [T], needle: &str, id: impl Fn(&T) -> String) -> Result<&'a T> {
    if needle.is_empty() {
        bail!("empty id");
    }
    let mut found = items.iter().filter(|item| {
        let id = id(item);
        id.starts_with(needle) || id.ends_with(needle)
    });
    match (found.next(), found.next()) {
        (Some(item), None) => Ok(item),
        (None, _) => Err(anyhow!("no match")),
        (Some(_), Some(_)) => Err(anyhow!("ambiguous, more than one id matches")),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use tasklane_core::FixedClock;
    use tasklane_core::ordering::is_dense;
    use tempfile::tempdir;
    use time::macros::{datetime, offset};

    fn task(title: &str) -> Task {
        Task {
            id: TaskId::new(),
            user_id: UserId::default(),
            category_id: None,
            title: title.into(),
            notes: None,
            due_date: None,
            due_time: None,
            start_time: None,
            end_time: None,
            completed_at: None,
            sort_order: 0,
            created_at: datetime!(2024-05-01 8:00 UTC),
            recurrence: None,
            category: None,
        }
    }

    fn category(name: &str) -> Category {
        Category {
            id: CategoryId::new(),
            name: name.into(),
            color: None,
            created_at: datetime!(2024-05-01 8:00 UTC),
        }
    }

    #[test]
    fn tasks_resolve_by_full_id_prefix_and_suffix() -> Result<()> {
        let tasks = vec![task("a"), task("b")];
        let id = tasks[1].id.to_string();

        assert_eq!(resolve_task(&tasks, &id)?.title, "b");
        assert_eq!(resolve_task(&tasks, &view::short_id(&tasks[1].id))?.title, "b");
        assert_eq!(resolve_task(&tasks, &id.to_uppercase())?.title, "b");
        assert!(resolve_task(&tasks, "").is_err());
        assert!(resolve_task(&tasks, &TaskId::new().to_string()).is_err());
        // Version 7 ids created together share their leading timestamp digits.
        assert!(resolve_task(&tasks, &id[..4]).is_err());
        Ok(())
    }

    #[test]
    fn groups_resolve_by_name_or_uncategorized() -> Result<()> {
        let categories = vec![category("Work"), category("Home")];
        assert_eq!(
            resolve_group(&categories, "home")?,
            GroupKey::Category(categories[1].id)
        );
        assert_eq!(resolve_group(&categories, "Uncategorized")?, GroupKey::Uncategorized);
        assert_eq!(
            resolve_group(&categories, &categories[0].id.to_string())?,
            GroupKey::Category(categories[0].id)
        );
        assert!(resolve_group(&categories, "Garden").is_err());
        Ok(())
    }

    #[test]
    fn field_args_overlay_and_clear() -> Result<()> {
        let categories = vec![category("Work")];
        let mut fields = TaskFields {
            title: "plan".into(),
            notes: Some("draft".into()),
            ..TaskFields::default()
        };
        apply_field_args(
            &mut fields,
            FieldArgs {
                notes: Some(String::new()),
                category: Some("work".into()),
                start: Some("09:00".into()),
                repeat: Some("weekly".into()),
                weekday: Some(1),
                ..FieldArgs::default()
            },
            &categories,
        )?;
        assert_eq!(fields.category_id, Some(categories[0].id));
        assert_eq!(fields.start_time.as_deref(), Some("09:00"));
        assert_eq!(fields.recurrence, Recurrence::weekly(Some(1)));

        let normalized = fields.normalized(datetime!(2024-05-01 8:00 UTC).date());
        assert_eq!(normalized.notes, None);
        assert_eq!(normalized.due_date.as_deref(), Some("2024-05-01"));
        Ok(())
    }

    #[test]
    fn weekday_requires_weekly_repeat() {
        let mut fields = TaskFields::default();
        let err = apply_field_args(
            &mut fields,
            FieldArgs {
                weekday: Some(3),
                ..FieldArgs::default()
            },
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("--repeat weekly"));
    }

    #[tokio::test]
    async fn commands_persist_through_the_json_store() -> Result<()> {
        let dir = tempdir()?;
        let user = UserId::new();
        let mut config = AppConfig::default();
        config.session.user = Some(user);
        let clock = Arc::new(FixedClock::new(datetime!(2024-05-01 8:00 +2), offset!(+2)));
        let app = App::open(dir.path(), &config, Arc::clone(&clock))?;

        run(
            Command::Category {
                cmd: CategoryCommand::Add {
                    name: "Work".into(),
                    color: None,
                },
            },
            &app,
        )
        .await?;
        for title in ["a", "b", "c"] {
            run(
                Command::Add {
                    title: title.into(),
                    fields: FieldArgs::default(),
                },
                &app,
            )
            .await?;
        }
        let c = app.list().snapshot().tasks.iter().find(|t| t.title == "c").unwrap().id;
        run(
            Command::Mv {
                task: view::short_id(&c),
                before: None,
                into: Some("work".into()),
                index: None,
            },
            &app,
        )
        .await?;
        let a = app.list().snapshot().tasks.iter().find(|t| t.title == "a").unwrap().id;
        run(Command::Done { task: a.to_string() }, &app).await?;

        let reopened = JsonStore::open(config.store_path(dir.path()))?.list_tasks(user)?;
        let work = reopened.iter().find(|t| t.id == c).unwrap();
        assert_eq!(work.category.as_ref().map(|c| c.name.as_str()), Some("Work"));
        assert!(is_dense(&reopened, GroupKey::Uncategorized));
        assert!(reopened.iter().find(|t| t.id == a).unwrap().is_completed());

        // One-off completed tasks are purged a day later.
        clock.advance(time::Duration::hours(25));
        run(Command::Maintain, &app).await?;
        let remaining = JsonStore::open(config.store_path(dir.path()))?.list_tasks(user)?;
        assert_eq!(remaining.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn signed_out_commands_point_at_init() -> Result<()> {
        let dir = tempdir()?;
        let clock = Arc::new(FixedClock::new(datetime!(2024-05-01 8:00 UTC), offset!(UTC)));
        let app = App::open(dir.path(), &AppConfig::default(), clock)?;
        let err = run(Command::Groups, &app).await.unwrap_err();
        assert!(err.to_string().contains("tasklane init"));
        Ok(())
    }

    #[test]
    fn init_writes_a_signed_in_config_once() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("tasklane.toml");
        let user = UserId::new();
        init(&path, Some(&user.to_string()), Some("+09:00".into()), false)?;

        let config = AppConfig::from_file(&path)?;
        assert_eq!(config.session.user, Some(user));
        assert_eq!(config.fixed_offset()?, Some(offset!(+9)));
        assert!(init(&path, None, None, false).is_err());
        init(&path, None, None, true)?;
        assert_ne!(AppConfig::from_file(&path)?.session.user, Some(user));
        Ok(())
    }
}

use crate::{emit_success, output, AttachCommand, Context, OutputMode, RecordsCommand, RefsCommand, TypesCommand};
use postrefs::admin::{AdminAction, ManageButton, SettingsScreen};
use postrefs::config::{self, PostrefsConfig};
use postrefs::registry::DefinitionFilter;
use postrefs::relation::META_PREFIX;
use postrefs::render::{shortcode, ListRenderer, NoHooks, Permalinks, WidgetInstance};
use postrefs::server::{self, AppState};
use postrefs::ui::{self, Icons};
use postrefs::{
    AttachmentStore, ConfigStore, ContentType, DefinitionForm, PublishStatus, Record, RelationKey, RelationRegistry,
    ReverseIndex, SetOutcome, SqliteStore, UpsertOutcome,
};

fn open_store(ctx: &Context) -> anyhow::Result<SqliteStore> {
    if !ctx.database_path.exists() {
        anyhow::bail!(
            "no database at {} (run `postrefs init` first)",
            ctx.database_path.display()
        );
    }
    Ok(SqliteStore::open(&ctx.database_path)?)
}

pub fn run_init(
    output_mode: OutputMode,
    ctx: &Context,
    force: bool,
    site_url: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let database = ctx
        .database_path
        .strip_prefix(&ctx.base_dir)
        .unwrap_or(&ctx.database_path)
        .to_string_lossy()
        .to_string();
    let new_config = PostrefsConfig {
        database: Some(database),
        site_url: Some(site_url.unwrap_or_else(|| config::DEFAULT_SITE_URL.to_string())),
        port: Some(port.unwrap_or(config::DEFAULT_PORT)),
        nonce_secret: Some(config::generate_secret()),
    };
    config::write_config(&ctx.config_path, &new_config, force)?;
    config::ensure_db_dir(&ctx.database_path)?;
    config::ensure_gitignore(&ctx.base_dir)?;

    let store = SqliteStore::open(&ctx.database_path)?;
    let installed = ConfigStore::new(&store).install()?;

    if output_mode.is_human() {
        ui::header("Initialized postrefs");
        ui::success(&format!("Wrote {}", ctx.config_path.display()));
        ui::status(Icons::DATABASE, "Database", &ctx.database_path.display().to_string());
        if installed {
            ui::info("Settings", "initialized with defaults");
        } else {
            ui::info("Settings", "existing settings kept");
        }
    } else {
        emit_success(
            output_mode,
            "init",
            serde_json::json!({
                "config": ctx.config_path.display().to_string(),
                "database": ctx.database_path.display().to_string(),
                "settings_installed": installed,
            }),
        )?;
    }
    Ok(())
}

pub fn run_types(output_mode: OutputMode, ctx: &Context, command: TypesCommand) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    match command {
        TypesCommand::Add { name, label, hidden } => {
            let label = label.unwrap_or_else(|| name.clone());
            let mut content_type = ContentType::new(name, label);
            if hidden {
                content_type = content_type.hidden();
            }
            store.register_type(&content_type)?;
            if output_mode.is_human() {
                ui::success(&format!("Registered content type '{}'", content_type.name));
            } else {
                emit_success(output_mode, "types.add", serde_json::to_value(&content_type)?)?;
            }
        }
        TypesCommand::List { all } => {
            let types = store.list_types(!all)?;
            if output_mode.is_human() {
                if types.is_empty() {
                    ui::warn("No content types registered.");
                }
                for t in &types {
                    let marker = if t.show_ui { String::new() } else { ui::muted(" (hidden)") };
                    println!("- {} {}{}", t.name, ui::dim(&format!("[{}]", t.label)), marker);
                }
            } else {
                emit_success(output_mode, "types.list", serde_json::to_value(&types)?)?;
            }
        }
    }
    Ok(())
}

pub fn run_records(output_mode: OutputMode, ctx: &Context, command: RecordsCommand) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    match command {
        RecordsCommand::Add { record_type, title, status, body } => {
            if !store.type_exists(&record_type)? {
                anyhow::bail!("content type '{}' is not registered", record_type);
            }
            let mut record = Record::draft(record_type, title).with_body(body);
            record.status = status.parse::<PublishStatus>()?;
            record.id = store.insert_record(&record)?;
            if output_mode.is_human() {
                ui::success(&format!("Created record {} ({}, {})", record.id, record.record_type, record.status));
            } else {
                emit_success(output_mode, "records.add", serde_json::to_value(&record)?)?;
            }
        }
        RecordsCommand::List { record_type } => {
            let records = store.list_records(record_type.as_deref())?;
            if output_mode.is_human() {
                if records.is_empty() {
                    ui::warn("No records found.");
                } else {
                    println!("{}", ui::records_table(&records));
                }
            } else {
                emit_success(output_mode, "records.list", serde_json::to_value(&records)?)?;
            }
        }
        RecordsCommand::Status { id, status } => {
            let status: PublishStatus = status.parse()?;
            if !store.set_status(id, status)? {
                return Err(postrefs::Error::RecordNotFound(id).into());
            }
            if output_mode.is_human() {
                ui::success(&format!("Record {} is now {}", id, status));
            } else {
                emit_success(output_mode, "records.status", serde_json::json!({ "id": id, "status": status }))?;
            }
        }
        RecordsCommand::Delete { id } => {
            if !store.delete_record(id)? {
                return Err(postrefs::Error::RecordNotFound(id).into());
            }
            if output_mode.is_human() {
                println!("{} Deleted record {}", Icons::DEL, id);
            } else {
                emit_success(output_mode, "records.delete", serde_json::json!({ "id": id }))?;
            }
        }
    }
    Ok(())
}

pub fn run_refs(output_mode: OutputMode, ctx: &Context, command: RefsCommand) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    let registry = RelationRegistry::open(&store);
    match command {
        RefsCommand::List { source_type, key } => {
            let mut filter = DefinitionFilter::all();
            if let Some(source_type) = source_type.as_deref() {
                filter = filter.source_type(source_type);
            }
            if let Some(key) = key.as_deref() {
                filter = filter.key(key);
            }
            let defs = registry.list(filter)?;
            if output_mode.is_human() {
                if defs.is_empty() {
                    ui::warn("No references defined.");
                } else {
                    println!("{}", ui::definitions_table(&defs));
                }
            } else {
                emit_success(output_mode, "refs.list", serde_json::to_value(&defs)?)?;
            }
        }
        RefsCommand::Upsert { source_type, key, targets, title } => {
            let outcome = registry.upsert(&source_type, &key, targets, &title)?;
            if !output_mode.is_human() {
                return emit_success(output_mode, "refs.upsert", serde_json::to_value(&outcome)?);
            }
            match outcome {
                UpsertOutcome::Created(id) => ui::success(&format!("Created reference #{} ({}/{})", id, source_type, key)),
                UpsertOutcome::Updated(id) => ui::success(&format!("Updated reference #{} ({}/{})", id, source_type, key)),
                UpsertOutcome::Rejected(reason) => anyhow::bail!("{}", reason),
            }
        }
        RefsCommand::Remove { source_type, key } => {
            let removed = registry.remove(&source_type, &key)?;
            if output_mode.is_human() {
                if removed == 0 {
                    ui::warn(&format!("No reference '{}' for '{}'", key, source_type));
                } else {
                    ui::success(&format!("Removed {} definition(s); attached data is kept", removed));
                }
            } else {
                emit_success(output_mode, "refs.remove", serde_json::json!({ "removed": removed }))?;
            }
        }
        RefsCommand::Delete { id } => {
            let action = AdminAction::Manage {
                index: id,
                button: ManageButton::Delete,
                form: DefinitionForm::default(),
            };
            let notice = SettingsScreen::new(registry).handle(&action)?;
            if output_mode.is_human() {
                ui::notice(&notice);
            } else {
                emit_success(output_mode, "refs.delete", serde_json::to_value(&notice)?)?;
            }
        }
    }
    Ok(())
}

pub fn run_attach(output_mode: OutputMode, ctx: &Context, command: AttachCommand) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    let attachments = AttachmentStore::open(&store);
    match command {
        AttachCommand::Set { record, key, targets } => {
            let outcome = attachments.set(record, &key, targets)?;
            if !output_mode.is_human() {
                return emit_success(output_mode, "attach.set", serde_json::to_value(outcome)?);
            }
            match outcome {
                SetOutcome::Stored { count } => ui::success(&format!("Stored {} target(s) under {}{}", count, META_PREFIX, key)),
                SetOutcome::RecordMissing => return Err(postrefs::Error::RecordNotFound(record).into()),
                SetOutcome::NoSuchRelation => anyhow::bail!("no reference '{}' applies to record {}", key, record),
            }
        }
        AttachCommand::Get { record, key } => {
            let Some(all) = attachments.get_all(record)? else {
                return Err(postrefs::Error::RecordNotFound(record).into());
            };
            let all = match key.as_deref() {
                Some(key) => {
                    RelationKey::new(key)?;
                    all.only(key)
                }
                None => all,
            };
            if output_mode.is_human() {
                if all.is_empty() {
                    ui::warn(&format!("No references apply to record {}", record));
                }
                for (key, ids) in all.iter() {
                    ui::attached(key.as_str(), ids);
                }
            } else {
                emit_success(output_mode, "attach.get", serde_json::to_value(&all)?)?;
            }
        }
    }
    Ok(())
}

pub fn run_find(
    output_mode: OutputMode,
    ctx: &Context,
    target: i64,
    types: &[String],
    only_published: bool,
) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    let lookup = ReverseIndex::new(&store).find(target, types, only_published)?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "find", serde_json::to_value(&lookup)?);
    }

    if !output::is_quiet() {
        println!("{} Records referencing {}", Icons::SEARCH, target);
    }
    if lookup.is_empty() {
        ui::warn("No referrers found.");
    } else {
        println!("{}", ui::referrers_table(&lookup.referrers));
    }
    if lookup.skipped_malformed > 0 {
        ui::warn(&format!("{} unreadable attachment row(s) skipped", lookup.skipped_malformed));
    }
    Ok(())
}

pub fn run_render(ctx: &Context, record: i64, key: Option<&str>, body: bool) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    let renderer = ListRenderer::new(&store, Permalinks::new(ctx.config.site_url()), &NoHooks);
    let html = if body {
        let Some(found) = store.get_record(record)? else {
            return Err(postrefs::Error::RecordNotFound(record).into());
        };
        shortcode::expand(&renderer, &found.body, Some(found.id))?
    } else {
        renderer.render(record, key)?
    };
    println!("{}", html);
    Ok(())
}

pub fn run_serve(ctx: &Context, port: Option<u16>, widget: Option<String>, widget_title: String) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    ConfigStore::new(&store).install()?;
    drop(store);

    let widget = match widget {
        Some(key) => {
            let key = RelationKey::new(key)?;
            Some(WidgetInstance::update(&WidgetInstance {
                title: widget_title,
                message: String::new(),
                ref_field: key.meta_key(),
            }))
        }
        None => None,
    };
    let state = AppState {
        database_path: ctx.database_path.clone(),
        site_url: ctx.config.site_url().to_string(),
        nonce_secret: ctx.config.nonce_secret(&ctx.database_path),
        widget,
    };
    let port = port.unwrap_or_else(|| ctx.config.port());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::start_server(port, state))
}

pub fn run_uninstall(output_mode: OutputMode, ctx: &Context) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    ConfigStore::new(&store).uninstall()?;
    if output_mode.is_human() {
        ui::info("Uninstall", "settings and attachment data are kept");
    } else {
        emit_success(output_mode, "uninstall", serde_json::json!({ "settings_kept": true }))?;
    }
    Ok(())
}

pub fn run_stats(output_mode: OutputMode, ctx: &Context) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    let stats = store.stats(META_PREFIX)?;
    let definitions = RelationRegistry::open(&store).list(DefinitionFilter::all())?.len();

    if !output_mode.is_human() {
        let mut data = serde_json::to_value(&stats)?;
        data["definitions"] = serde_json::json!(definitions);
        return emit_success(output_mode, "stats", data);
    }

    println!("{} Postrefs Statistics ({})", Icons::STATS, ctx.database_path.display());
    let rows = [
        ("Content types", stats.content_types.to_string()),
        ("Records", stats.records.to_string()),
        ("Reference definitions", definitions.to_string()),
        ("Attachment rows", stats.attachment_rows.to_string()),
        ("Meta rows", stats.meta_rows.to_string()),
        ("Options", stats.options.to_string()),
    ];
    let borrowed: Vec<(&str, &str)> = rows.iter().map(|(l, v)| (*l, v.as_str())).collect();
    println!("{}", ui::stats_table(&borrowed));
    Ok(())
}

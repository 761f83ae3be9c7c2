// ==========================================
// 签证客户管理 - 命令行入口
// ==========================================

mod cli;

use clap::Parser;
use visa_client_import::api::{ApiError, ApiResult, ClientApi, ImportApi, ImportApiResponse};
use visa_client_import::db::default_db_path;
use visa_client_import::domain::client::{ClientFilter, ClientRecord, NewClient, Page};
use visa_client_import::logging;

use crate::cli::{AddArgs, Cli, Command, ImportArgs, ListArgs};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.json_logs {
        logging::init_json();
    } else {
        logging::init();
    }

    let db_path = cli
        .db
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(default_db_path);
    tracing::debug!(db_path = %db_path, version = visa_client_import::VERSION, "使用数据库");

    let exit_code = match run(cli.command, &db_path).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(command: Command, db_path: &str) -> ApiResult<i32> {
    match command {
        Command::Import(args) => run_import(args, db_path).await,
        Command::List(args) => run_list(args, db_path),
        Command::Search { term, limit } => {
            let api = ClientApi::new(db_path)?;
            let clients = api.search_clients(&term, Page { limit, offset: 0 })?;
            print_clients(&clients);
            Ok(0)
        }
        Command::Show { client_id } => {
            let api = ClientApi::new(db_path)?;
            print_json(&api.get_client(&client_id)?)?;
            Ok(0)
        }
        Command::Add(args) => run_add(args, db_path).await,
        Command::SetStatus { client_id, status } => {
            let api = ClientApi::new(db_path)?;
            let status = api.update_visa_status(&client_id, &status)?;
            println!("{} → {} ({})", client_id.trim(), status, status.label());
            Ok(0)
        }
        Command::SetNotes { client_id, notes } => {
            let api = ClientApi::new(db_path)?;
            api.update_notes(&client_id, notes.as_deref())?;
            Ok(0)
        }
        Command::Delete { client_id } => {
            let api = ClientApi::new(db_path)?;
            api.delete_client(&client_id)?;
            println!("已删除 {}", client_id.trim());
            Ok(0)
        }
        Command::DeleteAll { yes } => {
            if !yes {
                return Err(ApiError::InvalidInput(
                    "删除全部客户需要 --yes 确认".to_string(),
                ));
            }
            let api = ClientApi::new(db_path)?;
            let deleted = api.delete_all_clients()?;
            println!("已删除 {} 位客户", deleted);
            Ok(0)
        }
        Command::Stats => {
            let api = ClientApi::new(db_path)?;
            print_json(&api.statistics()?)?;
            Ok(0)
        }
        Command::MigrateIds { dry_run } => {
            let api = ClientApi::new(db_path)?;
            let plan = api.migrate_ids(dry_run).await?;
            for item in &plan {
                println!("{} → {}", item.old_client_id, item.new_client_id);
            }
            println!(
                "{} {} 个编号",
                if dry_run { "计划迁移" } else { "已迁移" },
                plan.len()
            );
            Ok(0)
        }
        Command::History { limit } => {
            let api = ClientApi::new(db_path)?;
            for batch in api.import_history(limit)? {
                println!(
                    "{}  {}  {}  total={} imported={} duplicates={} enriched={} errors={}",
                    batch.imported_at.format("%Y-%m-%d %H:%M:%S"),
                    batch.batch_id,
                    batch.file_name.as_deref().unwrap_or("-"),
                    batch.total_rows,
                    batch.imported,
                    batch.duplicates,
                    batch.enriched,
                    batch.errors
                );
            }
            Ok(0)
        }
    }
}

async fn run_import(args: ImportArgs, db_path: &str) -> ApiResult<i32> {
    let api = ImportApi::new(db_path.to_string());
    let policy = args.policy.map(Into::into);
    let files: Vec<String> = args
        .files
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();

    let results = if files.len() == 1 {
        vec![api.import_file(&files[0], policy).await.map_err(|e| e.to_string())]
    } else {
        api.batch_import(&files, policy).await?
    };

    let mut exit_code = 0;
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(response) => {
                if args.json {
                    print_json(&response)?;
                } else {
                    print_import_summary(file, &response);
                }
                if response.errors > 0 {
                    exit_code = 2;
                }
            }
            Err(error) => {
                eprintln!("error: {}: {}", file, error);
                exit_code = 1;
            }
        }
    }
    Ok(exit_code)
}

fn run_list(args: ListArgs, db_path: &str) -> ApiResult<i32> {
    let api = ClientApi::new(db_path)?;
    let filter = ClientFilter {
        visa_status: args.status.map(Into::into),
        nationality: args.nationality,
        responsible_employee: args.employee,
        search: None,
    };
    let response = api.list_clients(
        &filter,
        Page {
            limit: args.limit,
            offset: args.offset,
        },
    )?;
    print_clients(&response.clients);
    println!(
        "共 {} 位客户（显示 {}-{}）",
        response.total,
        response.offset + 1,
        response.offset + response.clients.len() as i64
    );
    Ok(0)
}

async fn run_add(args: AddArgs, db_path: &str) -> ApiResult<i32> {
    let api = ClientApi::new(db_path)?;
    let record = api
        .create_client(NewClient {
            full_name: args.name,
            contact_number: args.phone,
            nationality: args.nationality,
            passport_number: args.passport,
            application_date: args.date,
            visa_status: args.status,
            responsible_employee: args.employee,
            notes: args.notes,
            ..Default::default()
        })
        .await?;
    println!("已创建 {}", record.client_id);
    Ok(0)
}

fn print_import_summary(file: &str, response: &ImportApiResponse) {
    println!("{}: {}", file, response.message);
    if !response.new_client_ids.is_empty() {
        println!("  新编号: {}", response.new_client_ids.join(", "));
    }
    for error in &response.row_errors {
        println!("  第 {} 行 [{}]: {}", error.row_number, error.stage, error.reason);
    }
    if !response.diagnostics.is_empty() {
        println!("  诊断 {} 条（--json 查看详情）", response.diagnostics.len());
    }
}

fn print_clients(clients: &[ClientRecord]) {
    for c in clients {
        println!(
            "{:<8} {:<10} {:<22} {:<30} {}",
            c.client_id,
            c.application_date_normalized.as_dated().unwrap_or("-"),
            c.visa_status.to_db_str(),
            c.full_name,
            c.contact_number.as_deref().unwrap_or("-")
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> ApiResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::InternalError(format!("JSON 序列化失败: {}", e)))?;
    println!("{}", text);
    Ok(())
}

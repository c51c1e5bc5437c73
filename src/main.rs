// ==========================================
// 客户账单监控系统 - 命令行入口
// ==========================================
// 用法:
//   monitor-pelanggan init-db
//   monitor-pelanggan import-billing <file> <user_id>
//   monitor-pelanggan import-contracts <file> <user_id>
//   monitor-pelanggan preview <file> <user_id>
//   monitor-pelanggan rollup <user_id>
//   monitor-pelanggan totals <user_id> [am_id]
//   monitor-pelanggan documents <user_id>
//
// 输出为 JSON（stdout），日志写 stderr
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use monitor_pelanggan::app::{get_default_db_path, AppState};
use monitor_pelanggan::domain::Principal;
use monitor_pelanggan::{i18n, logging};
use serde::Serialize;
use std::path::Path;

const USAGE: &str = "usage: monitor-pelanggan <init-db | import-billing <file> <user_id> | \
import-contracts <file> <user_id> | preview <file> <user_id> | rollup <user_id> | \
totals <user_id> [am_id] | documents <user_id>>";

fn main() -> Result<()> {
    logging::init();
    i18n::init_locale();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).ok_or_else(|| anyhow!(USAGE))?;

    let db_path = get_default_db_path();
    tracing::info!(
        app = monitor_pelanggan::APP_NAME,
        version = monitor_pelanggan::VERSION,
        db_path = %db_path,
        command,
        "启动"
    );
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    match command {
        "init-db" => {
            let snapshot = state
                .config_manager
                .snapshot()
                .map_err(|e| anyhow!("failed to read config: {}", e))?;
            let config: serde_json::Value = serde_json::from_str(&snapshot)?;
            print_json(&serde_json::json!({ "db_path": state.db_path, "config": config }))
        }
        "import-billing" => {
            let (file_name, bytes) = read_file(arg(&args, 1, "file")?)?;
            let principal = principal(&state, arg(&args, 2, "user_id")?)?;
            let report = state
                .import_api
                .import_billing(&principal, &file_name, &bytes)
                .map_err(api_error)?;
            print_json(&report)
        }
        "import-contracts" => {
            let (file_name, bytes) = read_file(arg(&args, 1, "file")?)?;
            let principal = principal(&state, arg(&args, 2, "user_id")?)?;
            let report = state
                .import_api
                .import_contracts(&principal, &file_name, &bytes)
                .map_err(api_error)?;
            print_json(&report)
        }
        "preview" => {
            let (file_name, bytes) = read_file(arg(&args, 1, "file")?)?;
            let principal = principal(&state, arg(&args, 2, "user_id")?)?;
            let preview = state
                .import_api
                .preview_upload(&principal, &file_name, &bytes)
                .map_err(api_error)?;
            print_json(&preview)
        }
        "rollup" => {
            let principal = principal(&state, arg(&args, 1, "user_id")?)?;
            let rollup = state.billing_api.manager_rollup(&principal).map_err(api_error)?;
            print_json(&rollup)
        }
        "totals" => {
            let principal = principal(&state, arg(&args, 1, "user_id")?)?;
            let am_filter = match args.get(2) {
                Some(raw) => Some(parse_id(raw, "am_id")?),
                None => None,
            };
            let totals = state
                .billing_api
                .payment_totals(&principal, am_filter)
                .map_err(api_error)?;
            print_json(&totals)
        }
        "documents" => {
            let principal = principal(&state, arg(&args, 1, "user_id")?)?;
            let documents = state
                .contract_api
                .list_documents(&principal)
                .map_err(api_error)?;
            print_json(&serde_json::json!({ "total": documents.len(), "documents": documents }))
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing <{}>\n{}", name, USAGE))
}

fn parse_id(raw: &str, name: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .with_context(|| format!("<{}> must be an integer, got '{}'", name, raw))
}

/// 按用户表查找调用主体（替代外部身份校验）
fn principal(state: &AppState, raw_user_id: &str) -> Result<Principal> {
    let user_id = parse_id(raw_user_id, "user_id")?;
    let user = state
        .user_repo
        .find_by_id(user_id)
        .with_context(|| format!("failed to look up user {}", user_id))?
        .filter(|u| u.active)
        .ok_or_else(|| anyhow!("user {} does not exist or is inactive", user_id))?;
    Ok(Principal::from(&user))
}

fn read_file(path: &str) -> Result<(String, Vec<u8>)> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read '{}'", path))?;
    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());
    Ok((file_name, bytes))
}

fn api_error(err: monitor_pelanggan::ApiError) -> anyhow::Error {
    anyhow!(err.user_message())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ==========================================
// FinView 导入引擎 - 命令行入口
// ==========================================
// 用法:
//   finview [--db PATH] [--log-json] <命令> [参数...]
//
// 命令:
//   specs [DIR]                                    列出可用映射规范
//   check SPEC                                     加载并校验单个规范文件
//   accounts                                       列出账户及余额
//   create-account NAME CURRENCY [AMOUNT] [DATE]   建户（含期初余额交易）
//   assign ACCOUNT_ID SPEC_REL_PATH                绑定映射规范（空串解除）
//   import ACCOUNT_ID FILE [--dry-run]             导入对账单
//   transactions ACCOUNT_ID                        列出账户交易（日期倒序）
// ==========================================

use anyhow::{bail, Context};
use finview_import::app::{get_default_db_path, AppState};
use finview_import::importer::ImportOptions;
use finview_import::logging;
use std::path::Path;

const USAGE: &str = "用法: finview [--db PATH] [--log-json] <specs [DIR] | check SPEC | accounts | \
create-account NAME CURRENCY [AMOUNT] [DATE] | assign ACCOUNT_ID SPEC_REL_PATH | \
import ACCOUNT_ID FILE [--dry-run] | transactions ACCOUNT_ID>";

fn main() {
    if let Err(e) = run() {
        eprintln!("错误: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let mut db_path: Option<String> = None;
    let mut log_json = false;
    let mut dry_run = false;
    let mut positional: Vec<String> = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => db_path = Some(args.next().context("--db 需要参数")?),
            "--log-json" => log_json = true,
            "--dry-run" => dry_run = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ => positional.push(arg),
        }
    }

    if log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    let (command, rest) = positional.split_first().context(USAGE)?;
    let db_path = db_path.unwrap_or_else(get_default_db_path);
    let state = AppState::new(db_path.clone())
        .with_context(|| format!("无法打开数据库: {}", db_path))?;

    match command.as_str() {
        "specs" => {
            let entries = match rest.first() {
                Some(dir) => state.import_api.list_specifications_in(Path::new(dir))?,
                None => state.import_api.list_specifications()?,
            };
            for entry in entries {
                println!("{}\t{}", entry.reference, entry.label);
            }
        }
        "check" => {
            let path = rest.first().context("check 需要规范文件路径")?;
            let spec = state.import_api.load_specification(Path::new(path))?;
            println!("OK: {} (version {})", spec.name, spec.version);
            println!(
                "  delimiter={:?} skip_rows={}",
                spec.parser.delimiter, spec.parser.skip_rows
            );
            for (field, expression) in spec.mappings.iter() {
                println!("  {} = {}", field, expression);
            }
        }
        "accounts" => {
            for item in state.account_api.list_accounts()? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    item.account.id,
                    item.account.name,
                    item.account.currency,
                    item.balance,
                    item.account.mapping_spec.as_deref().unwrap_or("-")
                );
            }
        }
        "create-account" => {
            let name = rest.first().context("create-account 需要账户名")?;
            let currency = rest.get(1).context("create-account 需要币种")?;
            let account = state.account_api.create_account_from_input(
                name,
                currency,
                rest.get(2).map(String::as_str),
                rest.get(3).map(String::as_str),
            )?;
            println!("已创建账户: {} (id={})", account.name, account.id);
        }
        "assign" => {
            let account_id = parse_account_id(rest.first())?;
            let reference = rest.get(1).map(String::as_str).unwrap_or("");
            let account = state.account_api.assign_mapping(account_id, reference)?;
            println!(
                "账户 {} 映射规范: {}",
                account.name,
                account.mapping_spec.as_deref().unwrap_or("(手工录入)")
            );
        }
        "import" => {
            let account_id = parse_account_id(rest.first())?;
            let file = rest.get(1).context("import 需要文件路径")?;
            let options = ImportOptions {
                dry_run,
                ..ImportOptions::default()
            };
            let report = state.import_api.import_for_account_with_options(
                account_id,
                Path::new(file),
                &options,
            )?;
            if report.warning {
                eprintln!("警告: {}", report.message);
            } else {
                println!("{}", report.message);
            }
        }
        "transactions" => {
            let account_id = parse_account_id(rest.first())?;
            for tx in state.account_api.list_transactions(account_id)? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    tx.date, tx.description, tx.amount_original, tx.currency_original,
                    tx.amount_in_account_currency
                );
            }
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }

    Ok(())
}

fn parse_account_id(arg: Option<&String>) -> anyhow::Result<i64> {
    let raw = arg.context("需要账户ID")?;
    raw.trim()
        .parse::<i64>()
        .with_context(|| format!("无效的账户ID: {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account_id() {
        assert_eq!(parse_account_id(Some(&" 7 ".to_string())).unwrap(), 7);

        let err = parse_account_id(Some(&"seven".to_string())).unwrap_err();
        assert!(format!("{:#}", err).contains("无效的账户ID: seven"));
        assert!(parse_account_id(None).is_err());
    }
}

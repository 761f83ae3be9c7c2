// ==========================================
// 签证客户管理 - 命令行参数定义
// ==========================================

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use visa_client_import::domain::types::{DuplicatePolicy, VisaStatus};

#[derive(Parser)]
#[command(
    name = "visa-client-import",
    version,
    about = "签证客户管理 - 表格导入与客户库对账",
    long_about = "将客户表格（.xlsx/.xls/.xlsm/.ods/.csv）导入客户库。\n\n\
                  每次运行重新发现列映射，识别重复客户，并为新客户分配连续编号。"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// 数据库文件路径（默认读取 VISA_CLIENT_IMPORT_DB_PATH，其次为用户数据目录）
    #[arg(long = "db", value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// 以 JSON 格式输出日志
    #[arg(long = "json-logs", global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// 导入一个或多个客户表格
    Import(ImportArgs),

    /// 按时间顺序列出客户
    List(ListArgs),

    /// 按姓名、编号、电话或护照号检索
    Search {
        #[arg(value_name = "TERM")]
        term: String,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// 查看单个客户
    Show {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,
    },

    /// 人工录入新客户
    Add(AddArgs),

    /// 修改签证状态（状态码或阿拉伯语标签）
    SetStatus {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,
        #[arg(value_name = "STATUS")]
        status: String,
    },

    /// 修改备注（不带内容时清空）
    SetNotes {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,
        #[arg(value_name = "NOTES")]
        notes: Option<String>,
    },

    /// 删除客户（编号不再复用）
    Delete {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,
    },

    /// 删除全部客户
    DeleteAll {
        /// 确认删除
        #[arg(long)]
        yes: bool,
    },

    /// 客户统计
    Stats,

    /// 将非规范编号重新编号
    MigrateIds {
        /// 只显示计划，不写入
        #[arg(long = "dry-run")]
        dry_run: bool,
    },

    /// 导入历史
    History {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Args)]
pub struct ImportArgs {
    /// 表格文件
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// 重复客户处理策略（默认读取配置）
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// 以 JSON 输出完整结果
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,

    #[arg(long)]
    pub nationality: Option<String>,

    #[arg(long)]
    pub employee: Option<String>,

    #[arg(long, default_value_t = 50)]
    pub limit: i64,

    #[arg(long, default_value_t = 0)]
    pub offset: i64,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub nationality: Option<String>,
    #[arg(long)]
    pub passport: Option<String>,
    /// 申请日期（DD/MM/YYYY 或 YYYY-MM-DD）
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub employee: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Skip,
    Enrich,
}

impl From<PolicyArg> for DuplicatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Skip => DuplicatePolicy::Skip,
            PolicyArg::Enrich => DuplicatePolicy::Enrich,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Submitted,
    SubmittedToEmbassy,
    Approved,
    Rejected,
    Completed,
}

impl From<StatusArg> for VisaStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Submitted => VisaStatus::Submitted,
            StatusArg::SubmittedToEmbassy => VisaStatus::SubmittedToEmbassy,
            StatusArg::Approved => VisaStatus::Approved,
            StatusArg::Rejected => VisaStatus::Rejected,
            StatusArg::Completed => VisaStatus::Completed,
        }
    }
}

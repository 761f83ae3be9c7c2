// ==========================================
// 签证客户管理 - 客户编号分配器
// ==========================================
// 格式: CLI + 十进制序号，至少 3 位补零，超出宽度时自然加宽（CLI999 → CLI1000）
// 规则:
// - 运行开始时从存储中的最大合法序号播种，运行内计数器只增不减
// - 前缀匹配但序号非法的编号记录告警，不参与最大值计算
// - 分配前防御性检查编号是否已存在，冲突时重新计算最大值并有限次重试
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::repository::client_store::ClientIdSource;
use tracing::{debug, warn};

/// 客户编号前缀
pub const CLIENT_ID_PREFIX: &str = "CLI";

/// 默认最小序号宽度
pub const DEFAULT_MIN_WIDTH: usize = 3;

/// 默认冲突重试次数
pub const DEFAULT_COLLISION_MAX_RETRIES: u32 = 3;

/// 解析规范编号的数字序号
///
/// # 返回
/// - Some(n): 前缀匹配且后缀为纯数字
/// - None: 前缀不匹配、后缀为空、含非数字字符或超出 u64
pub fn parse_canonical_suffix(client_id: &str, prefix: &str) -> Option<u64> {
    let suffix = client_id.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse::<u64>().ok()
}

/// 是否为规范编号
pub fn is_canonical_client_id(client_id: &str) -> bool {
    parse_canonical_suffix(client_id, CLIENT_ID_PREFIX).is_some()
}

/// 格式化编号
pub fn format_client_id(prefix: &str, value: u64, width: usize) -> String {
    format!("{}{:0width$}", prefix, value, width = width)
}

// ==========================================
// IdAllocator
// ==========================================
#[derive(Debug, Clone)]
pub struct IdAllocator {
    prefix: String,
    min_width: usize,
    width: usize,
    last_value: u64,
    malformed: Vec<String>,
}

impl IdAllocator {
    /// 从编号列表播种
    ///
    /// # 参数
    /// - ids: 存储中所有以前缀开头的编号
    /// - min_width: 最小序号宽度
    pub fn seed<S: AsRef<str>>(ids: &[S], prefix: &str, min_width: usize) -> Self {
        let min_width = min_width.max(1);
        let mut allocator = Self {
            prefix: prefix.to_string(),
            min_width,
            width: min_width,
            last_value: 0,
            malformed: Vec::new(),
        };
        allocator.absorb(ids);
        debug!(
            prefix = %allocator.prefix,
            max_value = allocator.last_value,
            width = allocator.width,
            "编号分配器播种完成"
        );
        allocator
    }

    /// 从存储播种（读取前缀匹配的全部编号）
    pub fn seed_from_store<S: ClientIdSource + ?Sized>(
        store: &S,
        prefix: &str,
        min_width: usize,
    ) -> ImportResult<Self> {
        let ids = store.list_prefixed_ids(prefix)?;
        Ok(Self::seed(&ids, prefix, min_width))
    }

    fn absorb<S: AsRef<str>>(&mut self, ids: &[S]) {
        for id in ids {
            let id = id.as_ref();
            if !id.starts_with(&self.prefix) {
                continue;
            }
            match parse_canonical_suffix(id, &self.prefix) {
                Some(value) => {
                    // 宽度只取决于持有最大序号的编号，与列表顺序无关
                    let digits = id.len() - self.prefix.len();
                    if value > self.last_value {
                        self.last_value = value;
                        self.width = self.min_width.max(digits);
                    } else if value == self.last_value {
                        self.width = self.width.max(digits);
                    }
                }
                None => {
                    if !self.malformed.iter().any(|m| m == id) {
                        warn!(client_id = %id, "客户编号序号非法，已忽略");
                        self.malformed.push(id.to_string());
                    }
                }
            }
        }
    }

    /// 当前已知的最大序号（含本次运行已分配）
    pub fn current_max(&self) -> u64 {
        self.last_value
    }

    /// 序号宽度
    pub fn width(&self) -> usize {
        self.width
    }

    /// 播种时发现的非法编号
    pub fn malformed_ids(&self) -> &[String] {
        &self.malformed
    }

    /// 下一个将要分配的编号（不推进计数器）
    pub fn peek(&self) -> String {
        format_client_id(&self.prefix, self.last_value + 1, self.width)
    }

    /// 分配下一个编号并推进计数器
    pub fn allocate(&mut self) -> String {
        self.last_value += 1;
        format_client_id(&self.prefix, self.last_value, self.width)
    }

    /// 分配编号并检查存储中不存在
    ///
    /// 冲突时用存储的最新编号集合重新计算最大值（计数器不回退），
    /// 超过 max_retries 次仍冲突则返回运行级错误
    pub fn allocate_checked<S: ClientIdSource + ?Sized>(
        &mut self,
        store: &S,
        max_retries: u32,
    ) -> ImportResult<String> {
        let mut collisions = 0u32;
        loop {
            let candidate = self.allocate();
            if !store.client_id_exists(&candidate)? {
                return Ok(candidate);
            }

            collisions += 1;
            warn!(client_id = %candidate, collisions, "客户编号已存在，重新计算最大序号");
            if collisions > max_retries {
                return Err(ImportError::IdAllocationExhausted {
                    attempts: collisions,
                    last_candidate: candidate,
                });
            }

            let ids = store.list_prefixed_ids(&self.prefix)?;
            self.absorb(&ids);
        }
    }
}

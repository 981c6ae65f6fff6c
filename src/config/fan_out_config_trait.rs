// ==========================================
// 生产批次追踪系统 - 分发配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::OrphanPolicy;
use crate::repository::CodeFormat;
use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// FanOutConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
// 测试中可用内存实现替换
#[async_trait]
pub trait FanOutConfigReader: Send + Sync {
    /// 孤儿记录处理策略
    ///
    /// # 默认值
    /// - REJECT
    async fn get_orphan_policy(&self) -> ConfigResult<OrphanPolicy>;

    /// 操作记录编码格式
    ///
    /// # 默认值
    /// - 前缀 "OP"，宽度 6（OP000001）
    async fn get_operation_code_format(&self) -> ConfigResult<CodeFormat>;

    /// 自动生成批次号的编码格式
    ///
    /// # 默认值
    /// - 前缀 "C"，宽度 3（C001）
    async fn get_batch_code_format(&self) -> ConfigResult<CodeFormat>;
}

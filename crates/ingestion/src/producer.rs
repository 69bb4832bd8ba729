//! 测量生产者 trait

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::pipeline::RecordEmitter;

/// 测量生产者
///
/// 每个设备一个实现 (DSMR 电表、SUN2000 逆变器)，负责：
/// 1. 打开设备
/// 2. 循环读取并转换为 `MeasurementRecord`
/// 3. 通过 `RecordEmitter` 送入测量队列
///
/// `run` 在 `cancel` 触发时返回 `Ok(())`；返回错误表示生产者无法继续。
#[trait_variant::make(MeasurementProducer: Send)]
pub trait LocalMeasurementProducer {
    /// 生产者名称 (用于日志/指标)
    fn name(&self) -> &str;

    /// 运行采集循环
    async fn run(&mut self, emitter: RecordEmitter, cancel: CancellationToken) -> Result<()>;
}

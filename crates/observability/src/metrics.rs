//! 采集器指标记录模块
//!
//! 通过 `metrics` 门面记录；未安装 recorder 时所有调用均为空操作。

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// 注册指标说明 (Prometheus `# HELP`)
pub fn describe_all() {
    describe_counter!(
        "energy_logger_records_emitted_total",
        "Measurement records placed on the queue"
    );
    describe_counter!(
        "energy_logger_parse_errors_total",
        "Telegram lines that failed to parse"
    );
    describe_counter!(
        "energy_logger_records_forwarded_total",
        "Records written to a sink after rate limiting"
    );
    describe_counter!(
        "energy_logger_records_suppressed_total",
        "Records dropped by rate limiting"
    );
    describe_counter!("energy_logger_sink_writes_total", "Sink write attempts by status");
    describe_gauge!(
        "energy_logger_sink_queue_depth",
        "Records waiting in a sink queue"
    );
    describe_counter!(
        "energy_logger_register_retries_exhausted_total",
        "Register reads that failed on every attempt"
    );
    describe_histogram!(
        "energy_logger_register_error_rate_percent",
        "Failed attempts per retried register read"
    );
    describe_gauge!("energy_logger_device_status", "Last inverter status code");
}

/// 记录生产者产出一条测量记录
pub fn record_measurement_emitted(source: &str) {
    counter!(
        "energy_logger_records_emitted_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录单行解析失败
pub fn record_parse_error(source: &str) {
    counter!(
        "energy_logger_parse_errors_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录一次限流判定
///
/// `forwarded = false` 表示记录被限流丢弃。
pub fn record_throttle_decision(sink_name: &str, forwarded: bool) {
    if forwarded {
        counter!(
            "energy_logger_records_forwarded_total",
            "sink" => sink_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            "energy_logger_records_suppressed_total",
            "sink" => sink_name.to_string()
        )
        .increment(1);
    }
}

/// 记录 sink 写入结果
pub fn record_sink_write(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "energy_logger_sink_writes_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录 sink 队列深度
pub fn record_sink_queue_depth(sink_name: &str, depth: usize) {
    gauge!(
        "energy_logger_sink_queue_depth",
        "sink" => sink_name.to_string()
    )
    .set(depth as f64);
}

/// 记录寄存器读取重试耗尽
///
/// 同时把本次调用的错误率写入直方图。
pub fn record_retries_exhausted(operation: &str, error_rate_percent: u32) {
    counter!(
        "energy_logger_register_retries_exhausted_total",
        "operation" => operation.to_string()
    )
    .increment(1);
    histogram!("energy_logger_register_error_rate_percent").record(f64::from(error_rate_percent));
}

/// 记录设备状态码 (SUN2000)
pub fn record_device_status(source: &str, status_code: u16) {
    gauge!(
        "energy_logger_device_status",
        "source" => source.to_string()
    )
    .set(f64::from(status_code));
}

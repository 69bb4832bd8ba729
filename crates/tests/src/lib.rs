//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载 → 分发器构建
//! - 模拟 e2e 测试 (内存中的 P1 报文、模拟 Modbus 逆变器)
//! - 广播与各 sink 独立限流

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{MeasurementRecord, ThrottleKey};

    const CONFIG: &str = r#"
[mqtt]
server = "broker.local"
port = 1883
user = "logger"
password = "secret"

[devices]
dsmr_port = "/dev/ttyUSB0"
sun2k_port = "/dev/ttyUSB1"

[influxdb]
url = "http://localhost:8086"
token = "abc"
bucket_id = "energy"
org = "home"
"#;

    #[test]
    fn test_config_defaults_match_sink_routing() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();

        assert_eq!(blueprint.sinks.len(), 2);
        assert_eq!(blueprint.sinks[0].effective_throttle_key(), ThrottleKey::Topic);
        assert_eq!(blueprint.sinks[1].effective_throttle_key(), ThrottleKey::Prefix);
        assert_eq!(blueprint.enabled_devices().len(), 2);
    }

    #[test]
    fn test_toml_round_trip_keeps_devices() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.devices.sun2k_port, "/dev/ttyUSB1");
        assert_eq!(reloaded.mqtt.client_id, "solar_pi");
    }

    #[test]
    fn test_missing_config_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(ConfigLoader::load_or_create_template(&path).is_err());
        assert!(path.exists());
        // template still holds placeholders
        assert!(ConfigLoader::load_from_path(&path).is_err());
    }

    #[test]
    fn test_dispatch_keys() {
        let record = MeasurementRecord::new("dsmr", "el", "p_consumed", 512.0, 60);
        assert_eq!(ThrottleKey::Topic.key_for(&record), "dsmr/el/p_consumed");
        assert_eq!(ThrottleKey::Prefix.key_for(&record), "dsmr");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContractError, DataSink, MeasurementRecord, MeasurementValue, ThrottleKey};
    use dispatcher::{create_dispatcher, Dispatcher, SinkHandle};
    use ingestion::{DsmrMeter, IngestionPipeline, MockRegisterTransport, Sun2000Poller};
    use tokio_util::sync::CancellationToken;

    /// Sink that remembers every record it was asked to write
    struct RecordingSink {
        name: String,
        seen: Arc<Mutex<Vec<MeasurementRecord>>>,
    }

    impl DataSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, record: &MeasurementRecord) -> Result<(), ContractError> {
            self.seen.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    type Seen = Arc<Mutex<Vec<MeasurementRecord>>>;

    fn recording(name: &str, key: ThrottleKey) -> (SinkHandle, Seen) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            name: name.to_string(),
            seen: Arc::clone(&seen),
        };
        (SinkHandle::spawn(sink, key), seen)
    }

    fn tags(seen: &Seen) -> Vec<String> {
        seen.lock().unwrap().iter().map(|r| r.tag.clone()).collect()
    }

    const TELEGRAMS: &[u8] = b"/ISK5\\2M550E-1011\r\n\
1-0:1.7.0(01.193*kW)\r\n\
1-0:32.7.0(230.1*V)\r\n\
0-0:99.99.99(mystery)\r\n\
!1A2B\r\n\
/ISK5\\2M550E-1011\r\n\
1-0:1.7.0(01.250*kW)\r\n\
1-0:32.7.0(230.4*V)\r\n\
!3C4D\r\n";

    /// End-to-end: P1 bytes -> DsmrMeter -> queue -> Dispatcher -> two sinks
    ///
    /// The topic-keyed sink throttles each field on its own; the
    /// prefix-keyed sink shares one budget across all DSMR fields.
    #[tokio::test]
    async fn test_e2e_dsmr_broadcast_and_throttle() {
        let mut ingestion = IngestionPipeline::new();
        let rx = ingestion.take_receiver().unwrap();
        let emitter = ingestion.emitter();

        let (mqtt, mqtt_seen) = recording("mqtt", ThrottleKey::Topic);
        let (influx, influx_seen) = recording("influxdb", ThrottleKey::Prefix);
        let cancel = CancellationToken::new();
        let dispatcher_handle = Dispatcher::with_handles(vec![mqtt, influx], rx)
            .with_cancellation(cancel.clone())
            .spawn();

        let meter = DsmrMeter::new("/dev/ttyUSB0", &Default::default()).unwrap();
        // the in-memory stream ends after two telegrams
        assert!(meter
            .consume(TELEGRAMS, &emitter, &CancellationToken::new())
            .await
            .is_err());

        cancel.cancel();
        let report = dispatcher_handle.await.unwrap();
        assert_eq!(report.records, 9);

        assert_eq!(
            tags(&mqtt_seen),
            vec![
                "provider",
                "p_consumed",
                "voltage_L1",
                "err",
                "checksum",
                "provider",
                "checksum"
            ]
        );
        assert_eq!(
            tags(&influx_seen),
            vec!["provider", "p_consumed", "err", "checksum", "provider", "checksum"]
        );

        let metrics: HashMap<_, _> = report.sinks.into_iter().collect();
        assert_eq!(metrics["mqtt"].forwarded_count, 7);
        assert_eq!(metrics["mqtt"].suppressed_count, 2);
        assert_eq!(metrics["influxdb"].forwarded_count, 6);
        assert_eq!(metrics["influxdb"].suppressed_count, 3);

        // kW scaled to W, unknown identifier keeps the whole line
        let mqtt_records = mqtt_seen.lock().unwrap();
        assert_eq!(mqtt_records[1].value, MeasurementValue::Float(1193.0));
        assert_eq!(mqtt_records[3].topic, "errors");
        assert_eq!(
            mqtt_records[3].value,
            MeasurementValue::from("0-0:99.99.99(mystery)")
        );
        assert_eq!(mqtt_records[3].max_rate_per_hour, 0);
    }

    fn inverter() -> MockRegisterTransport {
        let mock = MockRegisterTransport::new();
        // "SUN2000"
        mock.set_registers(
            30000,
            &[0x5355, 0x4E32, 0x3030, 0x3000, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        )
        .set_register(30070, 400)
        .set_register(30071, 1)
        .set_register(32089, 0x0200)
        .set_register(32087, 385)
        .set_register(32016, 3410)
        .set_register(32017, 430)
        .set_register(32069, 2310)
        .set_register(32070, 2302)
        .set_register(32071, 2298)
        .set_register(32072, 2100)
        .set_register(32074, 2080)
        .set_register(32076, 2095)
        .set_registers(32064, &[0, 1480])
        .set_registers(32080, &[0, 1420])
        .set_registers(32082, &[0, 12])
        .set_register(32084, 998)
        .set_register(32086, 9790)
        .set_registers(32078, &[0, 7])
        .set_registers(32106, &[0, 9876]);
        mock
    }

    /// End-to-end: mock Modbus inverter -> Sun2000Poller -> Dispatcher
    #[tokio::test]
    async fn test_e2e_sun2000_polling() {
        let mut ingestion = IngestionPipeline::new();
        let rx = ingestion.take_receiver().unwrap();

        let (mqtt, mqtt_seen) = recording("mqtt", ThrottleKey::Topic);
        let (influx, influx_seen) = recording("influxdb", ThrottleKey::Prefix);
        let cancel = CancellationToken::new();
        let dispatcher_handle = Dispatcher::with_handles(vec![mqtt, influx], rx)
            .with_cancellation(cancel.clone())
            .spawn();

        let config = contracts::Sun2000Config {
            retry_attempts: 2,
            retry_delay_ms: 1,
            poll_interval_ms: 5,
            ..Default::default()
        };
        ingestion.spawn(Sun2000Poller::new(inverter(), &config));

        // let a few cycles run
        let metrics = ingestion.metrics();
        tokio::time::timeout(Duration::from_secs(5), async {
            while metrics.snapshot().poll_cycles < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let exits = ingestion.shutdown().await;
        assert!(exits.iter().all(|e| e.result.is_ok()));
        cancel.cancel();
        let report = dispatcher_handle.await.unwrap();

        let records = mqtt_seen.lock().unwrap();
        assert!(records.iter().all(|r| r.source == "solar"));
        // status and temperature only on change, so once
        assert_eq!(records[0].tag, "status_code");
        assert_eq!(records[0].value, MeasurementValue::Int(0x0200));
        assert_eq!(records.iter().filter(|r| r.topic == "system").count(), 3);

        // rate 3600 is one forward per key per second; cycles run 5 ms apart
        let mut per_key: HashMap<String, usize> = HashMap::new();
        for r in records.iter() {
            *per_key.entry(r.topic_path()).or_default() += 1;
        }
        assert!(per_key.contains_key("solar/metrics/active_power"));
        assert!(per_key.contains_key("solar/metrics/pv0_voltage"));
        assert!(per_key.values().all(|&n| n <= 2));

        let influx_records = influx_seen.lock().unwrap();
        assert!(influx_records.len() <= 2);
        assert!(influx_records.len() < records.len());

        let metrics: HashMap<_, _> = report.sinks.into_iter().collect();
        assert!(metrics["mqtt"].suppressed_count > 0);
        assert!(metrics["influxdb"].suppressed_count > metrics["mqtt"].suppressed_count);
    }

    /// Dry run swaps configured sinks for log sinks with the same names
    #[tokio::test]
    async fn test_e2e_config_dry_run() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[mqtt]
server = "127.0.0.1"
port = 1
user = ""
password = ""

[devices]
dsmr_port = "/dev/ttyUSB0"
sun2k_port = "/dev/ttyUSB1"

[influxdb]
url = "http://127.0.0.1:1"
token = "abc"
bucket_id = "energy"
org = "home"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let mut ingestion = IngestionPipeline::new();
        let rx = ingestion.take_receiver().unwrap();
        let cancel = CancellationToken::new();
        let dispatcher = create_dispatcher(&blueprint, rx, cancel.clone(), true).unwrap();
        let handle = dispatcher.spawn();

        let meter = DsmrMeter::new("/dev/ttyUSB0", &blueprint.dsmr).unwrap();
        let _ = meter
            .consume(TELEGRAMS, &ingestion.emitter(), &CancellationToken::new())
            .await;

        cancel.cancel();
        let report = handle.await.unwrap();
        let names: Vec<_> = report.sinks.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["mqtt", "influxdb"]);
        assert!(report.sinks.iter().all(|(_, m)| m.failure_count == 0));
        assert_eq!(report.sinks[0].1.forwarded_count, 7);
    }
}

//! End-to-end tests: channel ingestion into the engine, snapshot round trips
//! through both backends, and the persistence task's final flush.

#[cfg(test)]
mod pipeline_integration_tests {
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use crisisflow::events::{
        CrisisEvent, Location, RiskLevel, SocialData, SocialSignalEvent, StreamKind, Urgency,
        WeatherData, WeatherRiskEvent,
    };
    use crisisflow::ingestion::{ingest_channel, run_ingestion};
    use crisisflow::persistence::{
        load_snapshot, open_backend, save_snapshot, spawn_persistence_task, JsonFileStore,
    };
    use crisisflow::{BackendType, CrisisConfig, CrisisEngine};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    fn weather(id: usize, minutes_ago: i64) -> CrisisEvent {
        let base = Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap();
        CrisisEvent::Weather(WeatherRiskEvent {
            event_id: format!("w-{}", id),
            source: "test".to_string(),
            location: Location::new(34.05, -118.24),
            data: WeatherData {
                fire_index: 80.0,
                flood_index: 5.0,
                ..WeatherData::default()
            },
            risk_level: RiskLevel::Critical,
            timestamp: base - ChronoDuration::minutes(minutes_ago),
        })
    }

    fn social(id: usize) -> CrisisEvent {
        CrisisEvent::Social(SocialSignalEvent {
            event_id: format!("s-{}", id),
            source: "social".to_string(),
            location: Location::new(34.06, -118.23),
            data: SocialData {
                text: "smoke over the hills".to_string(),
                category: "fire".to_string(),
                urgency: Urgency::High,
                verified: true,
            },
            timestamp: Utc.with_ymd_and_hms(2024, 8, 1, 11, 59, 0).unwrap(),
        })
    }

    fn weather_ids(engine: &CrisisEngine) -> Vec<String> {
        engine
            .latest(usize::MAX)
            .weather
            .into_iter()
            .map(|e| e.event_id)
            .collect()
    }

    #[tokio::test]
    async fn test_channel_ingestion_feeds_engine() {
        // Test: raw broker payloads flow through the channel into every view
        let engine = CrisisEngine::new(&CrisisConfig::default()).into_shared();
        let (tx, rx) = ingest_channel(64);
        let ingestion = tokio::spawn(run_ingestion(rx, engine.clone(), 1000));

        for i in 0..20 {
            tx.send_raw(
                StreamKind::Weather,
                json!({
                    "event_id": format!("w-{}", i),
                    "location": {"name": "Los Angeles", "lat": 34.05, "lon": -118.24},
                    "data": {"fire_index": 82.0, "flood_index": 3.0},
                    "risk_level": "critical",
                    "timestamp": Utc::now().to_rfc3339(),
                }),
            )
            .await
            .unwrap();
        }
        for i in 0..5 {
            tx.send_event(social(i)).await.unwrap();
        }
        tx.shutdown().await.unwrap();

        let stats = ingestion.await.unwrap();
        assert_eq!(stats.accepted, 25);
        assert_eq!(stats.rejected, 0);

        let mut engine = engine.lock().await;
        assert_eq!(engine.len(), 25);

        let hotspots = engine.hotspots();
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].event_count, 25);
        assert_eq!(hotspots[0].social_count, 5);
        assert_eq!(hotspots[0].risk_level, RiskLevel::Critical);

        let predictions = engine.predictions();
        assert_eq!(predictions.predictions.len(), 3);
        assert_eq!(predictions.metrics.data_points, 25);

        let metrics = engine.metrics();
        assert_eq!(metrics.total_events_processed, 25);
        assert_eq!(metrics.predictions_ahead_minutes, 120);
    }

    #[tokio::test]
    async fn test_json_snapshot_round_trip_truncates_to_capacity() {
        let dir = tempdir().unwrap();
        let config = CrisisConfig {
            event_cache_size: 5,
            snapshot_dir: dir.path().join("snapshots"),
            ..CrisisConfig::default()
        };

        let mut engine = CrisisEngine::new(&config);
        for i in 0..8 {
            engine.ingest(weather(i, 8 - i as i64));
        }
        engine.ingest(social(0));
        engine.hotspots();

        let mut backend = open_backend(&config).unwrap();
        save_snapshot(backend.as_mut(), &engine.snapshot()).await.unwrap();

        // Smaller cache on restart keeps only the newest events
        let smaller = CrisisConfig {
            event_cache_size: 3,
            ..config.clone()
        };
        let mut backend = open_backend(&smaller).unwrap();
        let snapshot = load_snapshot(backend.as_mut()).await;
        assert_eq!(snapshot.weather.len(), 5);
        assert!(snapshot.hotspots.is_some());

        let mut restored = CrisisEngine::new(&smaller);
        restored.restore(snapshot);
        assert_eq!(weather_ids(&restored), vec!["w-5", "w-6", "w-7"]);
        assert_eq!(restored.stats().social_total, 1);
        assert_eq!(restored.hotspots().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let config = CrisisConfig {
            snapshot_backend: BackendType::Sqlite,
            snapshot_db_path: dir.path().join("crisisflow.db"),
            ..CrisisConfig::default()
        };

        let mut engine = CrisisEngine::new(&config);
        for i in 0..4 {
            engine.ingest(weather(i, 10 - i as i64));
        }
        let original = engine.snapshot();

        {
            let mut backend = open_backend(&config).unwrap();
            assert_eq!(backend.backend_type(), "SQLite");
            save_snapshot(backend.as_mut(), &original).await.unwrap();
        }

        let mut backend = open_backend(&config).unwrap();
        let snapshot = load_snapshot(backend.as_mut()).await;
        assert_eq!(snapshot, original);

        let mut restored = CrisisEngine::new(&config);
        restored.restore(snapshot);
        assert_eq!(weather_ids(&restored), vec!["w-0", "w-1", "w-2", "w-3"]);
    }

    #[tokio::test]
    async fn test_persistence_shutdown_writes_final_snapshot() {
        // Test: a period far longer than the test still yields a snapshot on shutdown
        let dir = tempdir().unwrap();
        let engine = CrisisEngine::new(&CrisisConfig::default()).into_shared();
        let backend = Box::new(JsonFileStore::new(dir.path()).unwrap());
        let handle =
            spawn_persistence_task(engine.clone(), backend, Duration::from_secs(3600)).await;

        {
            let mut engine = engine.lock().await;
            for i in 0..3 {
                engine.ingest(weather(i, 3 - i as i64));
            }
        }
        handle.shutdown().await;

        let mut store = JsonFileStore::new(dir.path()).unwrap();
        let snapshot = load_snapshot(&mut store).await;
        assert_eq!(snapshot.weather.len(), 3);
        assert!(snapshot.social.is_empty());
        assert!(snapshot.hotspots.is_none());
    }
}

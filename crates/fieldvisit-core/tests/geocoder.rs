#![cfg(feature = "runtime")]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use fieldvisit_core::geocoder::{
    GeocodeCache, GeocodeError, GeocodeRunner, GeocodeSettings, ReverseGeocoder,
};
use fieldvisit_core::GeoPoint;

/// Answers from a fixed table. Points listed in `failures` are rate limited that many times
/// before answering.
#[derive(Default)]
struct FakeGeocoder {
    answers: HashMap<String, String>,
    failures: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl FakeGeocoder {
    fn with_answer(mut self, point: GeoPoint, address: &str) -> Self {
        self.answers.insert(point.cache_key(), address.to_string());
        self
    }

    fn failing(self, point: GeoPoint, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(point.cache_key(), times);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for FakeGeocoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = point.cache_key();
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GeocodeError::RateLimited);
            }
        }
        Ok(self.answers.get(&key).cloned())
    }
}

fn settings(batch_size: usize, max_attempts: u32) -> GeocodeSettings {
    GeocodeSettings {
        min_delay: Duration::ZERO,
        batch_size,
        max_attempts,
        initial_backoff: Duration::from_millis(1),
    }
}

fn point(lat: f64, lon: f64) -> GeoPoint {
    GeoPoint::new(lat, lon).expect("valid point")
}

#[tokio::test]
async fn duplicate_points_are_looked_up_once() -> Result<()> {
    let utrecht = point(52.0907, 5.1214);
    let geocoder = FakeGeocoder::default().with_answer(utrecht, "Dorpsstraat, Utrecht");
    let mut cache = GeocodeCache::in_memory();

    let report = GeocodeRunner::new(&geocoder, settings(10, 1))
        .run(&[utrecht, utrecht, utrecht], &mut cache)
        .await?;

    assert_eq!(geocoder.calls(), 1);
    assert_eq!(report.requested, 1);
    assert_eq!(report.resolved, 1);
    assert_eq!(
        cache.get(&utrecht),
        Some(&Some("Dorpsstraat, Utrecht".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn rate_limited_lookups_are_retried() -> Result<()> {
    let zwolle = point(52.5168, 6.0944);
    let geocoder = FakeGeocoder::default()
        .with_answer(zwolle, "Kerkpad, Zwolle")
        .failing(zwolle, 2);
    let mut cache = GeocodeCache::in_memory();

    let report = GeocodeRunner::new(&geocoder, settings(10, 3))
        .run(&[zwolle], &mut cache)
        .await?;

    assert_eq!(geocoder.calls(), 3);
    assert_eq!(report.resolved, 1);
    assert!(report.failed_batches.is_empty());
    Ok(())
}

#[tokio::test]
async fn exhausted_batch_is_reported_and_others_continue() -> Result<()> {
    let first = point(52.0907, 5.1214);
    let second = point(52.5168, 6.0944);
    let third = point(52.1561, 5.3878);
    let geocoder = FakeGeocoder::default()
        .with_answer(first, "Dorpsstraat, Utrecht")
        .with_answer(third, "Stationsplein, Amersfoort")
        .failing(second, 10);
    let mut cache = GeocodeCache::in_memory();

    let report = GeocodeRunner::new(&geocoder, settings(1, 2))
        .run(&[first, second, third], &mut cache)
        .await?;

    assert_eq!(report.failed_batches.len(), 1);
    assert_eq!(report.failed_batches[0].index, 1);
    assert_eq!(report.resolved, 2);
    assert!(cache.contains(&first));
    assert!(!cache.contains(&second));
    assert!(cache.contains(&third));
    Ok(())
}

#[tokio::test]
async fn checkpointed_cache_skips_known_points_on_rerun() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cache").join("geocode_cache.json");
    let known = point(52.0907, 5.1214);
    let nowhere = point(52.3, 5.9);
    let geocoder = FakeGeocoder::default().with_answer(known, "Dorpsstraat, Utrecht");

    let mut cache = GeocodeCache::open(&path)?;
    assert!(cache.is_empty());
    GeocodeRunner::new(&geocoder, settings(1, 1))
        .run(&[known, nowhere], &mut cache)
        .await?;
    assert!(path.exists());

    let rerun = FakeGeocoder::default();
    let mut reopened = GeocodeCache::open(&path)?;
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.get(&nowhere), Some(&None));

    let report = GeocodeRunner::new(&rerun, settings(1, 1))
        .run(&[known, nowhere], &mut reopened)
        .await?;
    assert_eq!(rerun.calls(), 0);
    assert_eq!(report.cached, 2);
    Ok(())
}

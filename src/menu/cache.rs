use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{date_key, DayMenu, DiningHall, Meal, MenuError, MenuFetcher, WeekMenu, WEEK_DAYS};

/// What sits in the cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub cached_at: DateTime<Utc>,
    pub payload: WeekMenu,
}

impl CacheEnvelope {
    pub fn new(payload: WeekMenu) -> Self {
        Self {
            cached_at: Utc::now(),
            payload,
        }
    }

    /// Usable while at most one calendar day has passed since it was written.
    pub fn is_fresh(&self, today: NaiveDate) -> bool {
        (today - self.cached_at.date_naive()).num_days() <= 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Refreshed,
}

/// Week-long menu cache backed by a single JSON file.
///
/// Reads and writes of the file are each serialized by their own guard. The
/// guards only cover file I/O; fetching from the provider happens outside
/// them, so two callers missing at the same time both fetch and the last
/// rename wins.
pub struct WeekMenuCache {
    fetcher: Arc<dyn MenuFetcher>,
    halls: Vec<DiningHall>,
    path: PathBuf,
    concurrency: usize,
    read_guard: Mutex<()>,
    write_guard: Mutex<()>,
}

impl WeekMenuCache {
    pub fn new(fetcher: Arc<dyn MenuFetcher>, halls: Vec<DiningHall>, path: PathBuf) -> Self {
        Self {
            fetcher,
            halls,
            path,
            concurrency: 8,
            read_guard: Mutex::new(()),
            write_guard: Mutex::new(()),
        }
    }

    /// Upper bound on provider requests in flight while building a week.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get_week(&self, start: NaiveDate) -> WeekMenu {
        self.get_week_with_status(start).await.0
    }

    pub async fn get_week_with_status(&self, start: NaiveDate) -> (WeekMenu, CacheStatus) {
        let today = Utc::now().date_naive();

        match self.load().await {
            Ok(Some(envelope)) if envelope.is_fresh(today) => {
                tracing::debug!("Menu cache hit (cached at {})", envelope.cached_at);
                return (envelope.payload, CacheStatus::Hit);
            }
            Ok(Some(envelope)) => {
                tracing::info!("Menu cache from {} is stale, refetching", envelope.cached_at);
            }
            Ok(None) => tracing::info!("No menu cache at {}, fetching", self.path.display()),
            Err(e) => tracing::warn!("Ignoring unreadable menu cache: {}", e),
        }

        let dates = (0..WEEK_DAYS).map(|offset| start + Duration::days(offset));
        let week = self.fetch_days(dates).await;

        if let Err(e) = self.store(&CacheEnvelope::new(week.clone())).await {
            tracing::warn!("Serving fresh menus without caching them: {}", e);
        }

        (week, CacheStatus::Refreshed)
    }

    /// Fetch a single day straight from the provider. Nothing is persisted.
    pub async fn fetch_day(&self, date: NaiveDate) -> DayMenu {
        self.fetch_days(std::iter::once(date))
            .await
            .remove(&date_key(date))
            .unwrap_or_default()
    }

    async fn fetch_days(&self, dates: impl Iterator<Item = NaiveDate>) -> WeekMenu {
        let mut week = WeekMenu::new();
        let mut cells = Vec::new();

        for date in dates {
            let day = week.entry(date_key(date)).or_default();
            for meal in Meal::ALL {
                day.insert(meal, Default::default());
                for idx in 0..self.halls.len() {
                    cells.push((date, meal, idx));
                }
            }
        }

        let fetched: Vec<_> = stream::iter(cells)
            .map(|(date, meal, idx)| async move {
                let hall = &self.halls[idx];
                let dishes = match self.fetcher.fetch(date, hall.id, meal).await {
                    Ok(dishes) => dishes,
                    Err(e) => {
                        tracing::warn!(
                            "No {} menu for {} on {}: {}",
                            meal,
                            hall.name,
                            date,
                            e
                        );
                        Vec::new()
                    }
                };
                (date, meal, hall, dishes)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (date, meal, hall, dishes) in fetched {
            if dishes.is_empty() {
                continue;
            }
            week.entry(date_key(date))
                .or_default()
                .entry(meal)
                .or_default()
                .insert(hall.name.clone(), dishes);
        }

        week
    }

    /// Read the cache file. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<CacheEnvelope>, MenuError> {
        let bytes = {
            let _guard = self.read_guard.lock().await;
            match tokio::fs::read(&self.path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(MenuError::CacheRead(e.to_string())),
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| MenuError::CacheRead(e.to_string()))
    }

    /// Write to a sibling temp file, then rename over the cache file so a
    /// reader only ever sees a complete envelope.
    pub async fn store(&self, envelope: &CacheEnvelope) -> Result<(), MenuError> {
        let bytes = serde_json::to_vec_pretty(envelope)
            .map_err(|e| MenuError::CacheWriteFailure(e.into()))?;
        let tmp = self.temp_path();

        let _guard = self.write_guard.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(MenuError::CacheWriteFailure)?;
        }

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(MenuError::CacheWriteFailure)?;

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(MenuError::CacheWriteFailure(e));
        }

        tracing::info!("Menu cache written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "menu_cache.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::now_v7()))
    }
}

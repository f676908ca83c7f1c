use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use super::{date_key, DiningHall, Dish, Meal, MenuError};
use crate::config::MenuConfig;

/// Source of one hall's dishes for one meal on one day.
#[async_trait]
pub trait MenuFetcher: Send + Sync {
    async fn fetch(
        &self,
        date: NaiveDate,
        hall_id: u32,
        meal: Meal,
    ) -> Result<Vec<Dish>, MenuError>;
}

/// Client for the AVI food systems menu API.
///
/// The `/menu-items/week` endpoint answers with the whole week around the
/// requested date no matter what, so results are narrowed to `date` here.
pub struct AviMenuFetcher {
    client: Client,
    api_url: String,
    halls: Vec<DiningHall>,
}

/// One record as the provider sends it. Every field is optional upstream.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderDish {
    id: Option<i64>,
    name: Option<String>,
    station_name: Option<String>,
    date: Option<String>,
}

impl AviMenuFetcher {
    pub fn new(config: &MenuConfig) -> Result<Self, MenuError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            halls: config.halls.clone(),
        })
    }

    fn hall(&self, hall_id: u32) -> Result<&DiningHall, MenuError> {
        self.halls
            .iter()
            .find(|h| h.id == hall_id)
            .ok_or(MenuError::UnknownHall(hall_id))
    }
}

#[async_trait]
impl MenuFetcher for AviMenuFetcher {
    async fn fetch(
        &self,
        date: NaiveDate,
        hall_id: u32,
        meal: Meal,
    ) -> Result<Vec<Dish>, MenuError> {
        let meal_id = self.hall(hall_id)?.meal_id(meal);

        let records: Option<Vec<ProviderDish>> = self
            .client
            .get(&self.api_url)
            .query(&[
                ("date", provider_date(date)),
                ("locationId", hall_id.to_string()),
                ("mealId", meal_id.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let dishes = dishes_on(records.unwrap_or_default(), date);
        tracing::debug!(
            "Fetched {} dishes for hall {} {} on {}",
            dishes.len(),
            hall_id,
            meal,
            date
        );
        Ok(dishes)
    }
}

/// The provider wants `M/D/YY` without zero padding, e.g. `11/5/25`.
fn provider_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%y").to_string()
}

fn dishes_on(records: Vec<ProviderDish>, date: NaiveDate) -> Vec<Dish> {
    let target = date_key(date);

    records
        .into_iter()
        .filter(|r| {
            r.date
                .as_deref()
                .and_then(|d| d.get(..10))
                .is_some_and(|d| d == target)
        })
        .filter_map(|r| {
            let Some(id) = r.id else {
                tracing::debug!("Skipping provider dish without an id: {:?}", r.name);
                return None;
            };
            Some(Dish {
                id,
                name: r.name.unwrap_or_default(),
                station: r.station_name.unwrap_or_default(),
            })
        })
        .collect()
}

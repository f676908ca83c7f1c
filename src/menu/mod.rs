//! Dining hall menus: the provider client and the on-disk week cache.

mod cache;
mod fetcher;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

pub use self::cache::{CacheEnvelope, CacheStatus, WeekMenuCache};
pub use self::fetcher::{AviMenuFetcher, MenuFetcher};

/// Days covered by one cached week, starting at the requested date.
pub const WEEK_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    #[error("Menu provider unavailable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),

    #[error("Unknown dining hall: {0}")]
    UnknownHall(u32),

    #[error("Cache write failed: {0}")]
    CacheWriteFailure(#[source] std::io::Error),

    #[error("Cache read failed: {0}")]
    CacheRead(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
}

impl Meal {
    pub const ALL: [Meal; 3] = [Meal::Breakfast, Meal::Lunch, Meal::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Meal::Breakfast => "Breakfast",
            Meal::Lunch => "Lunch",
            Meal::Dinner => "Dinner",
        }
    }
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dining hall as the provider knows it: a location id plus one provider
/// meal id per meal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiningHall {
    pub id: u32,
    pub name: String,
    pub breakfast: u32,
    pub lunch: u32,
    pub dinner: u32,
}

impl DiningHall {
    pub fn meal_id(&self, meal: Meal) -> u32 {
        match meal {
            Meal::Breakfast => self.breakfast,
            Meal::Lunch => self.lunch,
            Meal::Dinner => self.dinner,
        }
    }

    /// The four Wellesley Fresh halls.
    pub fn wellesley() -> Vec<DiningHall> {
        [
            (95, "Bates", 145, 146, 311),
            (131, "Stone D", 261, 262, 263),
            (96, "Lulu", 148, 149, 312),
            (97, "Tower", 153, 154, 310),
        ]
        .into_iter()
        .map(|(id, name, breakfast, lunch, dinner)| DiningHall {
            id,
            name: name.to_string(),
            breakfast,
            lunch,
            dinner,
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub name: String,
    pub station: String,
}

/// hall name -> dishes, in provider order. Halls with nothing to serve are absent.
pub type HallMenus = BTreeMap<String, Vec<Dish>>;

/// meal -> hall menus for one day.
pub type DayMenu = BTreeMap<Meal, HallMenus>;

/// ISO date (`YYYY-MM-DD`) -> that day's menus.
pub type WeekMenu = BTreeMap<String, DayMenu>;

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Meals ordered so the one being served around `hour` comes first.
pub fn meal_order(hour: u32) -> [Meal; 3] {
    if hour < 10 {
        [Meal::Breakfast, Meal::Lunch, Meal::Dinner]
    } else if hour < 15 {
        [Meal::Lunch, Meal::Dinner, Meal::Breakfast]
    } else {
        [Meal::Dinner, Meal::Breakfast, Meal::Lunch]
    }
}

pub fn meal_order_now() -> [Meal; 3] {
    meal_order(chrono::Local::now().hour())
}

/// Every dish served anywhere in the week, first occurrence wins.
pub fn unique_dishes(week: &WeekMenu) -> Vec<&Dish> {
    let mut seen = std::collections::HashSet::new();
    week.values()
        .flat_map(|day| day.values())
        .flat_map(|halls| halls.values())
        .flatten()
        .filter(|dish| seen.insert(dish.id))
        .collect()
}

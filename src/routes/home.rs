use axum::extract::State;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::models::FeastEvent;
use crate::dishes;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::feast::{self, RECENT_FEASTS};
use crate::menu::{date_key, meal_order_now, unique_dishes, CacheStatus, DayMenu, Meal, WEEK_DAYS};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/home", get(index))
        .route("/home/feasts", post(add_feast))
}

#[derive(Serialize)]
pub struct HomePage {
    pub user: Option<String>,
    pub meal_order: [Meal; 3],
    pub days: Vec<DayView>,
    pub feasts: Vec<FeastEvent>,
}

#[derive(Serialize)]
pub struct DayView {
    pub date: String,
    pub label: String,
    pub menu: DayMenu,
}

#[derive(Deserialize)]
pub struct FeastForm {
    pub free_food: String,
    pub location: String,
    pub time_text: String,
}

/// GET /home: the week's menus starting today plus recent feasts.
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Json<HomePage>> {
    let start = Local::now().date_naive();
    let (mut week, status) = state.menu.get_week_with_status(start).await;

    if status == CacheStatus::Refreshed {
        if let Err(e) = dishes::record_menu_dishes(&state.db, &unique_dishes(&week)) {
            tracing::warn!("Could not record menu dishes: {}", e);
        }
    }

    let mut days = Vec::with_capacity(WEEK_DAYS as usize);
    for offset in 0..WEEK_DAYS {
        let date = start + Duration::days(offset);
        // A cached week may have started on an earlier day.
        let menu = match week.remove(&date_key(date)) {
            Some(menu) => menu,
            None => state.menu.fetch_day(date).await,
        };
        days.push(DayView {
            date: date_key(date),
            label: day_label(offset, date),
            menu,
        });
    }

    Ok(Json(HomePage {
        user: user.map(|u| u.name),
        meal_order: meal_order_now(),
        days,
        feasts: feast::recent_feasts(&state.db, RECENT_FEASTS)?,
    }))
}

/// POST /home/feasts
pub async fn add_feast(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<FeastForm>,
) -> AppResult<Json<Value>> {
    let food = form.free_food.trim();
    let location = form.location.trim();
    let time = form.time_text.trim();
    if food.is_empty() || location.is_empty() || time.is_empty() {
        return Err(AppError::BadRequest(
            "Food, location and time are all required".into(),
        ));
    }

    let nid = feast::insert_feast(&state.db, user.uid, food, location, time)?;
    Ok(Json(json!({ "ok": true, "nid": nid })))
}

fn day_label(offset: i64, date: NaiveDate) -> String {
    if offset == 0 {
        "Today".to_string()
    } else {
        date.format("%A %b %-d").to_string()
    }
}

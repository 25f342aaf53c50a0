use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::evaluation::Evaluations;
use crate::model::{api::auth::Caller, api::settings::SettingsDescription, db::Settings};

pub fn routes() -> Vec<Route> {
    routes![get_settings, update_settings]
}

#[get("/settings")]
async fn get_settings(evaluations: &State<Evaluations>) -> Result<Json<SettingsDescription>> {
    Ok(Json(evaluations.settings().await?.into()))
}

#[put("/settings", data = "<settings>", format = "json")]
async fn update_settings(
    caller: Caller,
    settings: Json<Settings>,
    evaluations: &State<Evaluations>,
) -> Result<Json<SettingsDescription>> {
    let saved = evaluations.update_settings(&caller, settings.0).await?;
    Ok(Json(saved.into()))
}

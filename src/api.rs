use rocket::Route;

mod evaluation;
mod settings;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(evaluation::routes());
    routes.extend(settings::routes());
    routes
}
